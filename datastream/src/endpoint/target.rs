// SPDX-License-Identifier: Apache-2.0

use std::{env, fs, io, result};
use std::fs::{File, FileType, Metadata, OpenOptions};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::{ChildStderr, ChildStdin, ChildStdout};
use std::str::FromStr;
use amplify_derive::Display;
use cfg_if::cfg_if;
use tracing::debug;
use crate::{Error, ErrorKind, Operation, Result};
use crate::device::{Device, FileDevice, GenericDevice, Kind, PipeDevice, PipeEnd, SocketDevice};
use crate::error::ResultContext;

/// A well-known standard stream of the current process.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Hash)]
pub enum StdPipe {
	#[display("stdin")]
	Stdin,
	#[display("stdout")]
	Stdout,
	#[display("stderr")]
	Stderr,
}

impl FromStr for StdPipe {
	type Err = ();

	fn from_str(value: &str) -> result::Result<Self, ()> {
		match value {
			"stdin"  => Ok(Self::Stdin),
			"stdout" => Ok(Self::Stdout),
			"stderr" => Ok(Self::Stderr),
			_ => Err(())
		}
	}
}

/// The resource an [`Endpoint`](super::Endpoint) is bound to.
///
/// Handles supplied by the caller ([`File`](Self::File), [`Socket`](Self::Socket))
/// are never closed by the endpoint. Use [`Target::file`] and [`Target::socket`]
/// to hand over a duplicate of a handle the caller keeps using.
#[derive(Debug)]
pub enum Target {
	/// A filesystem path, opened by the endpoint.
	Path(PathBuf),
	/// A standard stream.
	Pipe(StdPipe),
	/// An already-open file, usable in the directions it was opened for.
	File {
		file: File,
		readable: bool,
		writable: bool,
	},
	/// An already-connected TCP stream.
	Socket(TcpStream),
	ChildStdin(ChildStdin),
	ChildStdout(ChildStdout),
	ChildStderr(ChildStderr),
	/// Arbitrary readers and writers.
	Generic(GenericDevice),
}

impl Target {
	/// Creates a target from a duplicate of an open file handle, assumed to be
	/// open for both reading and writing.
	pub fn file(file: &File) -> io::Result<Self> {
		Self::file_with(file, true, true)
	}

	/// Creates a target from a duplicate of an open file handle, opened in the
	/// given directions. Operations in other directions fail with an access
	/// error rather than reaching the OS.
	pub fn file_with(file: &File, readable: bool, writable: bool) -> io::Result<Self> {
		let file = file.try_clone()?;
		Ok(Self::File { file, readable, writable })
	}

	/// Creates a target from a duplicate of a connected TCP stream. The duplicate
	/// shares its blocking mode with `stream`, which is non-blocking while the
	/// endpoint is open.
	pub fn socket(stream: &TcpStream) -> io::Result<Self> {
		stream.try_clone().map(Self::Socket)
	}

	/// Returns `true` if the endpoint opens, and so must release, the resource.
	pub fn owns_connection(&self) -> bool {
		!matches!(self, Self::File { .. } | Self::Socket(_))
	}

	/// Validates the target against `policy`, returning its kind and the
	/// directions it can be opened in.
	pub(crate) fn validate(&self, policy: &PathPolicy) -> Result<Access> {
		let access = match self {
			Self::Path(path) => return validate_path(path, policy),
			Self::Pipe(StdPipe::Stdin) |
			Self::ChildStdout(_)       |
			Self::ChildStderr(_)       => Access::new(Kind::Pipe, true, false),
			Self::Pipe(_)              |
			Self::ChildStdin(_)        => Access::new(Kind::Pipe, false, true),
			Self::File { readable, writable, .. } => Access::new(Kind::File, *readable, *writable),
			Self::Socket(_)            => Access::new(Kind::Socket, true, false),
			Self::Generic(device)      => Access::new(Kind::Generic, device.is_readable(), device.is_writable()),
		};
		Ok(access)
	}

	/// Opens the target as a device of `kind`.
	pub(crate) fn open(self, kind: Kind) -> Result<Box<dyn Device>> {
		let end = match self {
			Self::Path(path) => match kind {
				Kind::File => return Ok(Box::new(open_file(&path)?)),
				Kind::Pipe => {
					let fifo = OpenOptions::new()
						.read(true)
						.write(true)
						.open(&path)
						.context(Operation::Open)?;
					debug!(path = %path.display(), "opened named pipe");
					PipeEnd::Fifo(fifo)
				}
				_ => return Err(Error::unsupported(Operation::Open, kind.name()))
			},
			Self::Pipe(StdPipe::Stdin ) => PipeEnd::Stdin (io::stdin ()),
			Self::Pipe(StdPipe::Stdout) => PipeEnd::Stdout(io::stdout()),
			Self::Pipe(StdPipe::Stderr) => PipeEnd::Stderr(io::stderr()),
			Self::ChildStdin (pipe) => PipeEnd::ChildStdin (pipe),
			Self::ChildStdout(pipe) => PipeEnd::ChildStdout(pipe),
			Self::ChildStderr(pipe) => PipeEnd::ChildStderr(pipe),
			Self::File { file, readable, writable } =>
				return Ok(Box::new(FileDevice::new(file, readable, writable))),
			Self::Socket(stream) =>
				return Ok(Box::new(SocketDevice::new(stream).context(Operation::Open)?)),
			Self::Generic(device) => return Ok(Box::new(device)),
		};
		Ok(Box::new(PipeDevice::new(end).context(Operation::Open)?))
	}
}

impl From<PathBuf> for Target {
	fn from(value: PathBuf) -> Self { Self::Path(value) }
}

impl From<&Path> for Target {
	fn from(value: &Path) -> Self { Self::Path(value.to_path_buf()) }
}

impl From<StdPipe> for Target {
	fn from(value: StdPipe) -> Self { Self::Pipe(value) }
}

impl From<ChildStdin> for Target {
	fn from(value: ChildStdin) -> Self { Self::ChildStdin(value) }
}

impl From<ChildStdout> for Target {
	fn from(value: ChildStdout) -> Self { Self::ChildStdout(value) }
}

impl From<ChildStderr> for Target {
	fn from(value: ChildStderr) -> Self { Self::ChildStderr(value) }
}

impl From<GenericDevice> for Target {
	fn from(value: GenericDevice) -> Self { Self::Generic(value) }
}

/// The kind and initial directionality of a validated target.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Access {
	pub kind: Kind,
	pub readable: bool,
	pub writable: bool,
}

impl Access {
	fn new(kind: Kind, readable: bool, writable: bool) -> Self {
		Self { kind, readable, writable }
	}
}

/// Restricts which paths endpoints may be constructed from.
///
/// Paths resolving inside the protected root are rejected with
/// [`UnsafePath`](ErrorKind::UnsafePath), guarding against indirect traversal
/// into the caller's own tree. Callers who really mean to open such a file can
/// open it themselves and hand over the handle.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum PathPolicy {
	/// Protects the current working directory, resolved at validation time.
	#[default]
	ProtectCwd,
	/// Protects the given root.
	Protect(PathBuf),
	/// Allows any path.
	Unrestricted,
}

impl PathPolicy {
	/// Creates a policy protecting `root`.
	pub fn protect(root: impl Into<PathBuf>) -> Self {
		Self::Protect(root.into())
	}

	/// Creates a policy allowing any path.
	pub fn unrestricted() -> Self { Self::Unrestricted }

	fn root(&self) -> Result<Option<PathBuf>> {
		let root = match self {
			Self::ProtectCwd => env::current_dir().context(Operation::Validate)?,
			Self::Protect(root) => root.clone(),
			Self::Unrestricted => return Ok(None)
		};
		// A root that can't be resolved is compared as given.
		Ok(Some(root.canonicalize().unwrap_or(root)))
	}

	/// Checks a resolved path against the protected root.
	fn check(&self, resolved: &Path) -> Result {
		match self.root()? {
			Some(root) if resolved.starts_with(&root) =>
				Err(Error::new(Operation::Validate, ErrorKind::UnsafePath, None)),
			_ => Ok(())
		}
	}
}

fn validate_path(path: &Path, policy: &PathPolicy) -> Result<Access> {
	if path.as_os_str().is_empty() {
		return Err(Error::invalid(Operation::Validate, "empty path"))
	}

	match fs::metadata(path) {
		Ok(meta) => {
			policy.check(&path.canonicalize().context(Operation::Validate)?)?;
			Ok(existing_access(&meta))
		}
		Err(err) if err.kind() == io::ErrorKind::NotFound => {
			let parent = match path.parent() {
				Some(parent) if !parent.as_os_str().is_empty() => parent,
				_ => Path::new(".")
			};
			let parent_meta = fs::metadata(parent).context(Operation::Validate)?;
			if !parent_meta.is_dir() {
				return Err(Error::new(Operation::Validate, ErrorKind::NotFound, None))
			}
			if parent_meta.permissions().readonly() {
				return Err(Error::new(Operation::Validate, ErrorKind::NoAccess, None))
			}

			let mut resolved = parent.canonicalize().context(Operation::Validate)?;
			if let Some(name) = path.file_name() {
				resolved.push(name);
			}
			policy.check(&resolved)?;
			Ok(Access::new(Kind::File, false, true))
		}
		Err(err) => Err(Error::io(Operation::Validate, err))
	}
}

fn existing_access(meta: &Metadata) -> Access {
	match classify(meta.file_type()) {
		Kind::File if meta.permissions().readonly() => Access::new(Kind::File, true, false),
		Kind::Unsupported => Access::new(Kind::Unsupported, false, false),
		kind => Access::new(kind, true, true)
	}
}

fn classify(file_type: FileType) -> Kind {
	if file_type.is_file() {
		Kind::File
	} else if file_type.is_dir() {
		Kind::Unsupported
	} else {
		classify_special(file_type)
	}
}

cfg_if! {
	if #[cfg(unix)] {
		fn classify_special(file_type: FileType) -> Kind {
			use std::os::unix::fs::FileTypeExt;

			if file_type.is_fifo() {
				Kind::Pipe
			} else if file_type.is_char_device() || file_type.is_block_device() {
				Kind::File
			} else {
				Kind::Unsupported
			}
		}
	} else {
		fn classify_special(_: FileType) -> Kind { Kind::Unsupported }
	}
}

/// Opens a file at `path`, choosing access from its existence and permissions:
/// write-create if it doesn't exist, read-only if it's readonly or can't be
/// opened for writing, read-write otherwise.
fn open_file(path: &Path) -> Result<FileDevice> {
	let (file, readable, writable) = match fs::metadata(path) {
		Err(err) if err.kind() == io::ErrorKind::NotFound => {
			let file = OpenOptions::new()
				.write(true)
				.create(true)
				.open(path)
				.context(Operation::Open)?;
			(file, false, true)
		}
		Err(err) => return Err(Error::io(Operation::Open, err)),
		Ok(meta) if meta.permissions().readonly() =>
			(File::open(path).context(Operation::Open)?, true, false),
		Ok(_) => match OpenOptions::new().read(true).write(true).open(path) {
			Ok(file) => (file, true, true),
			Err(err) if err.kind() == io::ErrorKind::PermissionDenied =>
				(File::open(path).context(Operation::Open)?, true, false),
			Err(err) => return Err(Error::io(Operation::Open, err))
		}
	};
	debug!(path = %path.display(), readable, writable, "opened file");
	Ok(FileDevice::new(file, readable, writable))
}

#[cfg(test)]
mod test {
	use tempfile::tempdir;
	use crate::ErrorClass;
	use super::*;

	#[test]
	fn std_pipe_names() {
		assert_eq!("stdin".parse::<StdPipe>(), Ok(StdPipe::Stdin));
		assert_eq!("stderr".parse::<StdPipe>(), Ok(StdPipe::Stderr));
		assert_eq!("STDOUT".parse::<StdPipe>(), Err(()));
		assert_eq!(StdPipe::Stdout.to_string(), "stdout");
	}

	#[test]
	fn new_file_is_write_only() -> Result {
		let dir = tempdir().context(Operation::Unknown)?;
		let access = Target::from(dir.path().join("new.txt")).validate(&PathPolicy::default())?;
		assert_eq!(access, Access::new(Kind::File, false, true));
		Ok(())
	}

	#[test]
	fn missing_parent_is_rejected() -> Result {
		let dir = tempdir().context(Operation::Unknown)?;
		let err = Target::from(dir.path().join("missing/new.txt"))
			.validate(&PathPolicy::default())
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotFound);
		assert_eq!(err.class(), ErrorClass::Validation);
		Ok(())
	}

	#[test]
	fn protected_root_is_rejected() -> Result {
		let dir = tempdir().context(Operation::Unknown)?;
		let path = dir.path().join("file.txt");
		fs::write(&path, b"data").context(Operation::Unknown)?;

		let err = Target::from(path.clone())
			.validate(&PathPolicy::protect(dir.path()))
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::UnsafePath);
		let access = Target::from(path).validate(&PathPolicy::unrestricted())?;
		assert_eq!(access, Access::new(Kind::File, true, true));
		Ok(())
	}

	#[test]
	fn directories_are_unsupported() -> Result {
		let dir = tempdir().context(Operation::Unknown)?;
		let target = Target::from(dir.path());
		let access = target.validate(&PathPolicy::default())?;
		assert_eq!(access.kind, Kind::Unsupported);
		let err = target.open(access.kind).err().map(|err| err.class());
		assert_eq!(err, Some(ErrorClass::UnsupportedOperation));
		Ok(())
	}

	#[test]
	fn handles_are_borrowed() -> Result {
		let dir = tempdir().context(Operation::Unknown)?;
		let file = File::create(dir.path().join("file.txt")).context(Operation::Unknown)?;
		assert!(!Target::file(&file).context(Operation::Unknown)?.owns_connection());
		assert!(Target::Pipe(StdPipe::Stdout).owns_connection());
		Ok(())
	}
}
