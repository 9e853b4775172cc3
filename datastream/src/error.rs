// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{fmt, io, result};
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use amplify_derive::Display;

pub type ErrorBox = Box<dyn StdError + Send + Sync>;

pub type Result<T = ()> = result::Result<T, Error>;

/// The operation during which an error occurred.
#[derive(Copy, Clone, Debug, Default, Display, Eq, PartialEq)]
pub enum Operation {
	#[default]
	#[display("unknown operation")]
	Unknown,
	#[display("validate target")]
	Validate,
	#[display("configure")]
	Configure,
	#[display("open")]
	Open,
	#[display("read")]
	Read,
	#[display("peek")]
	Peek,
	#[display("write")]
	Write,
	#[display("flush")]
	Flush,
	#[display("close")]
	Close,
	#[display("switch mode")]
	Mode,
	#[display("poll")]
	Poll,
}

/// The broad class of an error. Every [`ErrorKind`] belongs to exactly one class,
/// so callers can branch without inspecting individual kinds.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Hash)]
pub enum ErrorClass {
	/// An unsafe or nonexistent path, or a malformed argument.
	#[display("validation error")]
	Validation,
	/// A directionality violation or permission denial.
	#[display("access error")]
	Access,
	/// An operation on a closed, halted, or failing connection.
	#[display("connection error")]
	Connection,
	/// An operation not defined for the device kind.
	#[display("unsupported operation")]
	UnsupportedOperation,
	/// A broken internal invariant. Should be unreachable.
	#[display("internal invariant error")]
	InternalInvariant,
}

#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
pub enum ErrorKind {
	#[display("invalid argument: {0}")]
	InvalidArgument(&'static str),
	#[display("not found")]
	NotFound,
	#[display("unsafe path")]
	UnsafePath,
	#[display("unknown option")]
	UnknownOption,
	#[display("invalid option value: {0}")]
	InvalidOption(&'static str),
	#[display("unsupported charset")]
	UnknownCharset,
	#[display("access denied")]
	NoAccess,
	#[display("endpoint is not readable")]
	NotReadable,
	#[display("endpoint is not writable")]
	NotWritable,
	#[display("endpoint already closed")]
	Closed,
	#[display("halted by previous error")]
	Halted,
	#[display("IO error")]
	Io,
	#[display("not supported for {0} endpoints")]
	Unsupported(&'static str),
	#[display("invariant violated: {0}")]
	Invariant(&'static str),
}

impl ErrorKind {
	/// Returns the taxonomy class this kind belongs to.
	pub fn class(self) -> ErrorClass {
		use ErrorKind::*;
		match self {
			InvalidArgument(_) |
			NotFound           |
			UnsafePath         |
			UnknownOption      |
			InvalidOption(_)   |
			UnknownCharset     => ErrorClass::Validation,
			NoAccess    |
			NotReadable |
			NotWritable => ErrorClass::Access,
			Closed |
			Halted |
			Io     => ErrorClass::Connection,
			Unsupported(_) => ErrorClass::UnsupportedOperation,
			Invariant(_)   => ErrorClass::InternalInvariant,
		}
	}
}

#[derive(Debug)]
pub struct Error {
	op: Operation,
	kind: ErrorKind,
	source: Option<ErrorBox>,
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let Self { op, kind, source } = self;
		if let Some(source) = source {
			write!(f, "{op} failed; {kind} ({source})")
		} else {
			write!(f, "{op} failed; {kind}")
		}
	}
}

impl StdError for Error {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		if let Some(ref source) = self.source {
			Some(source.as_ref())
		} else {
			None
		}
	}
}

impl Error {
	pub(crate) fn new(
		op: Operation,
		kind: ErrorKind,
		source: Option<ErrorBox>
	) -> Self {
		Self { op, kind, source }
	}

	/// Creates a new IO error.
	pub fn io(op: Operation, error: io::Error) -> Self {
		let kind = match error.kind() {
			io::ErrorKind::NotFound         => ErrorKind::NotFound,
			io::ErrorKind::PermissionDenied => ErrorKind::NoAccess,
			_                               => ErrorKind::Io,
		};
		Self::new(op, kind, Some(error.into()))
	}

	/// Creates a new "already closed" error.
	pub fn closed(op: Operation) -> Self { Self::new(op, ErrorKind::Closed, None) }

	/// Creates a new "halted by previous error" error.
	pub fn halted(op: Operation) -> Self { Self::new(op, ErrorKind::Halted, None) }

	/// Creates a new "not readable" error.
	pub fn not_readable(op: Operation) -> Self { Self::new(op, ErrorKind::NotReadable, None) }

	/// Creates a new "not writable" error.
	pub fn not_writable(op: Operation) -> Self { Self::new(op, ErrorKind::NotWritable, None) }

	/// Creates a new invalid argument error.
	pub fn invalid(op: Operation, message: &'static str) -> Self {
		Self::new(op, ErrorKind::InvalidArgument(message), None)
	}

	/// Creates a new unsupported operation error for a device kind.
	pub fn unsupported(op: Operation, kind: &'static str) -> Self {
		Self::new(op, ErrorKind::Unsupported(kind), None)
	}

	/// Creates a new internal invariant error.
	pub fn invariant(op: Operation, message: &'static str) -> Self {
		Self::new(op, ErrorKind::Invariant(message), None)
	}

	/// Returns the operation kind.
	pub fn operation(&self) -> Operation { self.op }

	/// Sets the operation kind.
	pub fn with_operation(mut self, op: Operation) -> Self {
		self.op = op;
		self
	}

	/// Returns the error kind.
	pub fn kind(&self) -> ErrorKind { self.kind }

	/// Returns the error class.
	pub fn class(&self) -> ErrorClass { self.kind.class() }

	/// Returns the source downcast into an IO Error, if possible.
	pub fn io_source(&self) -> Option<&io::Error> {
		self.source()?.downcast_ref()
	}
}

impl From<io::Error> for Error {
	fn from(value: io::Error) -> Self {
		Self::io(Operation::Unknown, value)
	}
}

/// Attaches an operation to fallible IO results.
pub(crate) trait ResultContext<T> {
	fn context(self, op: Operation) -> Result<T>;
}

impl<T> ResultContext<T> for io::Result<T> {
	fn context(self, op: Operation) -> Result<T> {
		self.map_err(|err| Error::io(op, err))
	}
}

impl<T> ResultContext<T> for Result<T> {
	fn context(self, op: Operation) -> Result<T> {
		self.map_err(|err| err.with_operation(op))
	}
}

#[cfg(test)]
mod test {
	use std::io;
	use super::*;

	#[test]
	fn io_kinds_map_to_taxonomy() {
		let err = Error::from(io::Error::from(io::ErrorKind::NotFound));
		assert_eq!(err.class(), ErrorClass::Validation);
		let err = Error::from(io::Error::from(io::ErrorKind::PermissionDenied));
		assert_eq!(err.class(), ErrorClass::Access);
		let err = Error::from(io::Error::from(io::ErrorKind::BrokenPipe));
		assert_eq!(err.kind(), ErrorKind::Io);
		assert!(err.io_source().is_some());
	}

	#[test]
	fn display() {
		let err = Error::halted(Operation::Read);
		assert_eq!(err.to_string(), "read failed; halted by previous error");
		let err = Error::unsupported(Operation::Write, "socket");
		assert_eq!(err.to_string(), "write failed; not supported for socket endpoints");
	}
}
