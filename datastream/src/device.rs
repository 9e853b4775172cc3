// SPDX-License-Identifier: Apache-2.0

//! Raw device access. Each endpoint kind has one [`Device`] implementation
//! exposing the same primitives; endpoints dispatch through the trait object
//! and never touch OS handles directly.

mod file;
mod generic;
mod nonblocking;
mod pipe;
mod socket;

pub use file::FileDevice;
pub use generic::GenericDevice;
pub use pipe::{PipeDevice, PipeEnd};
pub use socket::SocketDevice;

use std::io;
use std::io::{ErrorKind, Read, Write};
use amplify_derive::Display;
use crate::poller::Probe;
use nonblocking::NonBlocking;

/// The kind of OS resource behind an endpoint.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Hash)]
pub enum Kind {
	#[display("file")]
	File,
	#[display("pipe")]
	Pipe,
	#[display("socket")]
	Socket,
	#[display("generic")]
	Generic,
	#[display("unsupported")]
	Unsupported,
}

impl Kind {
	/// Returns `true` if reads on this kind go through a poller.
	pub fn is_polled(self) -> bool {
		matches!(self, Self::Pipe | Self::Socket | Self::Generic)
	}

	pub(crate) fn name(self) -> &'static str {
		match self {
			Self::File        => "file",
			Self::Pipe        => "pipe",
			Self::Socket      => "socket",
			Self::Generic     => "generic",
			Self::Unsupported => "unsupported",
		}
	}
}

/// An open device.
pub trait Device: Send {
	/// Returns the device kind.
	fn kind(&self) -> Kind;

	/// Returns `true` if the device was opened for reading.
	fn is_readable(&self) -> bool;

	/// Returns `true` if the device was opened for writing.
	fn is_writable(&self) -> bool;

	/// Reads at most `len` bytes. Returns [`Probe::Miss`] if nothing is available
	/// right now, and [`Probe::End`] at the end of the stream.
	fn raw_read(&mut self, len: usize) -> io::Result<Probe<Vec<u8>>>;

	/// Writes bytes from `data`, returning the number written. Returns `0` if the
	/// device can't accept data right now.
	fn raw_write(&mut self, data: &[u8]) -> io::Result<usize>;

	/// Returns `true` once a read has reached the end of the stream.
	fn at_end(&self) -> bool;

	/// Flushes data buffered between the device and the OS.
	fn flush(&mut self) -> io::Result<()> { Ok(()) }

	/// Flushes and releases the underlying handle. Subsequent calls fail.
	fn release(&mut self) -> io::Result<()>;

	/// Positions the device at its end before appending writes. Only meaningful
	/// for seekable devices.
	fn seek_end(&mut self) -> io::Result<()> { Ok(()) }
}

fn released() -> io::Error {
	io::Error::new(ErrorKind::NotConnected, "device was released")
}

/// Reads at most `len` bytes from `reader` as a probe.
fn read_probe<R: Read + ?Sized>(reader: &mut R, len: usize, at_end: &mut bool) -> io::Result<Probe<Vec<u8>>> {
	let mut buf = vec![0; len];
	match reader.read(&mut buf) {
		Ok(0) if len > 0 => {
			*at_end = true;
			Ok(Probe::End)
		}
		Ok(0) => Ok(Probe::Miss),
		Ok(count) => {
			*at_end = false;
			buf.truncate(count);
			Ok(Probe::Hit(buf))
		}
		Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) =>
			Ok(Probe::Miss),
		Err(err) => Err(err)
	}
}

/// Writes `data` to `writer`, treating a blocked writer as zero bytes written.
fn write_probe<W: Write + ?Sized>(writer: &mut W, data: &[u8]) -> io::Result<usize> {
	match writer.write(data) {
		Ok(count) => Ok(count),
		Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => Ok(0),
		Err(err) => Err(err)
	}
}

#[cfg(test)]
mod test {
	use std::io::Cursor;
	use super::*;

	#[test]
	fn probe_reads() {
		let mut reader = Cursor::new(b"abc".to_vec());
		let mut at_end = false;
		assert_eq!(read_probe(&mut reader, 2, &mut at_end).unwrap(), Probe::Hit(b"ab".to_vec()));
		assert_eq!(read_probe(&mut reader, 2, &mut at_end).unwrap(), Probe::Hit(b"c".to_vec()));
		assert!(!at_end);
		assert_eq!(read_probe(&mut reader, 2, &mut at_end).unwrap(), Probe::End);
		assert!(at_end);
	}
}
