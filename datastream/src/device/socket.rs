// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::io::ErrorKind;
use std::net::{Shutdown, TcpStream};
use crate::poller::Probe;
use super::{Device, Kind, NonBlocking, read_probe, released};

/// A read-only [`Device`] over a non-blocking TCP stream.
///
/// A duplicated stream shares its blocking mode with the original. On unix, the
/// original mode is restored when the device is dropped or released.
#[derive(Debug)]
pub struct SocketDevice {
	// Dropped before the stream.
	mode: Option<NonBlocking>,
	stream: Option<TcpStream>,
	at_end: bool,
}

impl SocketDevice {
	/// Wraps `stream`, switching it to non-blocking mode.
	pub fn new(stream: TcpStream) -> io::Result<Self> {
		let mode = NonBlocking::set(&stream)?;
		if cfg!(not(unix)) {
			stream.set_nonblocking(true)?;
		}
		Ok(Self { mode: Some(mode), stream: Some(stream), at_end: false })
	}
}

impl Device for SocketDevice {
	fn kind(&self) -> Kind { Kind::Socket }

	fn is_readable(&self) -> bool { true }

	fn is_writable(&self) -> bool { false }

	fn raw_read(&mut self, len: usize) -> io::Result<Probe<Vec<u8>>> {
		if self.at_end { return Ok(Probe::End) }
		let stream = self.stream.as_mut().ok_or_else(released)?;
		read_probe(stream, len, &mut self.at_end)
	}

	fn raw_write(&mut self, _: &[u8]) -> io::Result<usize> {
		Err(io::Error::new(ErrorKind::Unsupported, "socket writes are not supported"))
	}

	fn at_end(&self) -> bool { self.at_end }

	fn release(&mut self) -> io::Result<()> {
		self.mode = None;
		let stream = self.stream.take().ok_or_else(released)?;
		match stream.shutdown(Shutdown::Both) {
			// The peer may have already closed the connection.
			Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
			result => result
		}
	}
}
