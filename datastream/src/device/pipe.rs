// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io;
use std::io::{ErrorKind, Stderr, Stdin, Stdout, Write};
use std::process::{ChildStderr, ChildStdin, ChildStdout};
use crate::poller::Probe;
use super::{Device, Kind, NonBlocking, read_probe, released, write_probe};

/// One end of a pipe.
#[derive(Debug)]
pub enum PipeEnd {
	Stdin(Stdin),
	Stdout(Stdout),
	Stderr(Stderr),
	/// A named pipe, opened for both reading and writing.
	Fifo(File),
	ChildStdin(ChildStdin),
	ChildStdout(ChildStdout),
	ChildStderr(ChildStderr),
}

impl PipeEnd {
	fn is_readable(&self) -> bool {
		matches!(self, Self::Stdin(_) | Self::Fifo(_) | Self::ChildStdout(_) | Self::ChildStderr(_))
	}

	fn is_writable(&self) -> bool {
		matches!(self, Self::Stdout(_) | Self::Stderr(_) | Self::Fifo(_) | Self::ChildStdin(_))
	}
}

/// A [`Device`] over a standard stream, named pipe, or child process pipe.
///
/// On unix, readable ends are switched to non-blocking mode while the device
/// holds them, so the endpoint's poller sees empty probes. Elsewhere, reads may
/// block until data arrives.
#[derive(Debug)]
pub struct PipeDevice {
	// Dropped before the handle.
	mode: Option<NonBlocking>,
	end: Option<PipeEnd>,
	readable: bool,
	writable: bool,
	at_end: bool,
}

impl PipeDevice {
	/// Wraps `end`, switching it to non-blocking mode if it's readable.
	pub fn new(end: PipeEnd) -> io::Result<Self> {
		let mode = match &end {
			PipeEnd::Stdin      (pipe) => Some(NonBlocking::set(pipe)?),
			PipeEnd::Fifo       (pipe) => Some(NonBlocking::set(pipe)?),
			PipeEnd::ChildStdout(pipe) => Some(NonBlocking::set(pipe)?),
			PipeEnd::ChildStderr(pipe) => Some(NonBlocking::set(pipe)?),
			_ => None
		};
		Ok(Self {
			mode,
			readable: end.is_readable(),
			writable: end.is_writable(),
			end: Some(end),
			at_end: false,
		})
	}
}

fn wrong_direction() -> io::Error {
	io::Error::new(ErrorKind::Unsupported, "pipe end does not support this direction")
}

impl Device for PipeDevice {
	fn kind(&self) -> Kind { Kind::Pipe }

	fn is_readable(&self) -> bool { self.readable }

	fn is_writable(&self) -> bool { self.writable }

	fn raw_read(&mut self, len: usize) -> io::Result<Probe<Vec<u8>>> {
		if self.at_end { return Ok(Probe::End) }

		let Self { end, at_end, .. } = self;
		match end.as_mut().ok_or_else(released)? {
			PipeEnd::Stdin      (pipe) => read_probe(pipe, len, at_end),
			PipeEnd::Fifo       (pipe) => read_probe(pipe, len, at_end),
			PipeEnd::ChildStdout(pipe) => read_probe(pipe, len, at_end),
			PipeEnd::ChildStderr(pipe) => read_probe(pipe, len, at_end),
			_ => Err(wrong_direction())
		}
	}

	fn raw_write(&mut self, data: &[u8]) -> io::Result<usize> {
		match self.end.as_mut().ok_or_else(released)? {
			PipeEnd::Stdout    (pipe) => write_probe(pipe, data),
			PipeEnd::Stderr    (pipe) => write_probe(pipe, data),
			PipeEnd::Fifo      (pipe) => write_probe(pipe, data),
			PipeEnd::ChildStdin(pipe) => write_probe(pipe, data),
			_ => Err(wrong_direction())
		}
	}

	fn at_end(&self) -> bool { self.at_end }

	fn flush(&mut self) -> io::Result<()> {
		match self.end.as_mut().ok_or_else(released)? {
			PipeEnd::Stdout    (pipe) => pipe.flush(),
			PipeEnd::Stderr    (pipe) => pipe.flush(),
			PipeEnd::Fifo      (pipe) => pipe.flush(),
			PipeEnd::ChildStdin(pipe) => pipe.flush(),
			_ => Ok(())
		}
	}

	/// Flushes writable ends and drops the handle. Standard streams belong to the
	/// process and stay open.
	fn release(&mut self) -> io::Result<()> {
		self.mode = None;
		match self.end.take() {
			Some(PipeEnd::Stdout    (mut pipe)) => pipe.flush(),
			Some(PipeEnd::Stderr    (mut pipe)) => pipe.flush(),
			Some(PipeEnd::Fifo      (mut pipe)) => pipe.flush(),
			Some(PipeEnd::ChildStdin(mut pipe)) => pipe.flush(),
			Some(_) => Ok(()),
			None => Err(released())
		}
	}
}
