// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Debug, Formatter};
use std::io;
use std::io::{Read, Write};
use crate::poller::Probe;
use super::{Device, Kind, read_probe, released, write_probe};

/// A [`Device`] over arbitrary [`Read`]ers and [`Write`]rs, such as in-memory
/// streams or adapters around other libraries. Reads are polled, so readers
/// may return [`WouldBlock`](io::ErrorKind::WouldBlock) when nothing is ready.
pub struct GenericDevice {
	reader: Option<Box<dyn Read + Send>>,
	writer: Option<Box<dyn Write + Send>>,
	readable: bool,
	writable: bool,
	at_end: bool,
}

impl Debug for GenericDevice {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("GenericDevice")
			.field("readable", &self.readable)
			.field("writable", &self.writable)
			.field("at_end", &self.at_end)
			.finish_non_exhaustive()
	}
}

impl GenericDevice {
	pub fn new(
		reader: Option<Box<dyn Read + Send>>,
		writer: Option<Box<dyn Write + Send>>
	) -> Self {
		Self {
			readable: reader.is_some(),
			writable: writer.is_some(),
			reader,
			writer,
			at_end: false,
		}
	}

	/// Creates a read-only device.
	pub fn reader(reader: impl Read + Send + 'static) -> Self {
		Self::new(Some(Box::new(reader)), None)
	}

	/// Creates a write-only device.
	pub fn writer(writer: impl Write + Send + 'static) -> Self {
		Self::new(None, Some(Box::new(writer)))
	}
}

impl Device for GenericDevice {
	fn kind(&self) -> Kind { Kind::Generic }

	fn is_readable(&self) -> bool { self.readable }

	fn is_writable(&self) -> bool { self.writable }

	fn raw_read(&mut self, len: usize) -> io::Result<Probe<Vec<u8>>> {
		if self.at_end { return Ok(Probe::End) }
		let reader = self.reader.as_mut().ok_or_else(released)?;
		read_probe(reader, len, &mut self.at_end)
	}

	fn raw_write(&mut self, data: &[u8]) -> io::Result<usize> {
		write_probe(self.writer.as_mut().ok_or_else(released)?, data)
	}

	fn at_end(&self) -> bool { self.at_end }

	fn flush(&mut self) -> io::Result<()> {
		match self.writer.as_mut() {
			Some(writer) => writer.flush(),
			None => Ok(())
		}
	}

	fn release(&mut self) -> io::Result<()> {
		if self.reader.is_none() && self.writer.is_none() {
			return Err(released())
		}
		self.reader = None;
		match self.writer.take() {
			Some(mut writer) => writer.flush(),
			None => Ok(())
		}
	}
}
