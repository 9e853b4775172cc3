// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io;
use std::io::{Seek, SeekFrom, Write};
use crate::poller::Probe;
use super::{Device, Kind, read_probe, released, write_probe};

/// A [`Device`] reading from and writing to a regular [file](File).
#[derive(Debug)]
pub struct FileDevice {
	file: Option<File>,
	readable: bool,
	writable: bool,
	at_end: bool,
}

impl FileDevice {
	/// Wraps `file`, opened with the given access.
	pub fn new(file: File, readable: bool, writable: bool) -> Self {
		Self {
			file: Some(file),
			readable,
			writable,
			at_end: false,
		}
	}

	fn file(&mut self) -> io::Result<&mut File> {
		self.file.as_mut().ok_or_else(released)
	}
}

impl Device for FileDevice {
	fn kind(&self) -> Kind { Kind::File }

	fn is_readable(&self) -> bool { self.readable }

	fn is_writable(&self) -> bool { self.writable }

	/// Reads from the current position. Reaching the end is not terminal: data
	/// appended to the file later is read by the next call.
	fn raw_read(&mut self, len: usize) -> io::Result<Probe<Vec<u8>>> {
		let mut at_end = false;
		let probe = read_probe(self.file()?, len, &mut at_end);
		self.at_end = at_end;
		probe
	}

	fn raw_write(&mut self, data: &[u8]) -> io::Result<usize> {
		write_probe(self.file()?, data)
	}

	fn at_end(&self) -> bool { self.at_end }

	fn release(&mut self) -> io::Result<()> {
		match self.file.take() {
			Some(mut file) => file.flush(),
			None => Err(released())
		}
	}

	fn seek_end(&mut self) -> io::Result<()> {
		self.file()?.seek(SeekFrom::End(0))?;
		Ok(())
	}
}
