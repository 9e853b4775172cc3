// SPDX-License-Identifier: Apache-2.0

//! A device-agnostic, mode-aware read buffer.
//!
//! Bytes pulled from a device are [appended](StreamBuffer::append) to the buffer,
//! which projects them into the units of its active [`Mode`]: raw bytes, whole
//! characters, or terminated lines. Bytes that can't be resolved into a unit yet,
//! like the first half of a multibyte character or an unterminated line, wait in
//! *pending* until more data arrives or the input [finishes](StreamBuffer::finish).
//!
//! Projected units are kept in the *cache* along with a cursor marking how many
//! have been consumed. Consumed units are kept as history until the cache grows
//! past its size limit, at which point the consumed prefix is trimmed. Unread
//! units are never trimmed.

mod project;
mod unit;

pub use unit::*;

use std::{fmt, mem};
use std::fmt::{Debug, Formatter};
use all_asserts::debug_assert_le;
use tracing::trace;
use crate::charset::{CharsetRef, Utf8};
use crate::Result;

/// Mode-projected units.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Cache {
	Raw(Vec<u8>),
	Char(Vec<Char>),
	Line(Vec<Line>),
}

impl Cache {
	fn empty(mode: Mode) -> Self {
		match mode {
			Mode::Raw  => Self::Raw(Vec::new()),
			Mode::Char => Self::Char(Vec::new()),
			Mode::Line => Self::Line(Vec::new()),
		}
	}

	fn mode(&self) -> Mode {
		match self {
			Self::Raw (_) => Mode::Raw,
			Self::Char(_) => Mode::Char,
			Self::Line(_) => Mode::Line,
		}
	}

	fn len(&self) -> usize {
		match self {
			Self::Raw (cache) => cache.len(),
			Self::Char(cache) => cache.len(),
			Self::Line(cache) => cache.len(),
		}
	}

	fn drain_front(&mut self, count: usize) {
		match self {
			Self::Raw (cache) => { cache.drain(..count); }
			Self::Char(cache) => { cache.drain(..count); }
			Self::Line(cache) => { cache.drain(..count); }
		}
	}

	/// Clones `count` units starting at `start`, unwrapping the unit if `single`.
	fn project(&self, start: usize, count: usize, single: bool) -> Output {
		let range = start..start + count;
		if single {
			Output::Unit(
				match self {
					Self::Raw (cache) => Unit::Byte(cache[start]),
					Self::Char(cache) => Unit::Char(cache[start].clone()),
					Self::Line(cache) => Unit::Line(cache[start].clone()),
				}
			)
		} else {
			Output::Units(
				match self {
					Self::Raw (cache) => Units::Bytes(cache[range].to_vec()),
					Self::Char(cache) => Units::Chars(cache[range].to_vec()),
					Self::Line(cache) => Units::Lines(cache[range].to_vec()),
				}
			)
		}
	}

	/// Concatenates the bytes of units from `start` onward.
	fn bytes_from(&self, start: usize) -> Vec<u8> {
		match self {
			Self::Raw (cache) => cache[start..].to_vec(),
			Self::Char(cache) => cache[start..].iter().flat_map(Char::as_bytes).copied().collect(),
			Self::Line(cache) => cache[start..].concat(),
		}
	}
}

/// A mode-aware buffer of data pulled from a device. See the [module docs](self).
#[derive(Clone)]
pub struct StreamBuffer {
	cache: Cache,
	pending: Vec<u8>,
	position: usize,
	max_size: usize,
	charset: CharsetRef,
	/// Incremented whenever the buffer takes in data, to detect fills that could
	/// not add anything.
	generation: u64,
}

impl Default for StreamBuffer {
	fn default() -> Self { Self::new(Mode::Raw) }
}

impl Debug for StreamBuffer {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("StreamBuffer")
			.field("mode", &self.mode())
			.field("size", &self.cache.len())
			.field("position", &self.position)
			.field("pending", &self.pending.len())
			.field("max_size", &self.max_size)
			.field("charset", &self.charset.name())
			.finish_non_exhaustive()
	}
}

impl StreamBuffer {
	/// Creates an empty, unbounded buffer in `mode`, using UTF-8 for characters.
	pub fn new(mode: Mode) -> Self {
		Self {
			cache: Cache::empty(mode),
			pending: Vec::new(),
			position: 0,
			max_size: 0,
			charset: std::sync::Arc::new(Utf8),
			generation: 0,
		}
	}

	/// Sets the soft limit on retained units, trimming consumed units if needed.
	/// A limit of `0` retains everything.
	pub fn with_max_size(mut self, max_size: usize) -> Self {
		self.set_max_size(max_size);
		self
	}

	/// Sets the charset used to cut characters in char mode.
	pub fn with_charset(mut self, charset: CharsetRef) -> Self {
		self.set_charset(charset);
		self
	}

	/// Returns the active mode.
	pub fn mode(&self) -> Mode { self.cache.mode() }

	/// Returns the active charset.
	pub fn charset(&self) -> &CharsetRef { &self.charset }

	/// Returns the soft limit on retained units.
	pub fn max_size(&self) -> usize { self.max_size }

	/// Returns the number of units in the cache, consumed or not.
	pub fn size(&self) -> usize { self.cache.len() }

	/// Returns the number of consumed units still in the cache.
	pub fn position(&self) -> usize { self.position }

	/// Returns the number of unread units in the cache.
	pub fn available(&self) -> usize { self.cache.len() - self.position }

	/// Returns the bytes not yet resolved into a unit.
	pub fn pending(&self) -> &[u8] { &self.pending }

	/// Returns `true` if there are no unread units and nothing pending.
	pub fn is_empty(&self) -> bool {
		self.available() == 0 && self.pending.is_empty()
	}

	/// Sets the soft limit on retained units, trimming consumed units if needed.
	pub fn set_max_size(&mut self, max_size: usize) {
		self.max_size = max_size;
		self.trim();
	}

	/// Appends bytes, projecting as many as possible into units of the active
	/// mode. The remainder is kept pending.
	pub fn append(&mut self, bytes: &[u8]) {
		if bytes.is_empty() { return }

		self.generation += 1;
		let Self { cache, pending, charset, .. } = self;
		match cache {
			Cache::Raw(cache) => {
				debug_assert!(pending.is_empty(), "raw mode should not have pending data");
				cache.extend_from_slice(bytes);
			}
			Cache::Char(cache) => {
				pending.extend_from_slice(bytes);
				let rem = charset.split(pending, &mut |char| cache.push(Char::new(char)));
				pending.drain(..pending.len() - rem);
			}
			Cache::Line(cache) => {
				pending.extend_from_slice(bytes);
				// Pending never holds a terminator, only new bytes can complete a line.
				if bytes.contains(&b'\n') {
					let rem = project::split_lines(pending, cache);
					pending.drain(..pending.len() - rem);
				}
			}
		}
		self.trim();
	}

	/// Resolves pending bytes at the end of input: an unterminated line becomes
	/// a final line, and the bytes of an incomplete character become individual
	/// units. Returns `true` if any units were added.
	pub fn finish(&mut self) -> bool {
		if self.pending.is_empty() { return false }

		self.generation += 1;
		let pending = mem::take(&mut self.pending);
		match &mut self.cache {
			Cache::Raw (cache) => cache.extend_from_slice(&pending),
			Cache::Char(cache) => cache.extend(pending.iter().map(|byte| Char::new(&[*byte]))),
			Cache::Line(cache) => cache.push(pending),
		}
		self.trim();
		true
	}

	/// Returns up to `count` unread units without consuming them, or `None` if
	/// nothing is available.
	pub fn peek(&self, count: usize) -> Option<Output> {
		self.project(count)
	}

	/// Returns up to `count` unread units without consuming them, calling `fill`
	/// with the number of missing units while the cache can't satisfy the request.
	/// `fill` is expected to [append](Self::append) to the buffer; filling stops
	/// once a call adds nothing.
	///
	/// Returns `None` if no units could be produced at all. A result shorter than
	/// `count` means the device was exhausted for now.
	pub fn peek_with<F>(&mut self, count: usize, fill: F) -> Result<Option<Output>>
	where F: FnMut(&mut Self, usize) -> Result {
		self.fill(count, fill)?;
		Ok(self.project(count))
	}

	/// Reads up to `count` units, or `None` if nothing is available.
	pub fn read(&mut self, count: usize) -> Option<Output> {
		let output = self.project(count)?;
		self.consume(output.count());
		Some(output)
	}

	/// Reads up to `count` units, filling as in [`peek_with`](Self::peek_with).
	pub fn read_with<F>(&mut self, count: usize, fill: F) -> Result<Option<Output>>
	where F: FnMut(&mut Self, usize) -> Result {
		self.fill(count, fill)?;
		Ok(self.read(count))
	}

	/// Empties the buffer, returning all unread and pending bytes.
	pub fn flush(&mut self) -> Vec<u8> {
		let mut bytes = self.cache.bytes_from(self.position);
		bytes.append(&mut self.pending);
		self.cache = Cache::empty(self.mode());
		self.position = 0;
		bytes
	}

	/// Switches the active mode, re-projecting the cache and cursor. Switching
	/// into line mode while the cursor is mid-line splits the line at the cursor.
	pub fn set_mode(&mut self, mode: Mode) {
		let current = self.mode();
		if current == mode { return }

		trace!(from = %current, to = %mode, "switching buffer mode");
		self.to_raw();
		match mode {
			Mode::Raw  => { }
			Mode::Char => self.raw_to_chars(),
			Mode::Line => self.raw_to_lines(),
		}
		self.trim();
	}

	/// Sets the charset, re-projecting the cache in char mode.
	pub fn set_charset(&mut self, charset: CharsetRef) {
		if self.mode() == Mode::Char {
			self.to_raw();
			self.charset = charset;
			self.raw_to_chars();
			self.trim();
		} else {
			self.charset = charset;
		}
	}

	fn fill<F>(&mut self, count: usize, mut fill: F) -> Result
	where F: FnMut(&mut Self, usize) -> Result {
		loop {
			let available = self.available();
			if available >= count { break }

			let generation = self.generation;
			fill(self, count - available)?;
			if self.generation == generation { break }
		}
		Ok(())
	}

	/// Projects up to `count` unread units. A request for exactly one unit yields
	/// the bare unit.
	fn project(&self, count: usize) -> Option<Output> {
		let available = count.min(self.available());
		(available > 0).then(|| self.cache.project(self.position, available, count == 1))
	}

	fn consume(&mut self, count: usize) {
		self.position += count;
		debug_assert_le!(self.position, self.cache.len());
	}

	/// Drops the consumed prefix beyond the size limit. Unread units are kept
	/// even if they alone exceed it.
	fn trim(&mut self) {
		if self.max_size == 0 { return }

		let excess = self.cache.len().saturating_sub(self.max_size);
		let count = excess.min(self.position);
		if count > 0 {
			self.cache.drain_front(count);
			self.position -= count;
		}
	}
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use crate::charset;
	use super::*;

	fn line(line: &str) -> Output {
		Output::Unit(Unit::Line(line.as_bytes().to_vec()))
	}

	#[test]
	fn raw_peek_read() {
		let mut buf = StreamBuffer::new(Mode::Raw);
		buf.append(b"hello");
		assert_eq!(buf.peek(1), Some(Output::Unit(Unit::Byte(b'h'))));
		assert_eq!(buf.read(3), Some(Output::Units(Units::Bytes(b"hel".to_vec()))));
		assert_eq!(buf.read(5), Some(Output::Units(Units::Bytes(b"lo".to_vec()))));
		assert_eq!(buf.read(1), None);
	}

	#[test]
	fn lines_keep_terminators() {
		let mut buf = StreamBuffer::new(Mode::Line);
		buf.append(b"1\n2 a\r\n3 b");
		assert_eq!(buf.read(1), Some(line("1\n")));
		assert_eq!(buf.read(1), Some(line("2 a\r\n")));
		assert_eq!(buf.read(1), None);
		assert_eq!(buf.pending(), b"3 b");
		buf.append(b"\n");
		assert_eq!(buf.read(1), Some(line("3 b\n")));
	}

	#[test]
	fn char_boundary() {
		let mut buf = StreamBuffer::new(Mode::Char);
		let bytes = "a—b".as_bytes();
		buf.append(&bytes[..2]);
		assert_eq!(buf.available(), 1);
		assert_eq!(buf.pending(), &bytes[1..2]);
		buf.append(&bytes[2..]);
		assert_eq!(buf.available(), 3);
		assert_eq!(buf.read(3).unwrap().to_string(), "a—b");
	}

	#[test]
	fn fill_until_satisfied() {
		let mut buf = StreamBuffer::new(Mode::Line);
		let mut chunks = vec![&b"c\n"[..], b"b", b"a\n"];
		let mut requests = Vec::new();
		let output = buf.peek_with(2, |buf, need| {
			requests.push(need);
			if let Some(chunk) = chunks.pop() {
				buf.append(chunk);
			}
			Ok(())
		}).unwrap();
		assert_eq!(output.unwrap().into_lines().unwrap(), [b"a\n".to_vec(), b"bc\n".to_vec()]);
		assert_eq!(requests, [2, 1, 1]);
		assert_eq!(buf.position(), 0);
	}

	#[test]
	fn fill_stops_when_exhausted() {
		let mut buf = StreamBuffer::new(Mode::Raw);
		let mut calls = 0;
		let output = buf.read_with(4, |buf, _| {
			calls += 1;
			if calls == 1 {
				buf.append(b"ab");
			}
			Ok(())
		}).unwrap();
		assert_eq!(output, Some(Output::Units(Units::Bytes(b"ab".to_vec()))));
		assert_eq!(calls, 2);
		assert_eq!(buf.read_with(1, |_, _| Ok(())).unwrap(), None);
	}

	#[test]
	fn fill_error_keeps_cursor() {
		let mut buf = StreamBuffer::new(Mode::Raw);
		buf.append(b"x");
		let result = buf.read_with(2, |_, _| Err(crate::Error::closed(crate::Operation::Read)));
		assert!(result.is_err());
		assert_eq!(buf.position(), 0);
		assert_eq!(buf.available(), 1);
	}

	#[test]
	fn trim_keeps_unread() {
		let mut buf = StreamBuffer::new(Mode::Raw).with_max_size(4);
		buf.append(b"abcdef");
		assert_eq!(buf.size(), 6);
		buf.read(3);
		buf.append(b"g");
		// Seven units, limit of four, but only three were consumed.
		assert_eq!(buf.size(), 4);
		assert_eq!(buf.position(), 0);
		assert_eq!(buf.read(4).unwrap().into_bytes(), b"defg");
	}

	#[test]
	fn flush_returns_unread_and_pending() {
		let mut buf = StreamBuffer::new(Mode::Line);
		buf.append(b"one\ntwo\nthr");
		buf.read(1);
		assert_eq!(buf.flush(), b"two\nthr");
		assert!(buf.is_empty());
		assert_eq!(buf.size(), 0);
		assert_eq!(buf.mode(), Mode::Line);
	}

	#[test]
	fn finish_resolves_pending() {
		let mut buf = StreamBuffer::new(Mode::Line);
		buf.append(b"a\nb");
		assert!(buf.finish());
		assert!(!buf.finish());
		assert_eq!(buf.read(2).unwrap().into_lines().unwrap(), [b"a\n".to_vec(), b"b".to_vec()]);

		let mut buf = StreamBuffer::new(Mode::Char);
		buf.append(&"é".as_bytes()[..1]);
		assert_eq!(buf.available(), 0);
		assert!(buf.finish());
		assert_eq!(buf.available(), 1);
	}

	#[test]
	fn charset_switch_reprojects() {
		let mut buf = StreamBuffer::new(Mode::Char);
		buf.append("éa".as_bytes());
		assert_eq!(buf.available(), 2);
		buf.set_charset(charset::lookup("latin1").unwrap());
		assert_eq!(buf.available(), 3);
		assert_eq!(buf.charset().name(), "ISO-8859-1");
	}
}
