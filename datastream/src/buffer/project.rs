// SPDX-License-Identifier: Apache-2.0

//! Re-projection of the cache between modes. Every conversion pivots through
//! raw bytes, where the cursor is a byte offset. Projecting out of raw bytes
//! splits the consumed prefix and the unread suffix separately, so a cursor
//! sitting mid-character or mid-line never pulls consumed bytes back into an
//! unread unit.

use std::mem;
use super::{Cache, Char, Line, StreamBuffer};

/// Splits `bytes` after each `\n`, pushing terminated lines to `lines`. Returns
/// the length of the trailing unterminated fragment.
pub(super) fn split_lines(bytes: &[u8], lines: &mut Vec<Line>) -> usize {
	let mut rem = bytes;
	while let Some(end) = rem.iter().position(|&byte| byte == b'\n') {
		let (line, next) = rem.split_at(end + 1);
		lines.push(line.to_vec());
		rem = next;
	}
	rem.len()
}

impl StreamBuffer {
	/// Re-projects the cache as raw bytes, resolving pending bytes into it.
	pub(super) fn to_raw(&mut self) {
		let cursor = self.position;
		let (mut bytes, position) = match &self.cache {
			Cache::Raw(_) => return,
			Cache::Char(chars) => (
				chars.iter().flat_map(Char::as_bytes).copied().collect::<Vec<_>>(),
				chars[..cursor].iter().map(Char::len).sum::<usize>()
			),
			Cache::Line(lines) => (
				lines.concat(),
				lines[..cursor].iter().map(Vec::len).sum::<usize>()
			),
		};
		bytes.append(&mut self.pending);
		self.cache = Cache::Raw(bytes);
		self.position = position;
	}

	/// Re-projects a raw cache as characters.
	pub(super) fn raw_to_chars(&mut self) {
		let bytes = match mem::replace(&mut self.cache, Cache::Char(Vec::new())) {
			Cache::Raw(bytes) => bytes,
			cache => {
				debug_assert!(false, "expected a raw cache");
				self.cache = cache;
				return
			}
		};

		let (consumed, unread) = bytes.split_at(self.position);
		let mut chars = Vec::with_capacity(bytes.len());
		let rem = self.charset.split(consumed, &mut |char| chars.push(Char::new(char)));
		// A cursor inside a character leaves its consumed bytes as lone units.
		chars.extend(
			consumed[consumed.len() - rem..]
				.iter()
				.map(|byte| Char::new(&[*byte]))
		);
		let position = chars.len();
		let rem = self.charset.split(unread, &mut |char| chars.push(Char::new(char)));
		self.pending = unread[unread.len() - rem..].to_vec();
		self.cache = Cache::Char(chars);
		self.position = position;
	}

	/// Re-projects a raw cache as lines.
	pub(super) fn raw_to_lines(&mut self) {
		let bytes = match mem::replace(&mut self.cache, Cache::Line(Vec::new())) {
			Cache::Raw(bytes) => bytes,
			cache => {
				debug_assert!(false, "expected a raw cache");
				self.cache = cache;
				return
			}
		};

		let (consumed, unread) = bytes.split_at(self.position);
		let mut lines = Vec::new();
		let rem = split_lines(consumed, &mut lines);
		if rem > 0 {
			// Synthetic split at the cursor.
			lines.push(consumed[consumed.len() - rem..].to_vec());
		}
		let position = lines.len();
		let rem = split_lines(unread, &mut lines);
		self.pending = unread[unread.len() - rem..].to_vec();
		self.cache = Cache::Line(lines);
		self.position = position;
	}
}
