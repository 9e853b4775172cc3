// SPDX-License-Identifier: Apache-2.0

//! Multibyte character segmentation. The buffer never decodes characters itself,
//! it only asks a [`Charset`] how wide the character at some byte offset is. This
//! keeps char mode byte-exact: a character unit is always the exact bytes it was
//! cut from, whether or not those bytes decode to anything.

mod utf8;

use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
pub use utf8::Utf8;

/// A shared charset reference.
pub type CharsetRef = Arc<dyn Charset>;

/// The width of the character at the start of a byte slice.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Width {
	/// A whole character unit of this many bytes. Bytes which are invalid in the
	/// charset are reported as complete one-byte units.
	Complete(usize),
	/// The slice ends before the character does; more bytes are needed.
	Incomplete,
}

/// A multibyte encoding, providing the "cut N characters" primitive.
pub trait Charset: Debug + Send + Sync {
	/// The canonical name of the charset.
	fn name(&self) -> &'static str;

	/// Returns the width of the character starting at `bytes[0]`. `bytes` is
	/// never empty.
	fn width(&self, bytes: &[u8]) -> Width;

	/// Decodes a single character unit, returning `None` if the unit is not a
	/// valid character.
	fn decode(&self, unit: &[u8]) -> Option<char>;

	/// Returns the byte length of at most `count` whole characters starting at
	/// byte offset `start`. The cut stops short at an incomplete character.
	fn cut(&self, bytes: &[u8], start: usize, count: usize) -> usize {
		let mut len = 0;
		let mut rem = &bytes[start.min(bytes.len())..];
		for _ in 0..count {
			if rem.is_empty() { break }
			match self.width(rem) {
				Width::Complete(width) => {
					len += width;
					rem = &rem[width..];
				}
				Width::Incomplete => break
			}
		}
		len
	}

	/// Splits `bytes` into whole character units, calling `unit` on each, and
	/// returns the length of the trailing incomplete character, if any.
	fn split<'a>(&self, bytes: &'a [u8], unit: &mut dyn FnMut(&'a [u8])) -> usize {
		let mut rem = bytes;
		while !rem.is_empty() {
			match self.width(rem) {
				Width::Complete(width) => {
					let (char, next) = rem.split_at(width);
					unit(char);
					rem = next;
				}
				Width::Incomplete => break
			}
		}
		rem.len()
	}
}

#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
#[error("unsupported charset")]
pub struct UnknownCharset;

/// Looks up a built-in charset by name, ignoring case.
pub fn lookup(name: &str) -> Result<CharsetRef, UnknownCharset> {
	let name = name.trim().to_ascii_lowercase();
	let charset: CharsetRef = match name.as_str() {
		"utf-8" | "utf8" => Arc::new(Utf8),
		"ascii" | "us-ascii" => Arc::new(Ascii),
		"iso-8859-1" | "latin1" | "latin-1" => Arc::new(Latin1),
		"utf-16le" | "utf16le" => Arc::new(Utf16::Le),
		"utf-16be" | "utf16be" => Arc::new(Utf16::Be),
		_ => return Err(UnknownCharset)
	};
	Ok(charset)
}

/// 7-bit ASCII. Bytes above `0x7F` are undecodable single-byte units.
#[derive(Copy, Clone, Debug, Default)]
pub struct Ascii;

impl Charset for Ascii {
	fn name(&self) -> &'static str { "ASCII" }

	fn width(&self, _: &[u8]) -> Width { Width::Complete(1) }

	fn decode(&self, unit: &[u8]) -> Option<char> {
		match unit {
			&[byte] if byte.is_ascii() => Some(byte as char),
			_ => None
		}
	}
}

/// ISO-8859-1, mapping every byte to the code point of the same value.
#[derive(Copy, Clone, Debug, Default)]
pub struct Latin1;

impl Charset for Latin1 {
	fn name(&self) -> &'static str { "ISO-8859-1" }

	fn width(&self, _: &[u8]) -> Width { Width::Complete(1) }

	fn decode(&self, unit: &[u8]) -> Option<char> {
		match unit {
			&[byte] => Some(byte as char),
			_ => None
		}
	}
}

/// UTF-16 in either byte order. Unpaired surrogates are undecodable two-byte
/// units.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Utf16 {
	Le,
	Be,
}

impl Utf16 {
	fn code_unit(self, bytes: &[u8]) -> u16 {
		let pair = [bytes[0], bytes[1]];
		match self {
			Self::Le => u16::from_le_bytes(pair),
			Self::Be => u16::from_be_bytes(pair),
		}
	}
}

impl Charset for Utf16 {
	fn name(&self) -> &'static str {
		match self {
			Self::Le => "UTF-16LE",
			Self::Be => "UTF-16BE",
		}
	}

	fn width(&self, bytes: &[u8]) -> Width {
		if bytes.len() < 2 { return Width::Incomplete }

		let high = self.code_unit(bytes);
		if !(0xD800..0xDC00).contains(&high) {
			return Width::Complete(2)
		}
		if bytes.len() < 4 { return Width::Incomplete }

		let low = self.code_unit(&bytes[2..]);
		if (0xDC00..0xE000).contains(&low) {
			Width::Complete(4)
		} else {
			Width::Complete(2)
		}
	}

	fn decode(&self, unit: &[u8]) -> Option<char> {
		if unit.len() % 2 != 0 { return None }
		let units = unit.chunks_exact(2).map(|pair| self.code_unit(pair));
		let mut decoded = char::decode_utf16(units);
		match (decoded.next(), decoded.next()) {
			(Some(Ok(char)), None) => Some(char),
			_ => None
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn lookup_names() {
		assert_eq!(lookup("UTF-8").unwrap().name(), "UTF-8");
		assert_eq!(lookup("latin1").unwrap().name(), "ISO-8859-1");
		assert_eq!(lookup(" utf-16LE ").unwrap().name(), "UTF-16LE");
		assert_eq!(lookup("EBCDIC").unwrap_err(), UnknownCharset);
	}

	#[test]
	fn utf16_surrogates() {
		// U+1F600, then 'a'
		let bytes = [0x3D, 0xD8, 0x00, 0xDE, b'a', 0x00];
		let charset = Utf16::Le;
		assert_eq!(charset.width(&bytes), Width::Complete(4));
		assert_eq!(charset.width(&bytes[..3]), Width::Incomplete);
		assert_eq!(charset.decode(&bytes[..4]), Some('😀'));
		assert_eq!(charset.cut(&bytes, 0, 2), 6);
		assert_eq!(charset.cut(&bytes, 4, 1), 2);
	}

	#[test]
	fn latin1_round_trip() {
		let charset = Latin1;
		assert_eq!(charset.decode(&[0xE9]), Some('é'));
		assert_eq!(charset.cut(&[1, 2, 3], 1, 5), 2);
	}
}
