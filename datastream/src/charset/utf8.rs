// SPDX-License-Identifier: Apache-2.0

use simdutf8::compat::from_utf8;
use super::{Charset, Width};

// Char width copied from std

// https://tools.ietf.org/html/rfc3629
const UTF8_CHAR_WIDTH: &[u8; 256] = &[
	// 1  2  3  4  5  6  7  8  9  A  B  C  D  E  F
	1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0
	1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 1
	1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 2
	1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 3
	1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 4
	1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 5
	1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 6
	1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 7
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 8
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 9
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // A
	0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // B
	0, 0, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, // C
	2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, // D
	3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3, // E
	4, 4, 4, 4, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // F
];

#[inline]
const fn utf8_char_width(b: u8) -> usize {
	UTF8_CHAR_WIDTH[b as usize] as usize
}

/// UTF-8. Invalid sequences are cut into one-byte units, so only a truncated
/// but so-far valid sequence at the end of the input is ever incomplete.
#[derive(Copy, Clone, Debug, Default)]
pub struct Utf8;

impl Charset for Utf8 {
	fn name(&self) -> &'static str { "UTF-8" }

	fn width(&self, bytes: &[u8]) -> Width {
		let len = utf8_char_width(bytes[0]);
		if len <= 1 {
			// ASCII, or a byte which can't start a sequence.
			return Width::Complete(1)
		}

		if bytes.len() < len {
			return match from_utf8(bytes) {
				Err(err) if err.error_len().is_none() => Width::Incomplete,
				_ => Width::Complete(1)
			}
		}

		if from_utf8(&bytes[..len]).is_ok() {
			Width::Complete(len)
		} else {
			Width::Complete(1)
		}
	}

	fn decode(&self, unit: &[u8]) -> Option<char> {
		from_utf8(unit).ok()?.chars().next()
	}

	/// Validates the whole slice at once, only falling back to per-character
	/// widths past the first invalid or incomplete sequence.
	fn split<'a>(&self, mut bytes: &'a [u8], unit: &mut dyn FnMut(&'a [u8])) -> usize {
		loop {
			let valid_up_to = match from_utf8(bytes) {
				Ok(_) => bytes.len(),
				Err(err) => err.valid_up_to()
			};

			let (valid, rest) = bytes.split_at(valid_up_to);
			let mut offset = 0;
			for char in char_widths(valid) {
				unit(&valid[offset..offset + char]);
				offset += char;
			}

			if rest.is_empty() {
				return 0
			}

			match self.width(rest) {
				Width::Complete(width) => {
					unit(&rest[..width]);
					bytes = &rest[width..];
				}
				Width::Incomplete => return rest.len()
			}
		}
	}
}

/// Iterates over the byte widths of characters in already-validated UTF-8.
fn char_widths(valid: &[u8]) -> impl Iterator<Item = usize> + '_ {
	let mut rem = valid;
	std::iter::from_fn(move || {
		let &first = rem.first()?;
		let width = utf8_char_width(first).max(1);
		rem = &rem[width..];
		Some(width)
	})
}
