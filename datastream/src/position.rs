// SPDX-License-Identifier: Apache-2.0

use crate::buffer::{Output, Unit, Units};
use crate::charset::Charset;

/// A 1-indexed line and column position. Both are zero before anything has been
/// tracked.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Position {
	pub line: usize,
	pub position: usize,
}

/// Line and column accounting over consumed units.
#[derive(Copy, Clone, Debug, Default)]
pub struct PositionTracker {
	current: Position,
}

impl PositionTracker {
	/// Returns the current position.
	pub fn position(&self) -> Position { self.current }

	/// Resets the position to zero.
	pub fn reset(&mut self) { self.current = Position::default() }

	/// Advances past one decoded character.
	pub fn advance(&mut self, char: Option<char>) {
		let Position { line, position } = &mut self.current;
		*line = (*line).max(1);
		if char == Some('\n') {
			*line += 1;
			*position = 0;
		} else {
			*position += 1;
		}
	}

	/// Advances past one line, counting its characters if it is unterminated.
	fn advance_line(&mut self, line: &[u8], charset: &dyn Charset) {
		let mut rem = line;
		while !rem.is_empty() {
			let width = charset.cut(rem, 0, 1).max(1).min(rem.len());
			let (char, next) = rem.split_at(width);
			self.advance(charset.decode(char));
			rem = next;
		}
	}

	/// Advances past all units of a read. Raw bytes are not tracked.
	pub fn consume(&mut self, output: &Output, charset: &dyn Charset) {
		match output {
			Output::Unit(Unit::Char(char)) => self.advance(char.decode(charset)),
			Output::Unit(Unit::Line(line)) => self.advance_line(line, charset),
			Output::Units(Units::Chars(chars)) =>
				for char in chars {
					self.advance(char.decode(charset));
				}
			Output::Units(Units::Lines(lines)) =>
				for line in lines {
					self.advance_line(line, charset);
				}
			Output::Unit(Unit::Byte(_)) | Output::Units(Units::Bytes(_)) => { }
		}
	}
}

#[cfg(test)]
mod test {
	use crate::charset::Utf8;
	use super::*;

	#[test]
	fn chars() {
		let mut tracker = PositionTracker::default();
		assert_eq!(tracker.position(), Position { line: 0, position: 0 });
		tracker.advance(Some('1'));
		assert_eq!(tracker.position(), Position { line: 1, position: 1 });
		tracker.advance(Some('\n'));
		assert_eq!(tracker.position(), Position { line: 2, position: 0 });
		tracker.advance(None);
		assert_eq!(tracker.position(), Position { line: 2, position: 1 });
	}

	#[test]
	fn lines() {
		let mut tracker = PositionTracker::default();
		let output = Output::Units(Units::Lines(vec![b"ab\n".to_vec(), "cé".as_bytes().to_vec()]));
		tracker.consume(&output, &Utf8);
		assert_eq!(tracker.position(), Position { line: 2, position: 2 });
	}
}
