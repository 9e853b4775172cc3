// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;
use amplify_derive::Display;
use arrayvec::ArrayVec;
use itertools::Itertools;
use crate::charset::Charset;

/// The unit exposed by reads and peeks.
#[derive(Copy, Clone, Debug, Default, Display, Eq, PartialEq, Hash)]
pub enum Mode {
	/// Raw bytes.
	#[default]
	#[display("raw")]
	Raw,
	/// Characters decoded by the active charset.
	#[display("char")]
	Char,
	/// Lines, each keeping its `\n` or `\r\n` terminator.
	#[display("line")]
	Line,
}

impl FromStr for Mode {
	type Err = ();

	fn from_str(value: &str) -> Result<Self, ()> {
		match value.trim().to_ascii_lowercase().as_str() {
			"raw"  => Ok(Self::Raw),
			"char" => Ok(Self::Char),
			"line" => Ok(Self::Line),
			_ => Err(())
		}
	}
}

/// A single character unit: the exact bytes it was cut from. Every supported
/// charset has characters of at most four bytes.
#[derive(Clone, Default, Eq, PartialEq, Hash)]
pub struct Char(ArrayVec<u8, 4>);

impl Char {
	pub(crate) fn new(bytes: &[u8]) -> Self {
		let mut char = ArrayVec::new();
		char.extend(bytes.iter().copied().take(4));
		debug_assert_eq!(char.len(), bytes.len(), "character units are at most 4 bytes");
		Self(char)
	}

	/// Returns the raw bytes of the character.
	pub fn as_bytes(&self) -> &[u8] { &self.0 }

	/// Returns the byte length of the character.
	pub fn len(&self) -> usize { self.0.len() }

	/// Returns `true` if the character has no bytes. Never true for characters
	/// produced by a buffer.
	pub fn is_empty(&self) -> bool { self.0.is_empty() }

	/// Decodes the character with `charset`.
	pub fn decode(&self, charset: &dyn Charset) -> Option<char> {
		charset.decode(&self.0)
	}

	/// Decodes the character as UTF-8.
	pub fn to_char(&self) -> Option<char> {
		simdutf8::basic::from_utf8(&self.0).ok()?.chars().next()
	}
}

impl Debug for Char {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self.to_char() {
			Some(char) => write!(f, "{char:?}"),
			None => write!(f, "{:X?}", self.as_bytes())
		}
	}
}

impl Display for Char {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&String::from_utf8_lossy(&self.0))
	}
}

impl From<char> for Char {
	fn from(value: char) -> Self {
		let mut buf = [0; 4];
		Self::new(value.encode_utf8(&mut buf).as_bytes())
	}
}

/// A single line unit, including its terminator if it had one.
pub type Line = Vec<u8>;

/// A single unit returned by a one-unit read.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Unit {
	Byte(u8),
	Char(Char),
	Line(Line),
}

/// Several units returned by a multi-unit read.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Units {
	Bytes(Vec<u8>),
	Chars(Vec<Char>),
	Lines(Vec<Line>),
}

/// The result of a read or peek. Reading exactly one unit yields the bare unit,
/// reading more yields a sequence, even if fewer than requested were available.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Output {
	Unit(Unit),
	Units(Units),
}

impl Unit {
	/// Returns the raw bytes of the unit.
	pub fn as_bytes(&self) -> &[u8] {
		match self {
			Self::Byte(byte) => std::slice::from_ref(byte),
			Self::Char(char) => char.as_bytes(),
			Self::Line(line) => line.as_slice(),
		}
	}
}

impl Units {
	/// Returns the number of units.
	pub fn len(&self) -> usize {
		match self {
			Self::Bytes(bytes) => bytes.len(),
			Self::Chars(chars) => chars.len(),
			Self::Lines(lines) => lines.len(),
		}
	}

	/// Returns `true` if there are no units.
	pub fn is_empty(&self) -> bool { self.len() == 0 }

	/// Concatenates the raw bytes of all units.
	pub fn into_bytes(self) -> Vec<u8> {
		match self {
			Self::Bytes(bytes) => bytes,
			Self::Chars(chars) => chars.iter().flat_map(Char::as_bytes).copied().collect(),
			Self::Lines(lines) => lines.concat(),
		}
	}
}

impl Output {
	/// Returns the number of units read.
	pub fn count(&self) -> usize {
		match self {
			Self::Unit(_) => 1,
			Self::Units(units) => units.len(),
		}
	}

	/// Concatenates the raw bytes of all units.
	pub fn into_bytes(self) -> Vec<u8> {
		match self {
			Self::Unit(Unit::Byte(byte)) => vec![byte],
			Self::Unit(Unit::Char(char)) => char.as_bytes().to_vec(),
			Self::Unit(Unit::Line(line)) => line,
			Self::Units(units) => units.into_bytes(),
		}
	}

	/// Concatenates the raw bytes of all units, decoded lossily as UTF-8.
	pub fn into_string(self) -> String {
		match String::from_utf8(self.into_bytes()) {
			Ok(string) => string,
			Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned()
		}
	}

	/// Returns the lines of a line-mode read, or `None` in other modes.
	pub fn into_lines(self) -> Option<Vec<Line>> {
		match self {
			Self::Unit(Unit::Line(line)) => Some(vec![line]),
			Self::Units(Units::Lines(lines)) => Some(lines),
			_ => None
		}
	}

	/// Returns the characters of a char-mode read, or `None` in other modes.
	pub fn into_chars(self) -> Option<Vec<Char>> {
		match self {
			Self::Unit(Unit::Char(char)) => Some(vec![char]),
			Self::Units(Units::Chars(chars)) => Some(chars),
			_ => None
		}
	}
}

impl Display for Output {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Unit(unit) => f.write_str(&String::from_utf8_lossy(unit.as_bytes())),
			Self::Units(Units::Bytes(bytes)) => f.write_str(&String::from_utf8_lossy(bytes)),
			Self::Units(Units::Chars(chars)) => write!(f, "{}", chars.iter().format("")),
			Self::Units(Units::Lines(lines)) => write!(
				f,
				"{}",
				lines.iter().map(|line| String::from_utf8_lossy(line)).format("")
			),
		}
	}
}
