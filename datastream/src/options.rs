// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;
use crate::{charset, Error, ErrorKind, Operation, Result};
use crate::buffer::Mode;
use crate::charset::{CharsetRef, Utf8};
use crate::poller::PollOptions;

/// The default number of bytes requested per device read.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Options for tuning an [`Endpoint`](crate::Endpoint)'s behavior.
///
/// # Mode
///
/// The unit returned by reads: raw bytes, characters, or lines. Defaults to
/// [`Mode::Raw`].
///
/// # Read chunk size
///
/// The number of bytes requested from the device per read. Defaults to `8KiB`.
///
/// # Read cache count
///
/// The soft limit on units kept in the read buffer, read or unread. Only units
/// already read are trimmed, so unread data can still exceed it. A count of `0`,
/// the default, keeps everything.
///
/// # Charset
///
/// The multibyte encoding characters are cut with in char mode. Defaults to
/// UTF-8.
///
/// # Tracking
///
/// Enables line and column accounting over consumed characters and lines.
/// Disabled by default.
///
/// # Polling
///
/// Timeout tuning for pipe, socket, and generic endpoints. See
/// [`Poller`](crate::poller::Poller).
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Options {
	pub mode: Mode,
	pub read_chunk_size: usize,
	pub read_cache_count: usize,
	pub charset: CharsetRef,
	pub tracking: bool,
	pub poll: PollOptions,
}

impl Default for Options {
	fn default() -> Self { Self::new() }
}

impl Options {
	/// Creates a new set of options.
	pub fn new() -> Self {
		Self {
			mode: Mode::Raw,
			read_chunk_size: DEFAULT_CHUNK_SIZE,
			read_cache_count: 0,
			charset: std::sync::Arc::new(Utf8),
			tracking: false,
			poll: PollOptions::new(),
		}
	}

	/// Returns the read mode.
	#[inline]
	pub fn mode(&self) -> Mode { self.mode }

	/// Returns the read chunk size.
	#[inline]
	pub fn read_chunk_size(&self) -> usize { self.read_chunk_size }

	/// Returns the read cache count.
	#[inline]
	pub fn read_cache_count(&self) -> usize { self.read_cache_count }

	/// Returns the charset.
	#[inline]
	pub fn charset(&self) -> &CharsetRef { &self.charset }

	/// Returns whether position tracking is enabled.
	#[inline]
	pub fn tracking(&self) -> bool { self.tracking }

	/// Sets the read mode.
	#[inline]
	pub fn with_mode(mut self, value: Mode) -> Self {
		self.mode = value;
		self
	}

	/// Sets the read chunk size.
	#[inline]
	pub fn with_read_chunk_size(mut self, value: usize) -> Self {
		self.read_chunk_size = value;
		self
	}

	/// Sets the read cache count.
	#[inline]
	pub fn with_read_cache_count(mut self, value: usize) -> Self {
		self.read_cache_count = value;
		self
	}

	/// Sets the charset.
	#[inline]
	pub fn with_charset(mut self, value: CharsetRef) -> Self {
		self.charset = value;
		self
	}

	/// Sets whether position tracking is enabled.
	#[inline]
	pub fn with_tracking(mut self, value: bool) -> Self {
		self.tracking = value;
		self
	}

	/// Sets the poll options.
	#[inline]
	pub fn with_poll(mut self, value: PollOptions) -> Self {
		self.poll = value;
		self
	}

	/// Checks the options for invalid values.
	pub fn validate(&self) -> Result {
		if self.read_chunk_size == 0 {
			return Err(invalid_option("read-chunk-size must be positive"))
		}
		Ok(())
	}

	/// Applies a single string-keyed setting.
	///
	/// Recognized keys are `mode`, `read-chunk-size`, `read-cache-count`,
	/// `charset`, `tracking`, `timeout` (microseconds, negative to wait
	/// indefinitely), `timeout-max` (microseconds), and `vary-timeout`.
	pub fn apply(&mut self, key: &str, value: &str) -> Result {
		let value = value.trim();
		match key.trim() {
			"mode" =>
				self.mode = value.parse().map_err(|_| invalid_option("mode must be raw, char, or line"))?,
			"read-chunk-size" =>
				self.read_chunk_size = match value.parse() {
					Ok(0) | Err(_) => return Err(invalid_option("read-chunk-size must be a positive integer")),
					Ok(size) => size
				},
			"read-cache-count" =>
				self.read_cache_count = value.parse().map_err(|_|
					invalid_option("read-cache-count must be a non-negative integer")
				)?,
			"charset" =>
				self.charset = charset::lookup(value).map_err(|err|
					Error::new(Operation::Configure, ErrorKind::UnknownCharset, Some(err.into()))
				)?,
			"tracking" =>
				self.tracking = parse_bool(value).ok_or_else(|| invalid_option("tracking must be a boolean"))?,
			"timeout" =>
				self.poll = self.poll.with_timeout_micros(
					value.parse().map_err(|_| invalid_option("timeout must be an integer"))?
				),
			"timeout-max" =>
				self.poll.timeout_max = Duration::from_micros(
					value.parse().map_err(|_| invalid_option("timeout-max must be a non-negative integer"))?
				),
			"vary-timeout" =>
				self.poll.vary_timeout = parse_bool(value).ok_or_else(|| invalid_option("vary-timeout must be a boolean"))?,
			_ => return Err(Error::new(Operation::Configure, ErrorKind::UnknownOption, None))
		}
		Ok(())
	}
}

fn invalid_option(message: &'static str) -> Error {
	Error::new(Operation::Configure, ErrorKind::InvalidOption(message), None)
}

fn parse_bool(value: &str) -> Option<bool> {
	match value.to_ascii_lowercase().as_str() {
		"true" | "1" | "on" | "yes" => Some(true),
		"false" | "0" | "off" | "no" => Some(false),
		_ => None
	}
}
