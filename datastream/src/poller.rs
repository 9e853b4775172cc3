// SPDX-License-Identifier: Apache-2.0

//! Blocking emulation over non-blocking or latency-uncertain primitives.
//!
//! A [`Poller`] repeatedly calls a probe, sleeping between empty probes. The
//! sleep interval, and optionally the timeout itself, are tuned by a *load*
//! register: a hit shifts a one in from the top, a miss shifts the register
//! left. A run of hits shortens the sleep; once the register drains to zero,
//! every further miss lengthens it.
//!
//! Once any probe has hit, the next empty probe ends the poll. The poller drains
//! what is available now rather than waiting out the timeout after data starts
//! flowing.

use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

/// The shortest sleep between probes.
pub const SLEEP_MIN: Duration = Duration::from_micros(1_000);
/// The longest sleep between probes.
pub const SLEEP_MAX: Duration = Duration::from_micros(64_000);

/// Load mask for speeding up: the four most recent probes hit.
const HIGH_WATER: u8 = 0b1111_0000;
/// Load threshold for slowing down: the register has drained.
const LOW_WATER: u8 = 0b0000_0001;

/// The outcome of a single probe.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Probe<T> {
	/// The probe produced a result.
	Hit(T),
	/// Nothing was available.
	Miss,
	/// Nothing was available, and nothing ever will be. Ends the poll at once.
	End,
}

impl<T> From<Option<T>> for Probe<T> {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Miss, Self::Hit)
	}
}

/// Poller tuning options.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PollOptions {
	/// The time budget of a poll. `None` waits indefinitely for at least one hit.
	pub timeout: Option<Duration>,
	/// The ceiling the timeout may grow back to when varied.
	pub timeout_max: Duration,
	/// Whether the timeout is tuned along with the sleep interval.
	pub vary_timeout: bool,
}

impl Default for PollOptions {
	fn default() -> Self { Self::new() }
}

impl PollOptions {
	pub const fn new() -> Self {
		Self {
			timeout: Some(Duration::from_millis(100)),
			timeout_max: Duration::from_secs(1),
			vary_timeout: false,
		}
	}

	/// Sets the timeout from microseconds, negative values waiting indefinitely.
	pub fn with_timeout_micros(mut self, micros: i64) -> Self {
		self.timeout = u64::try_from(micros).ok().map(Duration::from_micros);
		self
	}

	pub const fn with_timeout(mut self, value: Option<Duration>) -> Self {
		self.timeout = value;
		self
	}

	pub const fn with_timeout_max(mut self, value: Duration) -> Self {
		self.timeout_max = value;
		self
	}

	pub const fn with_vary_timeout(mut self, value: bool) -> Self {
		self.vary_timeout = value;
		self
	}
}

/// An adaptive timeout poller. See the [module docs](self).
#[derive(Clone, Debug)]
pub struct Poller {
	load: u8,
	sleep: Duration,
	timeout: Option<Duration>,
	timeout_max: Duration,
	vary_timeout: bool,
}

impl Default for Poller {
	fn default() -> Self { PollOptions::default().into() }
}

impl From<PollOptions> for Poller {
	fn from(PollOptions { timeout, timeout_max, vary_timeout }: PollOptions) -> Self {
		Self {
			load: 0,
			sleep: SLEEP_MIN,
			timeout: timeout.map(|timeout| if vary_timeout { timeout.min(timeout_max) } else { timeout }),
			timeout_max,
			vary_timeout,
		}
	}
}

impl Poller {
	/// Returns the current sleep interval.
	pub fn sleep(&self) -> Duration { self.sleep }

	/// Returns the current timeout.
	pub fn timeout(&self) -> Option<Duration> { self.timeout }

	/// Returns the load register.
	pub fn load(&self) -> u8 { self.load }

	/// Calls `probe` until it misses after having hit, it ends, or the timeout is
	/// exhausted, returning all hits. An empty result is a normal outcome, meaning
	/// nothing was available within the timeout. Probe errors end the poll.
	pub fn poll<T, E>(&mut self, probe: impl FnMut() -> Result<Probe<T>, E>) -> Result<Vec<T>, E> {
		let mut hits = Vec::new();
		self.poll_into(&mut hits, probe)?;
		Ok(hits)
	}

	/// Polls like [`poll`](Self::poll), pushing hits onto `hits`. Hits collected
	/// before a probe error are kept there.
	pub fn poll_into<T, E>(
		&mut self,
		hits: &mut Vec<T>,
		mut probe: impl FnMut() -> Result<Probe<T>, E>
	) -> Result<(), E> {
		let start = Instant::now();
		let first = hits.len();
		loop {
			match probe()? {
				Probe::Hit(value) => {
					hits.push(value);
					self.hit();
					match self.timeout {
						Some(timeout) if start.elapsed() < timeout => { }
						_ => return Ok(())
					}
				}
				Probe::Miss => {
					self.miss();
					let exhausted = self.timeout.is_some_and(|timeout| start.elapsed() >= timeout);
					if hits.len() > first || exhausted {
						return Ok(())
					}
					thread::sleep(self.sleep);
				}
				Probe::End => return Ok(())
			}
		}
	}

	fn hit(&mut self) {
		self.load = self.load >> 1 | 0b1000_0000;
		if self.load & HIGH_WATER == HIGH_WATER {
			self.sleep = (self.sleep / 2).max(SLEEP_MIN);
			if self.vary_timeout {
				self.timeout = self.timeout.map(|timeout| (timeout / 2).max(SLEEP_MIN));
			}
			trace!(sleep_us = self.sleep.as_micros() as u64, timeout = ?self.timeout, "poll load high");
		}
	}

	fn miss(&mut self) {
		self.load <<= 1;
		if self.load < LOW_WATER {
			self.sleep = (self.sleep * 2).min(SLEEP_MAX);
			if self.vary_timeout {
				if let Some(timeout) = self.timeout.filter(|&timeout| timeout < self.timeout_max) {
					self.timeout = Some((timeout * 2).min(self.timeout_max));
				}
			}
			trace!(sleep_us = self.sleep.as_micros() as u64, timeout = ?self.timeout, "poll load low");
		}
	}
}
