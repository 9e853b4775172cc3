// SPDX-License-Identifier: Apache-2.0

//! Stateful endpoints over files, pipes, sockets, and generic streams.
//!
//! An [`Endpoint`] moves through three states: [unopened](State::Unopened),
//! [connected](State::Connected), and [closed](State::Closed). Failing to open
//! an endpoint sets a sticky error flag, after which every operation fails with
//! [`Halted`](crate::ErrorKind::Halted). Reads and writes open unopened
//! endpoints transparently.
//!
//! Plain files are opened for both reading and writing where permissions allow,
//! but an endpoint only ever moves data in one direction: the first successful
//! read makes it read-only, and the first successful write makes it write-only.

mod target;

pub use target::*;

use std::io;
use std::path::PathBuf;
use std::fmt::{self, Debug, Formatter};
use amplify_derive::Display;
use tracing::{debug, trace, warn};
use crate::{Error, Operation, Result};
use crate::buffer::{Mode, Output, StreamBuffer};
use crate::device::{Device, Kind};
use crate::error::ResultContext;
use crate::options::Options;
use crate::poller::{Poller, Probe};
use crate::position::{Position, PositionTracker};

/// The connection state of an [`Endpoint`].
#[derive(Copy, Clone, Debug, Default, Display, Eq, PartialEq, Hash)]
pub enum State {
	#[default]
	#[display("unopened")]
	Unopened,
	#[display("connected")]
	Connected,
	#[display("closed")]
	Closed,
}

/// A buffered, mode-aware endpoint over one OS resource. See the
/// [module docs](self).
pub struct Endpoint {
	kind: Kind,
	state: State,
	error: bool,
	readable: bool,
	writable: bool,
	owns_connection: bool,
	target: Option<Target>,
	device: Option<Box<dyn Device>>,
	buffer: StreamBuffer,
	poller: Option<Poller>,
	tracker: PositionTracker,
	options: Options,
	write_buffer: Vec<u8>,
	written: bool,
	/// A read error that ended a poll after data arrived, reported by the next
	/// read.
	failure: Option<Error>,
}

impl Debug for Endpoint {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Endpoint")
			.field("kind", &self.kind)
			.field("state", &self.state)
			.field("error", &self.error)
			.field("readable", &self.readable)
			.field("writable", &self.writable)
			.field("owns_connection", &self.owns_connection)
			.field("buffer", &self.buffer)
			.field("write_buffer", &self.write_buffer.len())
			.finish_non_exhaustive()
	}
}

impl Endpoint {
	/// Creates an endpoint over `target`, rejecting paths inside the current
	/// working directory.
	pub fn new(target: impl Into<Target>) -> Result<Self> {
		Self::with_policy(target, &PathPolicy::default())
	}

	/// Creates an endpoint over `target`, validating paths against `policy`.
	pub fn with_policy(target: impl Into<Target>, policy: &PathPolicy) -> Result<Self> {
		let target = target.into();
		let access = target.validate(policy)?;
		let options = Options::default();
		Ok(Self {
			kind: access.kind,
			state: State::Unopened,
			error: false,
			readable: access.readable,
			writable: access.writable,
			owns_connection: target.owns_connection(),
			target: Some(target),
			device: None,
			buffer: new_buffer(&options),
			poller: None,
			tracker: PositionTracker::default(),
			options,
			write_buffer: Vec::new(),
			written: false,
			failure: None,
		})
	}

	/// Creates an endpoint from a name: `stdin`, `stdout`, or `stderr` for the
	/// standard streams, otherwise a path.
	pub fn named(name: &str) -> Result<Self> {
		match name.parse::<StdPipe>() {
			Ok(pipe) => Self::new(pipe),
			Err(()) => Self::new(PathBuf::from(name))
		}
	}

	/// Applies string-keyed settings. Settings are applied all at once: if any
	/// fails, none take effect. See [`Options::apply`] for the recognized keys.
	pub fn set<K, V>(&mut self, settings: impl IntoIterator<Item = (K, V)>) -> Result
	where K: AsRef<str>, V: AsRef<str> {
		let mut options = self.options.clone();
		for (key, value) in settings {
			options.apply(key.as_ref(), value.as_ref())?;
		}
		self.configure(options)
	}

	/// Replaces the options, re-projecting buffered data into the new mode and
	/// charset.
	pub fn configure(&mut self, options: Options) -> Result {
		options.validate().context(Operation::Configure)?;
		self.buffer.set_charset(options.charset.clone());
		self.buffer.set_mode(options.mode);
		self.buffer.set_max_size(options.read_cache_count);
		if options.poll != self.options.poll {
			if let Some(poller) = &mut self.poller {
				*poller = options.poll.into();
			}
		}
		if options.tracking && !self.options.tracking {
			self.tracker.reset();
		}
		self.options = options;
		Ok(())
	}

	/// Opens the endpoint. Opening a connected endpoint does nothing.
	pub fn open(&mut self) -> Result {
		self.connect(Operation::Open)
	}

	/// Returns `true` if the endpoint can be used: it hasn't failed, and is either
	/// connected or will be opened by the next read or write.
	pub fn ready(&self) -> bool {
		!self.error && matches!(self.state, State::Unopened | State::Connected)
	}

	/// Returns `true` if nothing is left to read, filling the buffer to find out.
	pub fn empty(&mut self) -> Result<bool> {
		self.connect(Operation::Peek)?;
		if !self.readable { return Ok(true) }
		Ok(self.pull(1, Operation::Peek)?.is_none())
	}

	/// Reads up to `count` units in the current mode, or `None` if nothing is
	/// available. A single unit is returned as [`Output::Unit`].
	pub fn read(&mut self, count: usize) -> Result<Option<Output>> {
		self.check_readable(Operation::Read)?;
		let output = self.pull(count, Operation::Read)?;
		if let Some(output) = &output {
			if self.kind == Kind::File && self.writable {
				trace!("first read, endpoint is now read-only");
				self.writable = false;
			}
			if self.options.tracking {
				self.tracker.consume(output, &**self.buffer.charset());
			}
		}
		Ok(output)
	}

	/// Returns up to `count` units without consuming them.
	pub fn peek(&mut self, count: usize) -> Result<Option<Output>> {
		self.check_readable(Operation::Peek)?;
		self.pull(count, Operation::Peek)
	}

	/// Writes `data` to the device. Data the device can't accept right now stays
	/// queued until the next write or [`flush`](Self::flush).
	pub fn write(&mut self, data: impl AsRef<[u8]>) -> Result {
		const OP: Operation = Operation::Write;
		self.connect(OP)?;
		if self.kind == Kind::Socket {
			return Err(Error::unsupported(OP, self.kind.name()))
		}
		if !self.writable {
			return Err(Error::not_writable(OP))
		}

		let data = data.as_ref();
		if data.is_empty() { return Ok(()) }

		if !self.written && self.owns_connection {
			self.device()?.seek_end().context(OP)?;
		}
		self.write_buffer.extend_from_slice(data);
		self.drain_writes(OP)?;

		if !self.written {
			self.written = true;
			if self.kind == Kind::File && self.readable {
				trace!("first write, endpoint is now write-only");
				self.readable = false;
			}
		}
		Ok(())
	}

	/// Pipes all data readable from `source` into this endpoint, returning the
	/// number of bytes written. Data moves one read at a time.
	pub fn write_from(&mut self, source: &mut Endpoint) -> Result<usize> {
		let count = source.options.read_chunk_size;
		let mut total = 0;
		while let Some(output) = source.read(count)? {
			let bytes = output.into_bytes();
			self.write(&bytes)?;
			total += bytes.len();
		}
		Ok(total)
	}

	/// Writes all queued data to the device.
	pub fn flush(&mut self) -> Result {
		self.connect(Operation::Flush)?;
		self.flush_writes(Operation::Flush)
	}

	/// Closes the endpoint, flushing queued writes and discarding buffered data.
	/// The OS resource is released only if the endpoint opened it. Closing a
	/// closed endpoint does nothing.
	pub fn close(&mut self) -> Result {
		if self.state == State::Closed { return Ok(()) }

		let flushed = if self.state == State::Connected && !self.error {
			self.flush_writes(Operation::Close)
		} else {
			Ok(())
		};
		let released = match self.device.take() {
			Some(mut device) if self.owns_connection => device.release().context(Operation::Close),
			_ => Ok(())
		};

		self.buffer.flush();
		self.write_buffer.clear();
		self.failure = None;
		self.target = None;
		self.poller = None;
		self.state = State::Closed;
		debug!(kind = %self.kind, owned = self.owns_connection, "closed endpoint");
		flushed.and(released)
	}

	/// Returns the read mode.
	pub fn mode(&self) -> Mode { self.options.mode }

	/// Switches the read mode, re-projecting buffered data.
	pub fn set_mode(&mut self, mode: Mode) {
		self.options.mode = mode;
		self.buffer.set_mode(mode);
	}

	/// Returns the line and column reached by tracked reads.
	pub fn position(&self) -> Position { self.tracker.position() }

	/// Removes and returns all unread buffered data, including an unterminated
	/// line or incomplete character.
	pub fn take_unread(&mut self) -> Vec<u8> { self.buffer.flush() }

	/// Returns the device kind.
	pub fn kind(&self) -> Kind { self.kind }

	/// Returns the connection state.
	pub fn state(&self) -> State { self.state }

	/// Returns `true` if the endpoint can currently be read from.
	pub fn is_readable(&self) -> bool { self.readable }

	/// Returns `true` if the endpoint can currently be written to.
	pub fn is_writable(&self) -> bool { self.writable }

	/// Returns `true` if the endpoint halted after a failed open.
	pub fn is_error(&self) -> bool { self.error }

	/// Returns `true` if the endpoint opened, and will release, its resource.
	pub fn owns_connection(&self) -> bool { self.owns_connection }

	/// Returns the options.
	pub fn options(&self) -> &Options { &self.options }
}

impl Endpoint {
	fn connect(&mut self, op: Operation) -> Result {
		match self.state {
			State::Closed => Err(Error::closed(op)),
			_ if self.error => Err(Error::halted(op)),
			State::Connected => Ok(()),
			State::Unopened => self.establish().context(op)
		}
	}

	fn establish(&mut self) -> Result {
		let result = match self.target.take() {
			Some(target) => target.open(self.kind),
			None => Err(Error::invariant(Operation::Open, "unopened endpoint without a target"))
		};
		let device = match result {
			Ok(device) => device,
			Err(err) => {
				self.error = true;
				debug!(kind = %self.kind, error = %err, "endpoint halted");
				return Err(err)
			}
		};

		self.readable &= device.is_readable();
		self.writable &= device.is_writable();
		self.poller = self.kind.is_polled().then(|| Poller::from(self.options.poll));
		self.device = Some(device);
		self.state = State::Connected;
		debug!(
			kind = %self.kind,
			readable = self.readable,
			writable = self.writable,
			"opened endpoint"
		);
		Ok(())
	}

	fn device(&mut self) -> Result<&mut Box<dyn Device>> {
		self.device.as_mut().ok_or_else(||
			Error::invariant(Operation::Unknown, "connected endpoint without a device")
		)
	}

	fn check_readable(&mut self, op: Operation) -> Result {
		self.connect(op)?;
		if self.readable {
			Ok(())
		} else {
			Err(Error::not_readable(op))
		}
	}

	/// Reads or peeks through the buffer, filling it from the device. A device
	/// error raised after data arrived is held back until the next fill, so the
	/// data is returned first.
	fn pull(&mut self, count: usize, op: Operation) -> Result<Option<Output>> {
		let Self { device, buffer, poller, options, failure, .. } = self;
		let Some(device) = device.as_deref_mut() else {
			return Err(Error::invariant(op, "connected endpoint without a device"))
		};
		let chunk_size = options.read_chunk_size;
		let mut pending = failure.take();
		let filler = |buf: &mut StreamBuffer, _: usize| {
			if let Some(err) = pending.take() { return Err(err) }
			// The device failed earlier in this pull.
			if failure.is_some() { return Ok(()) }
			fill(buf, &mut *device, poller.as_mut(), chunk_size, &mut *failure)
		};
		let result = if op == Operation::Read {
			buffer.read_with(count, filler)
		} else {
			buffer.peek_with(count, filler)
		};
		if pending.is_some() {
			*failure = pending;
		}
		result.context(op)
	}

	/// Writes as much queued data as the device accepts, polling devices that
	/// are temporarily full.
	fn drain_writes(&mut self, op: Operation) -> Result {
		let Self { device, poller, write_buffer, .. } = self;
		let Some(device) = device.as_deref_mut() else {
			return Err(Error::invariant(op, "connected endpoint without a device"))
		};

		let mut written = 0;
		let result = loop {
			if written == write_buffer.len() { break Ok(()) }

			match device.raw_write(&write_buffer[written..]) {
				Ok(0) => { }
				Ok(count) => {
					written += count;
					continue
				}
				Err(err) => break Err(Error::io(op, err))
			}

			let Some(poller) = poller.as_mut() else { break Ok(()) };
			let polled = poller.poll(|| {
				let rem = &write_buffer[written..];
				if rem.is_empty() { return Ok(Probe::End) }
				Ok::<_, io::Error>(match device.raw_write(rem)? {
					0 => Probe::Miss,
					count => {
						written += count;
						Probe::Hit(count)
					}
				})
			});
			match polled {
				Ok(hits) if hits.is_empty() => break Ok(()),
				Ok(_) => { }
				Err(err) => break Err(Error::io(op, err))
			}
		};
		write_buffer.drain(..written);
		trace!(written, queued = write_buffer.len(), "drained writes");
		result
	}

	/// Drains queued writes, failing if the device won't take all of them.
	fn flush_writes(&mut self, op: Operation) -> Result {
		self.drain_writes(op)?;
		if !self.write_buffer.is_empty() {
			return Err(Error::io(op, io::Error::from(io::ErrorKind::WriteZero)))
		}
		self.device()?.flush().context(op)
	}
}

impl Drop for Endpoint {
	fn drop(&mut self) {
		if let Err(err) = self.close() {
			warn!(kind = %self.kind, error = %err, "failed to close endpoint");
		}
	}
}

fn new_buffer(options: &Options) -> StreamBuffer {
	StreamBuffer::new(options.mode)
		.with_charset(options.charset.clone())
		.with_max_size(options.read_cache_count)
}

/// Pulls one chunk from `device` into `buf`, directly for unpolled devices and
/// through `poller` otherwise. Pending data is resolved at the end of input. If
/// polling fails after some chunks arrived, the chunks are appended and the error
/// is stored in `failure` instead.
fn fill(
	buf: &mut StreamBuffer,
	device: &mut dyn Device,
	poller: Option<&mut Poller>,
	chunk_size: usize,
	failure: &mut Option<Error>
) -> Result {
	let Some(poller) = poller else {
		match device.raw_read(chunk_size)? {
			Probe::Hit(bytes) => {
				trace!(count = bytes.len(), "filled from device");
				buf.append(&bytes);
			}
			Probe::Miss => { }
			Probe::End => { buf.finish(); }
		}
		return Ok(())
	};

	if !device.at_end() {
		let mut chunks = Vec::new();
		let polled = poller.poll_into(&mut chunks, || device.raw_read(chunk_size));
		trace!(
			chunks = chunks.len(),
			count = chunks.iter().map(Vec::len).sum::<usize>(),
			"polled device"
		);
		let received = !chunks.is_empty();
		for chunk in chunks {
			buf.append(&chunk);
		}
		match polled {
			Err(err) if received => {
				debug!(error = %err, "device failed after data arrived");
				*failure = Some(err.into());
				return Ok(())
			}
			result => result?
		}
	}
	if device.at_end() {
		buf.finish();
	}
	Ok(())
}

#[cfg(test)]
mod test {
	use std::io::Cursor;
	use pretty_assertions::assert_eq;
	use crate::{ErrorClass, ErrorKind};
	use crate::device::GenericDevice;
	use super::*;

	fn reader(data: &'static [u8]) -> Endpoint {
		Endpoint::new(GenericDevice::reader(Cursor::new(data))).unwrap()
	}

	#[test]
	fn generic_reads_lines() -> Result {
		let mut endpoint = reader(b"a\nb");
		endpoint.set_mode(Mode::Line);
		assert_eq!(endpoint.state(), State::Unopened);
		assert!(endpoint.ready());
		assert_eq!(endpoint.read(1)?.map(Output::into_bytes), Some(b"a\n".to_vec()));
		assert_eq!(endpoint.state(), State::Connected);
		// The unterminated tail is resolved at the end of input.
		assert_eq!(endpoint.read(1)?.map(Output::into_bytes), Some(b"b".to_vec()));
		assert_eq!(endpoint.read(1)?, None);
		assert!(endpoint.empty()?);
		Ok(())
	}

	#[test]
	fn peek_does_not_consume() -> Result {
		let mut endpoint = reader(b"xyz");
		assert_eq!(endpoint.peek(2)?, endpoint.read(2)?);
		assert_eq!(endpoint.read(2)?.map(Output::into_bytes), Some(b"z".to_vec()));
		Ok(())
	}

	#[test]
	fn closed_before_halted() -> Result {
		let mut endpoint = reader(b"");
		endpoint.error = true;
		assert_eq!(endpoint.read(1).unwrap_err().kind(), ErrorKind::Halted);
		endpoint.close()?;
		assert_eq!(endpoint.read(1).unwrap_err().kind(), ErrorKind::Closed);
		assert_eq!(endpoint.open().unwrap_err().kind(), ErrorKind::Closed);
		endpoint.close()?;
		Ok(())
	}

	#[test]
	fn direction_is_checked() {
		let mut endpoint = reader(b"data");
		let err = endpoint.write("more").unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NotWritable);
		assert_eq!(err.class(), ErrorClass::Access);
		assert!(!endpoint.is_error());
	}

	#[test]
	fn generic_writes() -> Result {
		let mut endpoint = Endpoint::new(GenericDevice::writer(Vec::new()))?;
		endpoint.write("abc")?;
		endpoint.flush()?;
		assert_eq!(endpoint.read(1).unwrap_err().kind(), ErrorKind::NotReadable);
		endpoint.close()
	}

	#[test]
	fn failed_set_changes_nothing() {
		let mut endpoint = reader(b"");
		let err = endpoint.set([("mode", "line"), ("read-chunk-size", "none")]).unwrap_err();
		assert_eq!(err.class(), ErrorClass::Validation);
		assert_eq!(endpoint.mode(), Mode::Raw);
	}

	#[test]
	fn tracks_position() -> Result {
		let mut endpoint = reader("é\nx".as_bytes());
		endpoint.set([("mode", "char"), ("tracking", "true")])?;
		endpoint.read(1)?;
		assert_eq!(endpoint.position(), Position { line: 1, position: 1 });
		endpoint.read(2)?;
		assert_eq!(endpoint.position(), Position { line: 2, position: 1 });
		Ok(())
	}
}
