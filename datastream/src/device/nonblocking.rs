// SPDX-License-Identifier: Apache-2.0

use std::io;
use cfg_if::cfg_if;

cfg_if! {
	if #[cfg(unix)] {
		use std::os::unix::io::{AsRawFd, RawFd};
		use libc::{c_int, F_GETFL, F_SETFL, O_NONBLOCK};

		/// Holds a handle in non-blocking mode, restoring its original flags when
		/// dropped. The flags belong to the open file description, so duplicated
		/// and standard handles are affected process-wide until then.
		///
		/// The guard borrows the descriptor by number only, and must be dropped
		/// before the handle it was set on is closed.
		#[derive(Debug)]
		pub(crate) struct NonBlocking {
			fd: RawFd,
			flags: c_int,
		}

		impl NonBlocking {
			pub fn set(handle: &impl AsRawFd) -> io::Result<Self> {
				let fd = handle.as_raw_fd();
				let flags = fcntl(fd, F_GETFL, 0)?;
				if flags & O_NONBLOCK == 0 {
					fcntl(fd, F_SETFL, flags | O_NONBLOCK)?;
				}
				Ok(Self { fd, flags })
			}
		}

		impl Drop for NonBlocking {
			fn drop(&mut self) {
				if self.flags & O_NONBLOCK == 0 {
					let _ = fcntl(self.fd, F_SETFL, self.flags);
				}
			}
		}

		fn fcntl(fd: RawFd, cmd: c_int, arg: c_int) -> io::Result<c_int> {
			// SAFETY: fcntl with F_GETFL/F_SETFL only reads or writes status flags
			// of a descriptor owned by a live handle.
			let ret = unsafe { libc::fcntl(fd, cmd, arg) };
			if ret < 0 {
				Err(io::Error::last_os_error())
			} else {
				Ok(ret)
			}
		}
	} else {
		/// Handles other than sockets can't be made non-blocking off unix; reads on
		/// them may block until data arrives.
		#[derive(Debug)]
		pub(crate) struct NonBlocking;

		impl NonBlocking {
			pub fn set<H>(_: &H) -> io::Result<Self> { Ok(Self) }
		}
	}
}

#[cfg(all(test, unix))]
mod test {
	use std::os::unix::net::UnixStream;
	use super::*;

	fn is_nonblocking(handle: &impl AsRawFd) -> bool {
		fcntl(handle.as_raw_fd(), F_GETFL, 0).unwrap() & O_NONBLOCK != 0
	}

	#[test]
	fn restores_on_drop() {
		let (stream, _peer) = UnixStream::pair().unwrap();
		let guard = NonBlocking::set(&stream).unwrap();
		assert!(is_nonblocking(&stream));
		drop(guard);
		assert!(!is_nonblocking(&stream));
	}

	#[test]
	fn keeps_nonblocking_handles() {
		let (stream, _peer) = UnixStream::pair().unwrap();
		stream.set_nonblocking(true).unwrap();
		drop(NonBlocking::set(&stream).unwrap());
		assert!(is_nonblocking(&stream));
	}
}
