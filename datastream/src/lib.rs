// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! ## How it works
//!
//! An [`Endpoint`] wraps one OS resource: a file, a pipe, a socket, or any
//! reader and writer. Reads go through a [`StreamBuffer`], which keeps data
//! pulled from the device and exposes it in one of three *modes*: raw bytes,
//! characters, or lines. When a read asks for more than the buffer holds, the
//! buffer calls back into the endpoint to *fill* it, one chunk at a time, until
//! the request is satisfied or the device has nothing more to give.
//!
//! ### Modes
//!
//! Bytes that can't be resolved into a whole unit yet wait in the buffer as
//! *pending* data: the first bytes of a multibyte character, or a line with no
//! terminator. Lines keep their terminators, and invalid bytes become one-byte
//! characters, so every mode reproduces the original bytes exactly. Switching
//! modes re-projects everything buffered along with the read cursor. Consumed
//! units are kept as history, trimmed once the buffer grows past its size limit.
//!
//! ### Polling
//!
//! Files are read directly. Pipes, sockets, and generic streams may have nothing
//! ready, so their reads go through a [`Poller`], which retries on a sleep
//! interval until data arrives or a timeout passes. The interval adapts to how
//! often recent probes found data, shrinking when data flows steadily and
//! growing when the device is idle. Once data starts flowing, the first empty
//! probe ends the wait.
//!
//! ### Directionality
//!
//! Files are opened for both reading and writing where permissions allow, but
//! each endpoint settles on one direction at first use. Writes to files the
//! endpoint opened itself are appended.
//!
//! [`Poller`]: poller::Poller

pub mod buffer;
pub mod charset;
pub mod device;
pub mod endpoint;
mod error;
pub mod options;
pub mod poller;
pub mod position;

pub use buffer::{Mode, Output, StreamBuffer, Unit, Units};
pub use endpoint::{Endpoint, PathPolicy, State, StdPipe, Target};
pub use error::*;
pub use options::Options;
pub use position::Position;
