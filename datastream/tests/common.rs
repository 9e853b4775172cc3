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

#![allow(dead_code, unused_macros)]

use std::fmt::{Arguments, Debug};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

macro_rules! qc_assert_eq {
	($left:expr,$right:expr) => {{
		let left = $left;
		let right = $right;
		if left == right {
			TestResult::passed()
		} else {
			TestResult::error(
				common::format_qc_assert_error(&left, &right, None)
			)
		}
	}};
	($left:expr,$right:expr,$($arg:tt)+) => {{
		let left = $left;
		let right = $right;
		if left == right {
			TestResult::passed()
		} else {
			TestResult::error(
				common::format_qc_assert_error(&left, &right, Some(format_args!($($arg)+)))
			)
		}
	}};
}

pub fn format_qc_assert_error<L: Debug, R: Debug>(left: &L, right: &R, msg: Option<Arguments>) -> String {
	if let Some(msg) = msg {
		format!(
			"assertion failed `(left == right)`: {msg}\n \
			left: `{left:?}`,\nright: `{right:?}`",
		)
	} else {
		format!(
			"assertion failed `(left == right)`:\n \
			left: `{left:?}`,\nright: `{right:?}`",
		)
	}
}

/// Scenario file used across endpoint tests.
pub const LINES: &str = "1\n2 a\n3 b\n4 5 6\n";

/// Writes `content` to a file in a fresh temporary directory. The directory is
/// removed when the returned guard drops.
pub fn fixture(content: impl AsRef<[u8]>) -> (TempDir, PathBuf) {
	let dir = tempfile::tempdir().expect("temporary directory should be created");
	let path = dir.path().join("fixture");
	fs::write(&path, content).expect("fixture should be written");
	(dir, path)
}

/// Returns a path to a file that doesn't exist yet, in a fresh temporary
/// directory.
pub fn new_path() -> (TempDir, PathBuf) {
	let dir = tempfile::tempdir().expect("temporary directory should be created");
	let path = dir.path().join("new");
	(dir, path)
}
