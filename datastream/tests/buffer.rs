// SPDX-License-Identifier: Apache-2.0

use pretty_assertions::assert_eq;
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use datastream::{Mode, Output, StreamBuffer};

#[macro_use]
mod common;

fn mode(selector: u8) -> Mode {
	match selector % 3 {
		0 => Mode::Raw,
		1 => Mode::Char,
		_ => Mode::Line,
	}
}

/// Appends `data` in chunks cut at `cuts`.
fn append_chunked(buf: &mut StreamBuffer, data: &[u8], cuts: &[usize]) {
	let mut start = 0;
	for &cut in cuts {
		if data.is_empty() { break }
		let end = (start + cut % 16).min(data.len());
		buf.append(&data[start..end]);
		start = end;
	}
	buf.append(&data[start..]);
}

fn read_all(buf: &mut StreamBuffer) -> Vec<u8> {
	buf.read(usize::MAX).map(Output::into_bytes).unwrap_or_default()
}

#[quickcheck]
fn round_trip(data: Vec<u8>, cuts: Vec<usize>, selector: u8) -> TestResult {
	let mut buf = StreamBuffer::new(mode(selector));
	append_chunked(&mut buf, &data, &cuts);
	buf.finish();
	qc_assert_eq!(read_all(&mut buf), data, "mode: {}", buf.mode())
}

#[quickcheck]
fn line_idempotence(data: Vec<u8>) -> TestResult {
	let mut buf = StreamBuffer::new(Mode::Raw);
	buf.append(&data);
	buf.set_mode(Mode::Line);
	buf.finish();
	let lines = read_all(&mut buf);
	buf.set_mode(Mode::Raw);
	if buf.position() != data.len() || buf.available() != 0 {
		return TestResult::error(format!("cursor at {} of {}", buf.position(), buf.size()))
	}
	qc_assert_eq!(lines, data)
}

#[quickcheck]
fn mode_switch_keeps_unread(data: Vec<u8>, consumed: usize, from: u8, to: u8) -> TestResult {
	let mut buf = StreamBuffer::new(Mode::Raw);
	buf.append(&data);
	buf.set_mode(mode(from));
	let head = buf.read(consumed % (data.len() + 1))
				  .map(Output::into_bytes)
				  .unwrap_or_default();
	buf.set_mode(mode(to));
	buf.finish();
	let mut bytes = head;
	bytes.extend(read_all(&mut buf));
	qc_assert_eq!(bytes, data, "{} -> {}", mode(from), mode(to))
}

#[quickcheck]
fn trim_safety(data: Vec<u8>, cuts: Vec<usize>, reads: Vec<u8>, max_size: u8) -> TestResult {
	let mut buf = StreamBuffer::new(Mode::Raw).with_max_size(max_size as usize);
	let mut read = Vec::new();
	let mut start = 0;
	for (cut, count) in cuts.iter().zip(reads.iter().chain([0].iter().cycle())) {
		let end = (start + cut % 16).min(data.len());
		buf.append(&data[start..end]);
		start = end;
		if let Some(output) = buf.read(*count as usize) {
			read.extend(output.into_bytes());
		}
	}
	buf.append(&data[start..]);
	read.extend(buf.flush());
	qc_assert_eq!(read, data)
}

#[quickcheck]
fn peek_read_coherence(data: Vec<u8>, count: u8, selector: u8) -> TestResult {
	let mut buf = StreamBuffer::new(mode(selector));
	buf.append(&data);
	buf.finish();
	let count = count as usize;
	let peeked = buf.peek(count);
	let read = buf.read(count);
	if peeked != read {
		return qc_assert_eq!(peeked, read)
	}
	let consumed = read.map(Output::into_bytes).unwrap_or_default();
	let rest = read_all(&mut buf);
	qc_assert_eq!([consumed, rest].concat(), data)
}

#[test]
fn scalar_and_sequence_reads() {
	let mut buf = StreamBuffer::new(Mode::Char);
	buf.append("héllo".as_bytes());
	assert!(matches!(buf.read(1), Some(Output::Unit(_))));
	assert!(matches!(buf.read(2), Some(Output::Units(_))));
	assert_eq!(buf.read(0), None);
	assert_eq!(buf.read(9).map(|output| output.count()), Some(2));
}

#[test]
fn line_to_raw_mid_history() {
	let mut buf = StreamBuffer::new(Mode::Line);
	buf.append(b"one\ntwo\nthree");
	buf.read(1);
	buf.set_mode(Mode::Raw);
	assert_eq!(buf.position(), 4);
	assert_eq!(read_all(&mut buf), b"two\nthree");
}
