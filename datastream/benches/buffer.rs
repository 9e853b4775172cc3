// SPDX-License-Identifier: Apache-2.0

use criterion::{BatchSize, black_box, Criterion, criterion_group, criterion_main};
use datastream::{Mode, StreamBuffer};

const LINE: &str = "The quick brown fox jumps over the lazy dög, naïvely.\r\n";
const CHUNK: usize = 4096;

fn data() -> Vec<u8> {
	LINE.repeat(1024).into_bytes()
}

fn append(c: &mut Criterion) {
	let data = data();
	let mut group = c.benchmark_group("append");
	for mode in [Mode::Raw, Mode::Char, Mode::Line] {
		group.bench_function(mode.to_string(), |b| b.iter(|| {
			let mut buf = StreamBuffer::new(mode);
			for chunk in data.chunks(CHUNK) {
				buf.append(black_box(chunk));
			}
			buf
		}));
	}
	group.finish();
}

fn read(c: &mut Criterion) {
	let data = data();
	let mut group = c.benchmark_group("read");
	for mode in [Mode::Raw, Mode::Char, Mode::Line] {
		let mut buffer = StreamBuffer::new(mode);
		buffer.append(&data);
		group.bench_function(mode.to_string(), |b|
			b.iter_batched_ref(
				|| buffer.clone(),
				|buf| while let Some(output) = buf.read(64) {
					black_box(output);
				},
				BatchSize::SmallInput
			)
		);
	}
	group.finish();
}

fn switch_mode(c: &mut Criterion) {
	let mut buffer = StreamBuffer::new(Mode::Line);
	buffer.append(&data());
	buffer.read(100);
	c.bench_function("line_to_char", |b|
		b.iter_batched_ref(
			|| buffer.clone(),
			|buf| buf.set_mode(Mode::Char),
			BatchSize::SmallInput
		)
	);
}

criterion_group!(benches, append, read, switch_mode);
criterion_main!(benches);
