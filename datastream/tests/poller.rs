// SPDX-License-Identifier: Apache-2.0

use std::convert::Infallible;
use std::time::{Duration, Instant};
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use datastream::poller::{PollOptions, Poller, Probe, SLEEP_MAX, SLEEP_MIN};

#[macro_use]
mod common;

/// Scheduler slack allowed on top of the expected bound.
const SLACK: Duration = Duration::from_millis(25);

#[quickcheck]
fn empty_poll_is_bounded(timeout_ms: u8) -> TestResult {
	let timeout = Duration::from_millis(timeout_ms as u64 % 40);
	let mut poller = Poller::from(PollOptions::new().with_timeout(Some(timeout)));
	let start = Instant::now();
	let hits = poller.poll(|| Ok::<_, Infallible>(Probe::<()>::Miss)).unwrap();
	let elapsed = start.elapsed();
	if elapsed > timeout + SLEEP_MAX + SLACK {
		return TestResult::error(format!("{elapsed:?} exceeds {timeout:?}"))
	}
	qc_assert_eq!(hits.len(), 0)
}

#[quickcheck]
fn sleep_stays_in_bounds(probes: Vec<bool>) -> TestResult {
	let mut poller = Poller::from(PollOptions::new().with_timeout(Some(Duration::ZERO)));
	for hit in probes {
		poller.poll(|| Ok::<_, Infallible>(if hit { Probe::Hit(()) } else { Probe::Miss })).unwrap();
		let sleep = poller.sleep();
		if !(SLEEP_MIN..=SLEEP_MAX).contains(&sleep) {
			return TestResult::error(format!("sleep {sleep:?} out of bounds"))
		}
	}
	TestResult::passed()
}

#[test]
fn stops_once_data_stops() {
	let mut poller = Poller::from(PollOptions::new().with_timeout(Some(Duration::from_millis(200))));
	let start = Instant::now();
	let mut delivered = false;
	let mut probes_after = 0;
	let hits = poller.poll(|| {
		if delivered {
			probes_after += 1;
			return Ok::<_, Infallible>(Probe::Miss)
		}
		if start.elapsed() < Duration::from_millis(50) {
			Ok(Probe::Miss)
		} else {
			delivered = true;
			Ok(Probe::Hit("item"))
		}
	}).unwrap();

	assert_eq!(hits, ["item"]);
	assert_eq!(probes_after, 1);
	assert!(start.elapsed() < Duration::from_millis(200), "waited out the timeout");
}

#[test]
fn indefinite_timeout_waits_for_data() {
	let mut poller = Poller::from(PollOptions::new().with_timeout_micros(-1));
	let mut misses = 0;
	let hits = poller.poll(|| {
		misses += 1;
		Ok::<_, Infallible>(if misses > 5 { Probe::Hit(misses) } else { Probe::Miss })
	}).unwrap();
	assert_eq!(hits, [6]);
}
