#![doc(hidden)]
//! A module for code shared between integration tests & benchmarks in this crate.

pub mod variants;

use std::thread;
use std::time::{Duration, Instant};

use crate::strategy::RateLimit;

/// Takes every permit that is available without waiting and returns
/// how many were taken.
pub fn drain<L: RateLimit + ?Sized>(limiter: &L) -> u32 {
    let mut taken = 0;
    while limiter.consume_async() {
        taken += 1;
    }
    taken
}

/// Polls `condition` every millisecond until it holds or `timeout`
/// passes. Returns whether it held.
pub fn eventually<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}
