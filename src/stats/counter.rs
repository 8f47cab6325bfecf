//! Interval counters.
//!
//! An [`IntervalCounter`] is a single 64-bit accumulator. Writers add to it
//! with one relaxed `fetch_add`; the periodic reader drains it with one
//! atomic `swap(0)`, so an increment lands in exactly one interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// A concurrently writable accumulator with an atomic read-and-reset.
#[derive(Debug)]
pub struct IntervalCounter {
    value: AtomicU64,
    /// Only touched by the drainer, never by writers.
    last_drain: Mutex<Instant>,
}

impl IntervalCounter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
            last_drain: Mutex::new(Instant::now()),
        }
    }

    /// Add `n` to the current interval. Never blocks.
    #[inline]
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Value accumulated since the last drain, without resetting it.
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Take the total accumulated since the previous drain and reset to zero.
    pub fn drain(&self) -> IntervalCount {
        let now = Instant::now();
        let mut last = self.last_drain.lock();
        let total = self.value.swap(0, Ordering::AcqRel);
        let elapsed = now.saturating_duration_since(*last);
        *last = now;
        IntervalCount { total, elapsed }
    }
}

impl Default for IntervalCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// The result of draining an [`IntervalCounter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalCount {
    pub total: u64,
    pub elapsed: Duration,
}

impl IntervalCount {
    /// Events (or units) per second over the drained interval.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }
}

/// Serialized form of a drained volume counter (`bytes_in`, `bytes_out`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeRate {
    pub total: u64,
    pub rate: f64,
}

impl From<IntervalCount> for VolumeRate {
    fn from(count: IntervalCount) -> Self {
        Self {
            total: count.total,
            rate: count.rate(),
        }
    }
}
