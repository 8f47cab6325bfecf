//! Concurrent latency histogram.
//!
//! Two bucket arrays of atomic counts sit behind a [`Phaser`]. Writers bump
//! one bucket in the active array; [`LatencyHistogram::swap`] flips the
//! arrays, drains the quiescent one into an [`hdrhistogram::Histogram`] and
//! hands that back as an immutable [`HistogramSnapshot`].
//!
//! Buckets are log-linear: values below `2^k` get their own bucket, above
//! that each power of two is split into `2^k` equal buckets, which bounds the
//! relative error by `2^-k`. `k` is derived from the configured number of
//! significant figures the same way HdrHistogram sizes its sub-buckets.

use std::sync::atomic::{AtomicU64, Ordering};

use hdrhistogram::Histogram;
use parking_lot::Mutex;

use crate::stats::phaser::Phaser;

/// Errors raised while constructing histogram bounds.
#[derive(Debug, thiserror::Error)]
pub enum HistogramError {
    #[error("invalid latency bounds {min}..={max}: {reason}")]
    InvalidBounds { min: u64, max: u64, reason: String },
}

/// A sample rejected because it is outside the trackable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("value {value} outside trackable range {min}..={max}")]
pub struct OutOfRange {
    pub value: u64,
    pub min: u64,
    pub max: u64,
}

/// Trackable range and precision, validated once and shared by every histogram.
#[derive(Debug, Clone)]
pub struct LatencyBounds {
    min: u64,
    max: u64,
    precision_bits: u32,
    buckets: usize,
    template: Histogram<u64>,
}

impl LatencyBounds {
    /// Bounds in microseconds, inclusive on both ends.
    pub fn new(min: u64, max: u64, significant_figures: u8) -> Result<Self, HistogramError> {
        let invalid = |reason: String| HistogramError::InvalidBounds { min, max, reason };

        if !(1..=3).contains(&significant_figures) {
            return Err(invalid(format!(
                "significant figures must be 1..=3, got {}",
                significant_figures
            )));
        }
        // One extra digit so re-binning the buckets adds no visible error.
        let template = Histogram::<u64>::new_with_bounds(min, max, significant_figures + 1)
            .map_err(|e| invalid(format!("{:?}", e)))?;

        let largest = 2 * 10u64.pow(significant_figures as u32);
        let precision_bits = 64 - (largest - 1).leading_zeros() - 1;
        let buckets = bucket_index(max, precision_bits) + 1;

        Ok(Self {
            min,
            max,
            precision_bits,
            buckets,
            template,
        })
    }

}

#[inline]
fn bucket_index(value: u64, bits: u32) -> usize {
    let sub = 1u64 << bits;
    if value < sub {
        return value as usize;
    }
    let magnitude = 63 - value.leading_zeros();
    let shift = magnitude - bits;
    let mantissa = (value >> shift) - sub;
    ((shift as u64 + 1) * sub + mantissa) as usize
}

/// Midpoint of the values mapped to `index`.
fn bucket_value(index: usize, bits: u32) -> u64 {
    let sub = 1u64 << bits;
    let i = index as u64;
    if i < sub {
        return i;
    }
    let shift = i / sub - 1;
    let lower = (sub + i % sub) << shift;
    lower + ((1u64 << shift) >> 1)
}

fn new_buffer(len: usize) -> Box<[AtomicU64]> {
    (0..len).map(|_| AtomicU64::new(0)).collect()
}

/// Wait-free writers, one periodic reader.
#[derive(Debug)]
pub struct LatencyHistogram {
    bounds: LatencyBounds,
    phaser: Phaser,
    buffers: [Box<[AtomicU64]>; 2],
    reader: Mutex<()>,
}

impl LatencyHistogram {
    pub fn new(bounds: LatencyBounds) -> Self {
        let len = bounds.buckets;
        Self {
            bounds,
            phaser: Phaser::new(),
            buffers: [new_buffer(len), new_buffer(len)],
            reader: Mutex::new(()),
        }
    }

    /// Record one value (microseconds).
    ///
    /// `min` is a resolution floor: smaller values are binned at `min`.
    /// Values above `max` are rejected untouched.
    pub fn record(&self, value: u64) -> Result<(), OutOfRange> {
        if value > self.bounds.max {
            return Err(OutOfRange {
                value,
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }
        let value = value.max(self.bounds.min);
        let index = bucket_index(value, self.bounds.precision_bits);
        let ticket = self.phaser.enter();
        self.buffers[ticket.buffer()][index].fetch_add(1, Ordering::Relaxed);
        self.phaser.exit(ticket);
        Ok(())
    }

    /// Everything recorded since the previous swap.
    ///
    /// A value whose `record` returned before this call is in this snapshot
    /// or the next one, never both.
    pub fn swap(&self) -> HistogramSnapshot {
        let _reader = self.reader.lock();
        let quiescent = self.phaser.flip();

        let mut hist = self.bounds.template.clone();
        for (index, bucket) in self.buffers[quiescent].iter().enumerate() {
            let count = bucket.swap(0, Ordering::Relaxed);
            if count > 0 {
                let value = bucket_value(index, self.bounds.precision_bits)
                    .clamp(self.bounds.min, self.bounds.max);
                hist.saturating_record_n(value, count);
            }
        }
        HistogramSnapshot { hist }
    }
}

/// Immutable view of one interval's latency distribution (microseconds).
#[derive(Debug, Clone)]
pub struct HistogramSnapshot {
    hist: Histogram<u64>,
}

impl HistogramSnapshot {
    pub fn len(&self) -> u64 {
        self.hist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hist.len() == 0
    }

    /// Value at `percentile` (0..=100); zero when empty.
    pub fn value_at_percentile(&self, percentile: f64) -> u64 {
        if self.is_empty() {
            return 0;
        }
        self.hist.value_at_percentile(percentile)
    }

    /// Counts of samples at or below `goal`, and in `(goal, 4 * goal]`.
    pub fn satisfaction_counts(&self, goal: u64) -> (u64, u64) {
        let tolerable = goal.saturating_mul(4);
        let mut satisfied = 0;
        let mut tolerating = 0;
        for v in self.hist.iter_recorded() {
            let value = self.hist.median_equivalent(v.value_iterated_to());
            if value <= goal {
                satisfied += v.count_at_value();
            } else if value <= tolerable {
                tolerating += v.count_at_value();
            }
        }
        (satisfied, tolerating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn bounds() -> LatencyBounds {
        LatencyBounds::new(500, 30_000_000, 2).unwrap()
    }

    #[test]
    fn bucket_layout_is_monotonic_and_tight() {
        let bits = 7;
        let mut last = 0;
        for value in (1..5_000_000u64).step_by(997) {
            let index = bucket_index(value, bits);
            assert!(index >= last);
            last = index;
            let mid = bucket_value(index, bits) as f64;
            let err = (mid - value as f64).abs() / value as f64;
            assert!(err <= 1.0 / 128.0, "value {} -> {} (err {})", value, mid, err);
        }
    }

    #[test]
    fn rejects_values_above_max() {
        let h = LatencyHistogram::new(bounds());
        assert_eq!(
            h.record(30_000_001),
            Err(OutOfRange {
                value: 30_000_001,
                min: 500,
                max: 30_000_000
            })
        );
        assert!(h.record(500).is_ok());
        assert!(h.record(30_000_000).is_ok());
        assert_eq!(h.swap().len(), 2);
    }

    #[test]
    fn values_below_min_are_binned_at_min() {
        let h = LatencyHistogram::new(bounds());
        assert!(h.record(0).is_ok());
        assert!(h.record(499).is_ok());
        let snapshot = h.swap();
        assert_eq!(snapshot.len(), 2);
        let p100 = snapshot.value_at_percentile(100.0);
        assert!((500..=510).contains(&p100), "p100 {}", p100);
        assert_eq!(snapshot.satisfaction_counts(10_000), (2, 0));
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        assert!(LatencyBounds::new(0, 1000, 2).is_err());
        assert!(LatencyBounds::new(500, 600, 2).is_err());
        assert!(LatencyBounds::new(500, 30_000_000, 0).is_err());
    }

    #[test]
    fn swap_resets_the_interval() {
        let h = LatencyHistogram::new(bounds());
        for _ in 0..10 {
            h.record(10_000).unwrap();
        }
        let first = h.swap();
        assert_eq!(first.len(), 10);
        assert!(h.swap().is_empty());

        h.record(20_000).unwrap();
        assert_eq!(h.swap().len(), 1);
    }

    #[test]
    fn median_within_relative_error() {
        let h = LatencyHistogram::new(bounds());
        let (min, max) = (500u64, 30_000_000u64);
        let k = 10_001u64;
        let step = (max - min) / (k - 1);
        for i in 0..k {
            h.record(min + i * step).unwrap();
        }
        let snapshot = h.swap();
        let true_median = (min + max) as f64 / 2.0;
        let p50 = snapshot.value_at_percentile(50.0) as f64;
        assert!(
            (p50 - true_median).abs() / true_median < 0.01,
            "p50 {} vs {}",
            p50,
            true_median
        );
    }

    #[test]
    fn satisfaction_splits_on_goal() {
        let h = LatencyHistogram::new(bounds());
        for _ in 0..6 {
            h.record(2_000).unwrap();
        }
        for _ in 0..3 {
            h.record(25_000).unwrap();
        }
        h.record(100_000).unwrap();

        let (satisfied, tolerating) = h.swap().satisfaction_counts(10_000);
        assert_eq!(satisfied, 6);
        assert_eq!(tolerating, 3);
    }

    #[test]
    fn concurrent_writers_lose_nothing_across_swaps() {
        let h = Arc::new(LatencyHistogram::new(bounds()));
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let h = h.clone();
                std::thread::spawn(move || {
                    for i in 0..20_000u64 {
                        h.record(1_000 + i).unwrap();
                    }
                })
            })
            .collect();

        let mut total = 0;
        for _ in 0..20 {
            total += h.swap().len();
        }
        for w in writers {
            w.join().unwrap();
        }
        total += h.swap().len();
        assert_eq!(total, 80_000);
    }
}
