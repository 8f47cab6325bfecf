//! Per-key call recorder.
//!
//! Combines a call counter, a latency-sum counter and a latency histogram.
//! `record` is safe to call from any number of tasks; `interval` is called by
//! the single reporting task.

use std::time::{Duration, Instant};

use crate::stats::counter::IntervalCounter;
use crate::stats::histogram::{LatencyBounds, LatencyHistogram};
use crate::stats::snapshot::Snapshot;

#[derive(Debug)]
pub struct CallRecorder {
    count: IntervalCounter,
    latency_sum: IntervalCounter,
    latency: LatencyHistogram,
    goal_us: u64,
}

impl CallRecorder {
    pub fn new(bounds: LatencyBounds, goal: Duration) -> Self {
        Self {
            count: IntervalCounter::new(),
            latency_sum: IntervalCounter::new(),
            latency: LatencyHistogram::new(bounds),
            goal_us: goal.as_micros() as u64,
        }
    }

    /// Record a call that started at `start` and ends now.
    pub fn record_since(&self, start: Instant) {
        self.record(start.elapsed());
    }

    /// Record one completed call of the given duration.
    ///
    /// Durations under the histogram floor are binned at the floor. Durations
    /// over the ceiling still count towards `count` and the mean; they are only
    /// left out of the percentiles.
    pub fn record(&self, elapsed: Duration) {
        let micros = elapsed.as_micros().min(u64::MAX as u128) as u64;
        self.count.add(1);
        self.latency_sum.add(micros);
        if let Err(e) = self.latency.record(micros) {
            tracing::warn!(latency_us = e.value, min_us = e.min, max_us = e.max, "Latency sample out of histogram range");
        }
    }

    /// Drain everything recorded since the last call into a [`Snapshot`].
    pub fn interval(&self) -> Snapshot {
        let count = self.count.drain();
        let latency_sum = self.latency_sum.drain();
        let histogram = self.latency.swap();
        Snapshot::from_interval(count, latency_sum, &histogram, self.goal_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::counter::IntervalCount;

    fn recorder() -> CallRecorder {
        let bounds = LatencyBounds::new(500, 30_000_000, 2).unwrap();
        CallRecorder::new(bounds, Duration::from_millis(10))
    }

    fn approx(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance * b.abs().max(1e-12)
    }

    #[test]
    fn empty_interval_is_all_zero() {
        let r = recorder();
        assert_eq!(r.interval(), Snapshot::EMPTY);
    }

    #[test]
    fn thousand_ten_millisecond_calls() {
        let r = recorder();
        for _ in 0..1000 {
            r.record(Duration::from_millis(10));
        }
        let s = r.interval();

        assert_eq!(s.count, 1000);
        assert!(approx(s.latency, 0.010, 1e-9));
        for p in [s.p50, s.p90, s.p99, s.p999] {
            assert!(approx(p, 0.010, 0.01), "percentile {}", p);
        }
        assert!(s.throughput > 0.0);
        assert!(approx(s.concurrency, s.throughput * 0.010, 1e-9));

        assert_eq!(r.interval().count, 0);
    }

    #[test]
    fn little_law_holds_for_constant_rate() {
        let bounds = LatencyBounds::new(500, 30_000_000, 2).unwrap();
        let h = LatencyHistogram::new(bounds);
        for _ in 0..200 {
            h.record(50_000).unwrap();
        }
        let count = IntervalCount {
            total: 200,
            elapsed: Duration::from_secs(2),
        };
        let sum = IntervalCount {
            total: 200 * 50_000,
            elapsed: Duration::from_secs(2),
        };
        let s = Snapshot::from_interval(count, sum, &h.swap(), 10_000);

        assert!(approx(s.throughput, 100.0, 1e-9));
        assert!(approx(s.latency, 0.05, 1e-9));
        assert!(approx(s.concurrency, 5.0, 1e-9));
        // 50ms is past 4x the 10ms goal.
        assert_eq!(s.apdex, 0.0);
    }

    #[test]
    fn apdex_weights_tolerating_calls_by_half() {
        let r = recorder();
        for _ in 0..50 {
            r.record(Duration::from_millis(2));
        }
        for _ in 0..50 {
            r.record(Duration::from_millis(20));
        }
        let s = r.interval();
        assert!(approx(s.apdex, 0.75, 1e-9));
    }

    #[test]
    fn samples_over_the_ceiling_are_counted_but_not_binned() {
        let r = recorder();
        r.record(Duration::from_secs(31));
        r.record(Duration::from_millis(5));
        r.record(Duration::from_millis(5));
        let s = r.interval();
        assert_eq!(s.count, 3);
        assert!(approx(s.latency, (31e6 + 10_000.0) / 3.0 * 1e-6, 1e-9));
        assert!(approx(s.p50, 0.005, 0.01));
    }

    #[test]
    fn calls_faster_than_the_floor_are_satisfied() {
        let r = recorder();
        for _ in 0..100 {
            r.record(Duration::from_micros(200));
        }
        let s = r.interval();
        assert_eq!(s.count, 100);
        assert!(approx(s.apdex, 1.0, 1e-9));
        assert!(s.p50 > 0.0 && s.p50 <= 0.000_51, "p50 {}", s.p50);
        assert!(approx(s.latency, 0.000_2, 1e-9));
    }
}
