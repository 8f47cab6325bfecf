//! Point-in-time statistics for one tracked key.

use serde::Serialize;

use crate::stats::counter::IntervalCount;
use crate::stats::histogram::HistogramSnapshot;

const MICROS: f64 = 1e-6;

/// One reporting interval's worth of call statistics.
///
/// Latencies are in seconds. `concurrency` is derived with Little's Law
/// (`throughput * latency`) rather than counted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub count: u64,
    pub throughput: f64,
    pub concurrency: f64,
    pub latency: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub p999: f64,
    pub apdex: f64,
}

impl Snapshot {
    /// An interval with no traffic.
    pub const EMPTY: Snapshot = Snapshot {
        count: 0,
        throughput: 0.0,
        concurrency: 0.0,
        latency: 0.0,
        p50: 0.0,
        p90: 0.0,
        p99: 0.0,
        p999: 0.0,
        apdex: 0.0,
    };

    /// Build a snapshot from drained counters and histogram.
    ///
    /// `latency_sum` totals are microseconds; `goal_us` is the satisfaction
    /// threshold in microseconds.
    pub fn from_interval(
        count: IntervalCount,
        latency_sum: IntervalCount,
        latency: &HistogramSnapshot,
        goal_us: u64,
    ) -> Self {
        let c = count.total;
        if c == 0 {
            return Self::EMPTY;
        }

        let throughput = count.rate();
        let mean = latency_sum.total as f64 / c as f64 * MICROS;
        let (satisfied, tolerating) = latency.satisfaction_counts(goal_us);
        let apdex = ((satisfied as f64 + tolerating as f64 / 2.0) / c as f64).min(1.0);

        Self {
            count: c,
            throughput,
            concurrency: throughput * mean,
            latency: mean,
            p50: latency.value_at_percentile(50.0) as f64 * MICROS,
            p90: latency.value_at_percentile(90.0) as f64 * MICROS,
            p99: latency.value_at_percentile(99.0) as f64 * MICROS,
            p999: latency.value_at_percentile(99.9) as f64 * MICROS,
            apdex,
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::EMPTY
    }
}
