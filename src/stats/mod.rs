//! Call statistics subsystem.
//!
//! # Data Flow
//! ```text
//! call start  → engine.rs (resolve per-method recorder, stamp start)
//! call end    → recorder.rs (count + latency sum + histogram), global and per-method
//!
//! every report interval (single reader task):
//!     counter.rs   drain (atomic swap to zero)
//!     histogram.rs phase flip + drain of the quiescent buffer
//!     → snapshot.rs (throughput, Little's Law concurrency, percentiles, apdex)
//!     → sink.rs (log, Prometheus, ...)
//! ```
//!
//! # Design Decisions
//! - Writers never take a lock: counters are `fetch_add`, the histogram is
//!   an atomic bucket array guarded by a writer/reader phaser
//! - The reader pays for the handoff (waits out in-flight writers)
//! - Per-method recorders are created lazily and never evicted
//! - Latencies are tracked in microseconds and reported in seconds

pub mod counter;
pub mod engine;
pub mod histogram;
pub mod phaser;
pub mod recorder;
pub mod sink;
pub mod snapshot;

pub use counter::{IntervalCount, IntervalCounter, VolumeRate};
pub use engine::{CallGuard, CallToken, StatsEngine, StatsReport, OVERFLOW_KEY};
pub use histogram::{HistogramSnapshot, LatencyBounds, LatencyHistogram};
pub use recorder::CallRecorder;
pub use sink::{FanoutSink, LogSink, SnapshotSink};
pub use snapshot::Snapshot;
