//! Stats engine: global + per-method recorders and the periodic reporter.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::StatsConfig;
use crate::dispatch::MethodName;
use crate::stats::counter::{IntervalCounter, VolumeRate};
use crate::stats::histogram::{HistogramError, LatencyBounds};
use crate::stats::recorder::CallRecorder;
use crate::stats::sink::SnapshotSink;
use crate::stats::snapshot::Snapshot;

/// Recorder key used for methods beyond `max_tracked_methods`.
pub const OVERFLOW_KEY: &str = "(other)";

/// Everything reported for one interval.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub all: Snapshot,
    pub bytes_in: VolumeRate,
    pub bytes_out: VolumeRate,
    pub methods: BTreeMap<String, Snapshot>,
}

#[derive(Debug)]
pub struct StatsEngine {
    bounds: LatencyBounds,
    goal: Duration,
    max_tracked_methods: Option<usize>,
    all: CallRecorder,
    methods: DashMap<String, Arc<CallRecorder>>,
    bytes_in: IntervalCounter,
    bytes_out: IntervalCounter,
}

/// Proof that a call started. Consumed by [`StatsEngine::on_call_end`].
#[derive(Debug)]
#[must_use = "every started call must be ended"]
pub struct CallToken {
    recorder: Arc<CallRecorder>,
    start: Instant,
}

impl StatsEngine {
    pub fn new(config: &StatsConfig) -> Result<Self, HistogramError> {
        let bounds = LatencyBounds::new(
            config.min_latency_us,
            config.max_latency_us,
            config.significant_figures,
        )?;
        Ok(Self::with_bounds(bounds, Duration::from_micros(config.goal_latency_us))
            .max_tracked_methods(config.max_tracked_methods))
    }

    pub fn with_bounds(bounds: LatencyBounds, goal: Duration) -> Self {
        Self {
            all: CallRecorder::new(bounds.clone(), goal),
            bounds,
            goal,
            max_tracked_methods: None,
            methods: DashMap::new(),
            bytes_in: IntervalCounter::new(),
            bytes_out: IntervalCounter::new(),
        }
    }

    /// Soft cap on distinct per-method recorders.
    pub fn max_tracked_methods(mut self, cap: Option<usize>) -> Self {
        self.max_tracked_methods = cap;
        self
    }

    fn recorder_for(&self, method: &str) -> Arc<CallRecorder> {
        if let Some(recorder) = self.methods.get(method) {
            return recorder.value().clone();
        }

        let key = match self.max_tracked_methods {
            Some(cap) if self.methods.len() >= cap => OVERFLOW_KEY,
            _ => method,
        };
        // First writer wins; racing callers get the same Arc back.
        self.methods
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(CallRecorder::new(self.bounds.clone(), self.goal)))
            .value()
            .clone()
    }

    pub fn on_call_start(&self, method: &MethodName) -> CallToken {
        CallToken {
            recorder: self.recorder_for(method.as_str()),
            start: Instant::now(),
        }
    }

    /// Record the end of a call into the global and per-method recorders.
    pub fn on_call_end(&self, token: CallToken) -> Duration {
        let elapsed = token.start.elapsed();
        self.all.record(elapsed);
        token.recorder.record(elapsed);
        elapsed
    }

    /// Start a call whose end is recorded when the returned guard drops.
    pub fn track(self: &Arc<Self>, method: &MethodName) -> CallGuard {
        CallGuard {
            token: Some(self.on_call_start(method)),
            engine: Arc::clone(self),
            method: method.clone(),
        }
    }

    pub fn record_bytes_in(&self, n: usize) {
        self.bytes_in.add(n as u64);
    }

    pub fn record_bytes_out(&self, n: usize) {
        self.bytes_out.add(n as u64);
    }

    pub fn tracked_methods(&self) -> usize {
        self.methods.len()
    }

    /// Drain every recorder into a report.
    pub fn report(&self) -> StatsReport {
        let recorders: Vec<(String, Arc<CallRecorder>)> = self
            .methods
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        StatsReport {
            all: self.all.interval(),
            bytes_in: self.bytes_in.drain().into(),
            bytes_out: self.bytes_out.drain().into(),
            methods: recorders
                .into_iter()
                .map(|(name, recorder)| (name, recorder.interval()))
                .collect(),
        }
    }

    /// Report to `sink` every `interval` until `shutdown` fires.
    pub fn spawn_reporter(
        self: Arc<Self>,
        interval: Duration,
        sink: Arc<dyn SnapshotSink>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval_ms = interval.as_millis() as u64, "Stats reporter starting");

            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = self.report();
                        sink.report(&report);
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Stats reporter received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}

/// Records the end of a call exactly once, when dropped.
///
/// Dropping covers every terminal outcome: success, error, and a caller that
/// went away mid-call.
#[derive(Debug)]
pub struct CallGuard {
    engine: Arc<StatsEngine>,
    token: Option<CallToken>,
    method: MethodName,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            let elapsed = self.engine.on_call_end(token);
            tracing::debug!(
                method = %self.method,
                duration_secs = elapsed.as_secs_f64(),
                "Call finished"
            );
        }
    }
}
