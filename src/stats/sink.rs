//! Destinations for periodic stats reports.

use std::sync::Arc;

use crate::stats::engine::StatsReport;

/// Receives one [`StatsReport`] per reporting interval.
///
/// Called from the reporter task; implementations should not block.
pub trait SnapshotSink: Send + Sync {
    fn report(&self, report: &StatsReport);
}

impl<F> SnapshotSink for F
where
    F: Fn(&StatsReport) + Send + Sync,
{
    fn report(&self, report: &StatsReport) {
        self(report)
    }
}

/// Emits each report as a single structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SnapshotSink for LogSink {
    fn report(&self, report: &StatsReport) {
        match serde_json::to_string(report) {
            Ok(stats) => tracing::info!(target: "rpc_gateway::stats", stats = %stats, "stats"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize stats report"),
        }
    }
}

/// Forwards every report to each inner sink in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn SnapshotSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl SnapshotSink for FanoutSink {
    fn report(&self, report: &StatsReport) {
        for sink in &self.sinks {
            sink.report(report);
        }
    }
}
