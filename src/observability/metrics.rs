//! Prometheus exposition of interval statistics.
//!
//! # Metrics
//! All gauges carry a `method` label; the aggregate uses `method="all"`.
//! - `rpc_gateway_calls` (gauge): calls completed in the last interval
//! - `rpc_gateway_throughput` (gauge): calls per second
//! - `rpc_gateway_concurrency` (gauge): mean calls in flight
//! - `rpc_gateway_latency_mean_seconds` (gauge): mean latency
//! - `rpc_gateway_latency_seconds` (gauge, `quantile` label): percentiles
//! - `rpc_gateway_apdex` (gauge): apdex score in [0, 1]
//! - `rpc_gateway_bytes_in_rate` / `rpc_gateway_bytes_out_rate` (gauge):
//!   payload bytes per second, unlabelled
//!
//! # Design Decisions
//! - Gauges are set once per interval from the same report that is logged,
//!   so the scrape and the log never disagree

use std::net::SocketAddr;

use metrics::{describe_gauge, gauge, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::stats::{Snapshot, SnapshotSink, StatsReport};

/// Install the global Prometheus recorder with an HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe_metrics() {
    describe_gauge!("rpc_gateway_calls", Unit::Count, "Calls completed in the last interval");
    describe_gauge!("rpc_gateway_throughput", "Calls per second over the last interval");
    describe_gauge!("rpc_gateway_concurrency", "Mean calls in flight (throughput x latency)");
    describe_gauge!("rpc_gateway_latency_mean_seconds", Unit::Seconds, "Mean call latency");
    describe_gauge!("rpc_gateway_latency_seconds", Unit::Seconds, "Call latency percentiles");
    describe_gauge!("rpc_gateway_apdex", "Apdex score against the goal latency");
    describe_gauge!("rpc_gateway_bytes_in_rate", "Request payload bytes per second");
    describe_gauge!("rpc_gateway_bytes_out_rate", "Response payload bytes per second");
}

/// Publishes each report as Prometheus gauges.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusSink;

impl SnapshotSink for PrometheusSink {
    fn report(&self, report: &StatsReport) {
        publish("all", &report.all);
        for (method, snapshot) in &report.methods {
            publish(method, snapshot);
        }
        gauge!("rpc_gateway_bytes_in_rate").set(report.bytes_in.rate);
        gauge!("rpc_gateway_bytes_out_rate").set(report.bytes_out.rate);
    }
}

fn publish(method: &str, snapshot: &Snapshot) {
    let method = method.to_string();
    gauge!("rpc_gateway_calls", "method" => method.clone()).set(snapshot.count as f64);
    gauge!("rpc_gateway_throughput", "method" => method.clone()).set(snapshot.throughput);
    gauge!("rpc_gateway_concurrency", "method" => method.clone()).set(snapshot.concurrency);
    gauge!("rpc_gateway_latency_mean_seconds", "method" => method.clone()).set(snapshot.latency);
    gauge!("rpc_gateway_apdex", "method" => method.clone()).set(snapshot.apdex);

    for (quantile, value) in [
        ("0.5", snapshot.p50),
        ("0.9", snapshot.p90),
        ("0.99", snapshot.p99),
        ("0.999", snapshot.p999),
    ] {
        gauge!("rpc_gateway_latency_seconds", "method" => method.clone(), "quantile" => quantile)
            .set(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::VolumeRate;
    use std::collections::BTreeMap;

    #[test]
    fn renders_aggregate_and_method_gauges() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let echo = Snapshot {
            count: 10,
            throughput: 10.0,
            apdex: 1.0,
            ..Snapshot::EMPTY
        };
        let report = StatsReport {
            all: echo,
            bytes_in: VolumeRate { total: 40, rate: 40.0 },
            bytes_out: VolumeRate { total: 0, rate: 0.0 },
            methods: BTreeMap::from([("svc/Echo".to_string(), echo)]),
        };

        metrics::with_local_recorder(&recorder, || PrometheusSink.report(&report));
        let rendered = handle.render();

        assert!(rendered.contains(r#"rpc_gateway_throughput{method="all"}"#), "{}", rendered);
        assert!(rendered.contains(r#"rpc_gateway_apdex{method="svc/Echo"}"#), "{}", rendered);
        assert!(rendered.contains("rpc_gateway_bytes_in_rate"), "{}", rendered);
        assert!(rendered.contains(r#"quantile="0.99""#), "{}", rendered);
    }
}
