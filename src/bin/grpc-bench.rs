//! Load generator for the gateway.
//!
//! Sends `HelloRequest` messages as raw bytes from a pool of concurrent
//! workers and logs the resulting latency snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use clap::Parser;
use prost::Message;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::Status;

use rpc_gateway::config::{ObservabilityConfig, TlsConfig};
use rpc_gateway::dispatch::RawCodec;
use rpc_gateway::net::SecureTransportContext;
use rpc_gateway::observability::init_logging;
use rpc_gateway::stats::{CallRecorder, LatencyBounds};

#[derive(Clone, PartialEq, prost::Message)]
struct HelloRequest {
    #[prost(string, tag = "1")]
    name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
struct HelloReply {
    #[prost(string, tag = "1")]
    message: String,
}

#[derive(Parser, Debug)]
#[command(name = "grpc-bench")]
#[command(about = "Runs a batch of calls against the gateway and reports latency")]
struct Cli {
    /// Hostname of the gateway.
    #[arg(long, default_value = "localhost")]
    hostname: String,

    #[arg(short, long, default_value_t = 50051)]
    port: u16,

    /// Total number of calls.
    #[arg(short = 'n', long, default_value_t = 1_000_000)]
    requests: usize,

    /// Number of concurrent workers.
    #[arg(short = 'c', long, default_value_t = 10)]
    concurrency: usize,

    #[arg(long, default_value = "helloworld.Greeter/SayHello")]
    method: String,

    /// CA bundle. Any TLS flag switches the client to mutual TLS.
    #[arg(long)]
    ca_certs: Option<String>,

    #[arg(long)]
    cert: Option<String>,

    #[arg(long)]
    key: Option<String>,
}

impl Cli {
    fn tls(&self) -> Option<TlsConfig> {
        if self.ca_certs.is_none() && self.cert.is_none() && self.key.is_none() {
            return None;
        }
        let defaults = TlsConfig::default();
        Some(TlsConfig {
            ca_cert_path: self.ca_certs.clone().unwrap_or(defaults.ca_cert_path),
            cert_path: self.cert.clone().unwrap_or(defaults.cert_path),
            key_path: self.key.clone().unwrap_or(defaults.key_path),
        })
    }
}

async fn call(channel: Channel, path: PathAndQuery, payload: Bytes) -> Result<Bytes, Status> {
    let mut client = tonic::client::Grpc::new(channel);
    client
        .ready()
        .await
        .map_err(|e| Status::unavailable(format!("channel not ready: {}", e)))?;
    let response = client
        .unary(tonic::Request::new(payload), path, RawCodec)
        .await?;
    Ok(response.into_inner())
}

async fn greet(channel: Channel, path: PathAndQuery, i: usize) -> Option<String> {
    let request = HelloRequest {
        name: format!("world {}", i),
    };
    match call(channel, path, request.encode_to_vec().into()).await {
        Ok(body) => match HelloReply::decode(body) {
            Ok(reply) => Some(reply.message),
            Err(e) => {
                tracing::warn!(error = %e, "Undecodable reply");
                None
            }
        },
        Err(status) => {
            tracing::warn!(code = ?status.code(), message = status.message(), "RPC failed");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&ObservabilityConfig::default())?;

    let tls = cli.tls();
    let scheme = if tls.is_some() { "https" } else { "http" };
    let uri = format!("{}://{}:{}", scheme, cli.hostname, cli.port);
    let mut endpoint = Endpoint::from_shared(uri)?;
    if let Some(tls) = &tls {
        let context = SecureTransportContext::load(tls)?;
        endpoint = endpoint.tls_config(context.client_config(&cli.hostname))?;
    }
    let channel = endpoint.connect().await?;
    let path: PathAndQuery = format!("/{}", cli.method).parse()?;

    let bounds = LatencyBounds::new(500, 60_000_000, 2)?;
    let recorder = Arc::new(CallRecorder::new(bounds, Duration::from_millis(10)));

    let first = greet(channel.clone(), path.clone(), cli.requests).await;
    tracing::info!(reply = ?first, "Initial request");
    tracing::info!(requests = cli.requests, workers = cli.concurrency, "Sending requests");

    let workers = cli.concurrency.max(1);
    let start = Instant::now();
    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            let calls = worker_share(cli.requests, workers, worker);
            let channel = channel.clone();
            let path = path.clone();
            let recorder = recorder.clone();
            tokio::spawn(async move {
                for j in 0..calls {
                    let t = Instant::now();
                    greet(channel.clone(), path.clone(), j).await;
                    recorder.record_since(t);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await?;
    }

    let duration = start.elapsed();
    let stats = recorder.interval();
    let json = serde_json::to_string(&stats)?;
    tracing::info!(
        stats = %json,
        duration_secs = duration.as_secs_f64(),
        "{} requests in {:?} ({:.1} req/sec)",
        stats.count,
        duration,
        stats.throughput
    );
    Ok(())
}

/// Calls sent by worker `index`; the first `total % workers` send one extra.
fn worker_share(total: usize, workers: usize, index: usize) -> usize {
    total / workers + usize::from(index < total % workers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_request_is_assigned() {
        for (total, workers) in [(10, 3), (9, 3), (2, 5), (0, 4), (1000, 7)] {
            let shares: Vec<_> = (0..workers).map(|i| worker_share(total, workers, i)).collect();
            assert_eq!(shares.iter().sum::<usize>(), total, "{} over {}", total, workers);
            let (min, max) = (shares.iter().min().unwrap(), shares.iter().max().unwrap());
            assert!(max - min <= 1);
        }
        assert_eq!(
            (0..3).map(|i| worker_share(10, 3, i)).collect::<Vec<_>>(),
            vec![4, 3, 3]
        );
    }
}
