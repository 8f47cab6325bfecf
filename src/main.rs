//! RPC Gateway
//!
//! Terminates gRPC calls for any method and forwards them, byte for byte, to
//! a legacy HTTP backend.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                     RPC GATEWAY                      │
//!                  │                                                      │
//!   gRPC call      │  ┌─────────┐   ┌──────────┐   ┌──────────────┐       │
//!   ───────────────┼─▶│  http   │──▶│ dispatch │──▶│    proxy     │───────┼──▶ POST ?method=
//!                  │  │ server  │   │ RawCodec │   │   executor   │       │    legacy backend
//!   ◀──────────────┼──│ (mTLS)  │◀──│          │◀──│ status map   │◀──────┼───
//!                  │  └─────────┘   └────┬─────┘   └──────────────┘       │
//!                  │                     │ start / end                    │
//!                  │                     ▼                                │
//!                  │               ┌──────────┐   reporter  ┌─────────┐   │
//!                  │               │  stats   │────────────▶│  sinks  │   │
//!                  │               │  engine  │  every 1s   │ log/prom│   │
//!                  │               └──────────┘             └─────────┘   │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use rpc_gateway::config::{load_config, validate_config, ConfigError, GatewayConfig, TlsConfig};
use rpc_gateway::http::GatewayServer;
use rpc_gateway::lifecycle::{trigger_on_signal, Shutdown};
use rpc_gateway::observability::{init_logging, init_metrics, PrometheusSink};
use rpc_gateway::stats::{FanoutSink, LogSink, SnapshotSink, StatsEngine};

#[derive(Parser, Debug)]
#[command(name = "rpc-gateway", version)]
#[command(about = "Forward gRPC calls for any method to a legacy HTTP backend")]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides listener.bind_address's port).
    #[arg(short, long)]
    port: Option<u16>,

    /// Backend URL (overrides backend.url).
    #[arg(short, long)]
    upstream: Option<String>,

    /// CA bundle for client certificate verification. Enables mutual TLS.
    #[arg(long)]
    ca_certs: Option<String>,

    /// Server certificate chain. Enables mutual TLS.
    #[arg(long)]
    cert: Option<String>,

    /// Server private key. Enables mutual TLS.
    #[arg(long)]
    key: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut GatewayConfig) {
        if let Some(port) = self.port {
            config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
                Ok(mut addr) => {
                    addr.set_port(port);
                    addr.to_string()
                }
                Err(_) => format!("0.0.0.0:{}", port),
            };
        }
        if let Some(url) = &self.upstream {
            config.backend.url = url.clone();
        }
        if self.ca_certs.is_some() || self.cert.is_some() || self.key.is_some() {
            let tls = config.listener.tls.get_or_insert_with(TlsConfig::default);
            if let Some(path) = &self.ca_certs {
                tls.ca_cert_path = path.clone();
            }
            if let Some(path) = &self.cert {
                tls.cert_path = path.clone();
            }
            if let Some(path) = &self.key {
                tls.key_path = path.clone();
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability)?;
    tracing::info!("rpc-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.url,
        tls = config.listener.tls.is_some(),
        call_kind = ?config.dispatch.call_kind,
        "Configuration loaded"
    );

    let mut sink = FanoutSink::new().with(Arc::new(LogSink));
    if config.observability.metrics_enabled {
        init_metrics(config.observability.metrics_address.parse()?)?;
        sink = sink.with(Arc::new(PrometheusSink));
    }
    let sink: Arc<dyn SnapshotSink> = Arc::new(sink);

    let shutdown = Shutdown::new();
    let stats = Arc::new(StatsEngine::new(&config.stats)?);
    let reporter = stats.clone().spawn_reporter(
        Duration::from_millis(config.stats.report_interval_ms),
        sink,
        shutdown.subscribe(),
    );

    let server = GatewayServer::from_config(&config, stats)?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for calls");

    tokio::spawn(trigger_on_signal(shutdown.clone()));
    let result = server.run(listener, shutdown.subscribe()).await;

    shutdown.trigger();
    if let Err(e) = reporter.await {
        tracing::warn!(error = %e, "Stats reporter ended abnormally");
    }
    result?;

    tracing::info!("Shutdown complete");
    Ok(())
}
