//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, mutual TLS).
    pub listener: ListenerConfig,

    /// Legacy HTTP backend every call is forwarded to.
    pub backend: BackendConfig,

    /// Inbound call handling.
    pub dispatch: DispatchConfig,

    /// Call statistics.
    pub stats: StatsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:50051").
    pub bind_address: String,

    /// Mutual TLS. When absent the gateway serves plaintext HTTP/2.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:50051".to_string(),
            tls: None,
        }
    }
}

/// Trust store and identity for mutual TLS.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// PEM bundle of CA certificates that peer certificates must chain to.
    pub ca_cert_path: String,

    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            ca_cert_path: "cert.crt".to_string(),
            cert_path: "cert.crt".to_string(),
            key_path: "cert.key".to_string(),
        }
    }
}

/// Legacy backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL; the method name is appended as the `method` query parameter.
    pub url: String,

    /// Idle keep-alive connections kept per backend host.
    pub max_idle_connections: usize,

    /// How long an idle pooled connection is kept, in seconds.
    pub idle_timeout_secs: u64,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Total request timeout in seconds. Unset means no client-side timeout.
    pub request_timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/grpc".to_string(),
            max_idle_connections: 100,
            idle_timeout_secs: 300,
            connect_timeout_secs: 5,
            request_timeout_secs: None,
        }
    }
}

/// How inbound calls are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// One request message, one response message.
    #[default]
    Unary,
    /// A stream of request chunks, concatenated and forwarded once.
    ClientStreaming,
}

/// Inbound call handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub call_kind: CallKind,

    /// Largest request message accepted, in bytes. Unset = unbounded.
    /// Backend responses are never capped.
    pub max_message_bytes: Option<usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            call_kind: CallKind::Unary,
            max_message_bytes: None,
        }
    }
}

/// Call statistics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Reporting interval in milliseconds.
    pub report_interval_ms: u64,

    /// Smallest latency kept in the histogram, in microseconds.
    pub min_latency_us: u64,

    /// Largest latency kept in the histogram, in microseconds.
    pub max_latency_us: u64,

    /// Satisfaction threshold for the apdex score, in microseconds.
    pub goal_latency_us: u64,

    /// Histogram precision (1..=3).
    pub significant_figures: u8,

    /// Soft cap on per-method recorders. Unset means unbounded.
    pub max_tracked_methods: Option<usize>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            report_interval_ms: 1000,
            min_latency_us: 500,
            max_latency_us: 30_000_000,
            goal_latency_us: 10_000,
            significant_figures: 2,
            max_tracked_methods: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
