//! Schema-agnostic RPC gateway.
//!
//! Accepts gRPC calls for any method name, forwards the raw request bytes to
//! a legacy HTTP backend, and turns the backend's answer back into an RPC
//! response. Every call is measured; statistics are reported per interval.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod stats;

pub use config::schema::GatewayConfig;
pub use dispatch::{MethodDispatcher, MethodName};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use proxy::ProxyExecutor;
pub use stats::StatsEngine;
