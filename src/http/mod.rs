//! HTTP/2 front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → optional mutual TLS handshake (axum-server + rustls)
//!     → server.rs (Axum fallback route, trace layer)
//!     → dispatch::MethodDispatcher
//!     → gRPC response back to the client
//! ```

pub mod server;

pub use server::{GatewayServer, ServerError};
