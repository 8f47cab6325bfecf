//! Network security.
//!
//! # Data Flow
//! ```text
//! [listener.tls] paths
//!     → tls.rs (existence check, PEM parsing)
//!     → server: rustls ServerConfig, client certificate required
//!     → client: tonic ClientTlsConfig with the same identity
//! ```
//!
//! # Design Decisions
//! - Missing material is fatal at startup, never silently downgraded
//! - Crypto provider chosen explicitly instead of relying on a process default

pub mod tls;

pub use tls::{SecureTransportContext, TlsError};
