//! Legacy backend forwarding.
//!
//! # Data Flow
//! ```text
//! MethodName + request bytes
//!     → executor.rs (POST {url}?method=..., octet-stream body, pooled client)
//!     → status.rs (HTTP status → RPC code)
//!     → response bytes or Status
//! ```
//!
//! # Design Decisions
//! - One pooled client shared by every call
//! - Non-200 response bodies are discarded
//! - Transport failures surface as `Internal`
//! - Backend requests are detached from the caller, so cancellation never
//!   aborts an in-flight backend call

pub mod executor;
pub mod status;

pub use executor::{ExecutorError, ProxyExecutor};
pub use status::code_for;
