//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! SIGTERM/SIGINT (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → server stops accepting, drains in-flight calls
//!     → stats reporter exits its loop
//! ```
//!
//! # Design Decisions
//! - One broadcast channel, any number of subscribers
//! - Triggering is idempotent

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::trigger_on_signal;
