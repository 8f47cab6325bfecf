//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every subsystem
//!     → logging.rs (tracing events, pretty or JSON)
//! StatsEngine reporter, once per interval
//!     → LogSink (one structured event per report)
//!     → metrics.rs PrometheusSink (gauges, scraped over HTTP)
//! ```
//!
//! # Design Decisions
//! - Structured fields everywhere, never interpolated strings
//! - Prometheus is optional and off by default

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{init_metrics, PrometheusSink};
