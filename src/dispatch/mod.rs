//! Inbound call dispatch.
//!
//! # Data Flow
//! ```text
//! HTTP/2 request (/package.Service/Method)
//!     → MethodName::from_path
//!     → MethodDispatcher::lookup (always succeeds)
//!     → CallHandler::serve
//!         → tonic framing with RawCodec (bytes in, bytes out)
//!         → ProxyExecutor::execute
//!     → gRPC response, TrackedBody ends the stats call on drop
//! ```
//!
//! # Design Decisions
//! - No service registry: the method name is data, not a route
//! - Messages are never parsed; the codec is the identity on frame payloads
//! - Call end is tied to the response body's lifetime, so cancelled calls
//!   are recorded as well

pub mod codec;
pub mod handler;
pub mod method;

pub use codec::RawCodec;
pub use handler::{CallHandler, MethodDispatcher, TrackedBody};
pub use method::MethodName;
