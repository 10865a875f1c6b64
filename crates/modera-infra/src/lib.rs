//! Modera Infrastructure Library
//!
//! Shared plumbing for the moderation service:
//! - Telemetry initialization (tracing subscriber)
//! - Request ID middleware
//! - HTTP error response body

#[cfg(feature = "middleware")]
pub mod middleware;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

#[cfg(feature = "middleware")]
pub use middleware::{get_request_id, request_id_middleware, RequestId};

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, TelemetryOptions};

pub use error::ErrorResponse;
