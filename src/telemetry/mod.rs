//! Telemetry for the router.
//!
//! Structured logging, per-request spans, and metrics for selection and
//! execution outcomes.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    record_execution, record_model_miss, record_request_failure, record_request_success,
    record_selection,
};
pub use spans::{RequestSpan, SpanExt};
