//! Span utilities for request tracing.

use tracing::{info_span, Span};

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for dispatch spans.
pub struct RequestSpan;

impl RequestSpan {
    /// Create a span for one dispatched request.
    ///
    /// `model` and `model_miss` are filled in once a variant is selected,
    /// `latency_ms` after completion, `status` and `error.message` by
    /// [`SpanExt::record_result`].
    pub fn new(request_id: u64, constraint: &str) -> Span {
        info_span!(
            "dispatch_request",
            request_id,
            constraint = %constraint,
            model = tracing::field::Empty,
            model_miss = tracing::field::Empty,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_result_on_disabled_span() {
        let span = RequestSpan::new(7, "accuracy>=0.8");
        span.record("model", "resnet");
        span.record_result::<(), String>(&Err("boom".to_string()));
        span.record_result::<u8, String>(&Ok(1));
    }
}
