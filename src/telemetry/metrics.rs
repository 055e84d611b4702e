//! Router metrics.
//!
//! Recorded through the `metrics` facade. Nothing is exported unless the
//! embedding application installs a recorder.

use std::time::Duration;

use metrics::{counter, histogram};

use crate::models::ExecutionClass;

/// Count one selection attempt for a constraint kind.
pub fn record_selection(kind: &'static str, found: bool) {
    let outcome = if found { "found" } else { "not_found" };
    counter!("router_selections_total", "kind" => kind, "outcome" => outcome).increment(1);
}

/// Count a request served by a variant outside the active set.
pub fn record_model_miss(model: &str) {
    counter!("router_model_miss_total", "model" => model.to_string()).increment(1);
}

/// Record measured execution time for a variant.
pub fn record_execution(model: &str, class: ExecutionClass, elapsed: Duration) {
    histogram!(
        "router_execution_seconds",
        "model" => model.to_string(),
        "class" => class.as_str()
    )
    .record(elapsed.as_secs_f64());
}

/// Record a completed request and its end-to-end latency in seconds.
pub fn record_request_success(model: &str, latency_secs: f64) {
    counter!("router_requests_success_total", "model" => model.to_string()).increment(1);
    histogram!("router_request_latency_seconds", "model" => model.to_string())
        .record(latency_secs);
}

/// Count a failed request by error kind.
pub fn record_request_failure(kind: &'static str) {
    counter!("router_requests_failure_total", "kind" => kind).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder every call is a no-op.
    #[test]
    fn test_recording_without_recorder() {
        record_selection("min_accuracy", true);
        record_selection("max_latency", false);
        record_model_miss("resnet");
        record_execution("resnet", ExecutionClass::Cold, Duration::from_millis(5));
        record_request_success("resnet", 0.005);
        record_request_failure("not_found");
    }
}
