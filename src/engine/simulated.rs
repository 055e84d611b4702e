//! Executor that simulates model latency without running a model.
//!
//! Used by the CLI and by tests: each variant sleeps for its profiled warm
//! latency, plus the cold penalty while it is not loaded.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{ExecutionError, ExecutionInput, Executor};
use crate::models::{ModelVariant, VariantDescriptor};

#[derive(Debug, Clone, Copy)]
struct SimulatedLatency {
    warm: Duration,
    cold: Duration,
}

/// Sleep-based executor keyed by variant name.
#[derive(Debug, Clone, Default)]
pub struct SimulatedExecutor {
    latencies: HashMap<String, SimulatedLatency>,
    failing: HashSet<String>,
    default_latency: Duration,
}

impl SimulatedExecutor {
    pub fn new(default_latency: Duration) -> Self {
        Self {
            default_latency,
            ..Self::default()
        }
    }

    /// Take latencies from the profiled values in `descriptors`.
    pub fn from_descriptors<'a>(
        descriptors: impl IntoIterator<Item = &'a VariantDescriptor>,
    ) -> Self {
        let mut executor = Self::default();
        for d in descriptors {
            let warm = secs(d.profiled_latency);
            let cold = secs(d.profiled_cold_latency);
            executor = executor.with_latency(&d.name, warm, cold);
        }
        executor
    }

    pub fn with_latency(mut self, name: &str, warm: Duration, cold: Duration) -> Self {
        self.latencies
            .insert(name.to_string(), SimulatedLatency { warm, cold });
        self
    }

    /// Make every execution of `name` fail.
    pub fn with_failure(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Time the next execution of `variant` would take.
    pub fn delay_for(&self, variant: &ModelVariant) -> Duration {
        match self.latencies.get(variant.name()) {
            Some(l) if variant.is_loaded() => l.warm,
            Some(l) => l.warm + l.cold,
            None => self.default_latency,
        }
    }
}

fn secs(value: Option<f64>) -> Duration {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or_default()
}

#[async_trait]
impl Executor for SimulatedExecutor {
    async fn execute(
        &self,
        variant: &ModelVariant,
        input: &ExecutionInput,
    ) -> Result<Vec<u8>, ExecutionError> {
        tokio::time::sleep(self.delay_for(variant)).await;

        if self.failing.contains(variant.name()) {
            return Err(ExecutionError::ModelError(format!(
                "simulated failure in {}",
                variant.name()
            )));
        }

        let body = json!({
            "model": variant.name(),
            "application": input.application,
            "input_bytes": input.payload.len(),
        });
        serde_json::to_vec(&body).map_err(|e| ExecutionError::ModelError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Application;

    #[tokio::test]
    async fn test_simulated_execution_returns_body() {
        let executor = SimulatedExecutor::new(Duration::ZERO);
        let variant = ModelVariant::new("m", 0.8, Application::Text);
        let input = ExecutionInput::new(Application::Text, vec![1, 2, 3]);

        let out = executor.execute(&variant, &input).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(body["model"], "m");
        assert_eq!(body["input_bytes"], 3);
    }

    #[tokio::test]
    async fn test_simulated_failure() {
        let executor = SimulatedExecutor::new(Duration::ZERO).with_failure("broken");
        let variant = ModelVariant::new("broken", 0.8, Application::Image);
        let result = executor.execute(&variant, &ExecutionInput::default()).await;
        assert!(matches!(result, Err(ExecutionError::ModelError(_))));
    }

    #[test]
    fn test_delay_includes_cold_penalty_until_loaded() {
        let executor = SimulatedExecutor::default().with_latency(
            "m",
            Duration::from_millis(10),
            Duration::from_millis(90),
        );
        let variant = ModelVariant::new("m", 0.8, Application::Image);
        assert_eq!(executor.delay_for(&variant), Duration::from_millis(100));

        variant.record_execution(Duration::from_millis(100));
        assert_eq!(executor.delay_for(&variant), Duration::from_millis(10));
    }

    #[test]
    fn test_from_descriptors() {
        let descriptors = vec![
            VariantDescriptor::new("a", 0.7, Application::Image).with_profiled_latency(0.02, None),
        ];
        let executor = SimulatedExecutor::from_descriptors(&descriptors);
        let variant = ModelVariant::new("a", 0.7, Application::Image);
        assert!((executor.delay_for(&variant).as_secs_f64() - 0.02).abs() < 1e-6);
    }
}
