//! Warm-up profiling: load, one cold run, N warm runs, unload.
//!
//! Gives every variant real latency measurements before it competes for
//! live traffic. The unload keeps history, so ranking data survives while the
//! variant is marked cold again and leaves the active set.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{ExecutionError, ExecutionInput, Executor};
use crate::models::{ActionKind, ExecutionClass, StatsSummary, UnloadPolicy, VariantRegistry};

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Unknown variant: {0}")]
    UnknownVariant(String),

    #[error("Failed to load {model}: {source}")]
    Load {
        model: String,
        #[source]
        source: ExecutionError,
    },
}

/// Result of cycling one variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileReport {
    pub variant: String,
    pub load_secs: f64,
    pub cold_secs: Option<f64>,
    pub warm: StatsSummary,
    pub succeeded: usize,
    pub failed: usize,
}

/// Cycles variants through their executor to collect latency data.
pub struct Profiler {
    registry: Arc<VariantRegistry>,
    executor: Arc<dyn Executor>,
}

impl Profiler {
    pub fn new(registry: Arc<VariantRegistry>, executor: Arc<dyn Executor>) -> Self {
        Self { registry, executor }
    }

    /// Cycle one variant with `executions` warm runs after the cold run.
    pub async fn cycle(&self, name: &str, executions: usize) -> Result<ProfileReport, ProfileError> {
        let variant = self
            .registry
            .get(name)
            .ok_or_else(|| ProfileError::UnknownVariant(name.to_string()))?;

        let started = Instant::now();
        self.executor
            .load(&variant)
            .await
            .map_err(|source| ProfileError::Load {
                model: name.to_string(),
                source,
            })?;
        let load = started.elapsed();
        variant.record_load(load);

        let input = ExecutionInput::new(variant.application(), Vec::new());
        let mut cold_secs = None;
        let (mut succeeded, mut failed) = (0, 0);

        for _ in 0..=executions {
            let started = Instant::now();
            match self.executor.execute(&variant, &input).await {
                Ok(_) => {
                    let elapsed = started.elapsed();
                    if variant.record_execution(elapsed) == ExecutionClass::Cold {
                        cold_secs = Some(elapsed.as_secs_f64());
                    }
                    succeeded += 1;
                }
                Err(e) => {
                    variant.record_failure();
                    failed += 1;
                    tracing::warn!(variant = %name, error = %e, "profiling execution failed");
                }
            }
        }

        let started = Instant::now();
        if let Err(e) = self.executor.unload(&variant).await {
            tracing::warn!(variant = %name, error = %e, "unload failed during profiling");
        }
        let unload: Duration = started.elapsed();
        // The variant was fetched from this registry, so it is always known.
        let _ = self.registry.unload(name, unload, UnloadPolicy::KeepHistory);

        let report = ProfileReport {
            variant: name.to_string(),
            load_secs: load.as_secs_f64(),
            cold_secs,
            warm: variant.stats(ActionKind::Execute).summary(),
            succeeded,
            failed,
        };
        tracing::info!(
            variant = %name,
            warm = %report.warm,
            succeeded,
            failed,
            "profiled variant"
        );
        Ok(report)
    }

    /// Cycle every registered variant in name order.
    pub async fn cycle_all(&self, executions: usize) -> Vec<Result<ProfileReport, ProfileError>> {
        let mut reports = Vec::new();
        for variant in self.registry.all_variants() {
            reports.push(self.cycle(variant.name(), executions).await);
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimulatedExecutor;
    use crate::models::{Application, ModelVariant};

    fn profiler(executor: SimulatedExecutor) -> Profiler {
        let registry = VariantRegistry::from_variants([
            ModelVariant::new("a", 0.7, Application::Image),
            ModelVariant::new("b", 0.9, Application::Text),
        ])
        .unwrap();
        Profiler::new(Arc::new(registry), Arc::new(executor))
    }

    #[tokio::test]
    async fn test_cycle_records_every_action() {
        let p = profiler(SimulatedExecutor::new(Duration::from_millis(1)));
        p.registry.promote("a");

        let report = p.cycle("a", 5).await.unwrap();
        assert_eq!(report.succeeded, 6);
        assert_eq!(report.failed, 0);
        assert!(report.cold_secs.is_some());
        assert_eq!(report.warm.count, 5);

        let v = p.registry.get("a").unwrap();
        assert_eq!(v.stats(ActionKind::Load).count(), 1);
        assert_eq!(v.stats(ActionKind::Unload).count(), 1);
        assert_eq!(v.stats(ActionKind::ExecuteCold).count(), 1);
        assert!(!v.is_loaded());
        assert!(!p.registry.is_active("a"));
    }

    #[tokio::test]
    async fn test_cycle_counts_failures() {
        let p = profiler(SimulatedExecutor::new(Duration::ZERO).with_failure("b"));
        let report = p.cycle("b", 3).await.unwrap();
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed, 4);
        assert_eq!(p.registry.get("b").unwrap().failures(), 4);
        assert!(report.cold_secs.is_none());
    }

    #[tokio::test]
    async fn test_cycle_unknown_variant() {
        let p = profiler(SimulatedExecutor::default());
        assert!(matches!(
            p.cycle("missing", 1).await,
            Err(ProfileError::UnknownVariant(_))
        ));
    }

    #[tokio::test]
    async fn test_cycle_all_in_name_order() {
        let p = profiler(SimulatedExecutor::default());
        let reports = p.cycle_all(2).await;
        let names: Vec<_> = reports.into_iter().map(|r| r.unwrap().variant).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
