//! SLO-aware inference request router.
//!
//! Each incoming request names a model outright or states a service-level
//! objective: a minimum accuracy or a maximum latency. The router picks the
//! variant that best satisfies it from a catalog of functionally equivalent
//! model variants, executes the request through an [`engine::Executor`],
//! and feeds the measured latency back into the variant's statistics so
//! later decisions reflect what actually happened.
//!
//! # Layout
//!
//! - [`models`]: variants, latency statistics, registry, catalogs
//! - [`scheduler`]: selection, request lifecycle, dispatch, warm-up
//! - [`engine`]: the executor boundary
//! - [`telemetry`]: logging, spans, metrics
//! - [`config`]: environment configuration

pub mod cli;
pub mod config;
pub mod engine;
pub mod models;
pub mod scheduler;
pub mod telemetry;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use config::EnvConfig;
use engine::Executor;
use models::{
    CatalogError, FileCatalog, RegistryError, VariantCatalog, VariantDescriptor, VariantRegistry,
};
use scheduler::{
    DispatchError, DispatchResponse, Dispatcher, DispatcherConfig, InferenceRequest,
    ProfileError, ProfileReport, SelectionEngine, DEFAULT_ACCURACY_FLOOR,
};

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub accuracy_floor: f64,
    pub warmup_executions: usize,
    pub promote_all: bool,
    pub dispatcher: DispatcherConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            accuracy_floor: DEFAULT_ACCURACY_FLOOR,
            warmup_executions: 0,
            promote_all: false,
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl From<&EnvConfig> for RouterConfig {
    fn from(env: &EnvConfig) -> Self {
        Self {
            accuracy_floor: env.accuracy_floor,
            warmup_executions: env.warmup_executions,
            promote_all: env.promote_all,
            dispatcher: env.dispatcher.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// A configured router: registry plus dispatcher.
pub struct Router {
    config: RouterConfig,
    dispatcher: Arc<Dispatcher>,
}

impl Router {
    /// Create a router over an existing registry.
    pub fn new(
        registry: Arc<VariantRegistry>,
        config: RouterConfig,
        executor: Arc<dyn Executor>,
    ) -> Self {
        if config.promote_all {
            registry.promote_all();
        }
        let engine = SelectionEngine::new(config.accuracy_floor);
        let dispatcher = Dispatcher::new(registry, engine, executor, config.dispatcher.clone());
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Create a router from every variant a catalog knows about.
    pub fn from_catalog(
        catalog: &dyn VariantCatalog,
        config: RouterConfig,
        executor: Arc<dyn Executor>,
    ) -> Result<Self, BuildError> {
        let descriptors = catalog.list_known_variants()?;
        let registry = VariantRegistry::from_descriptors(descriptors)?;
        tracing::info!(
            variants = registry.len(),
            promote_all = config.promote_all,
            "router initialized"
        );
        Ok(Self::new(Arc::new(registry), config, executor))
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<VariantRegistry> {
        self.dispatcher.registry()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Dispatch one request to completion.
    pub async fn route(&self, request: InferenceRequest) -> Result<DispatchResponse, DispatchError> {
        self.dispatcher.dispatch(request).await
    }

    /// Profile every variant with the configured number of warm executions.
    ///
    /// A no-op when `warmup_executions` is zero.
    pub async fn warm_up(&self) -> Vec<Result<ProfileReport, ProfileError>> {
        if self.config.warmup_executions == 0 {
            return Vec::new();
        }
        self.dispatcher
            .profiler()
            .cycle_all(self.config.warmup_executions)
            .await
    }

    /// Persist the current variants, with measured latencies, as JSON lines.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        let descriptors: Vec<VariantDescriptor> = self
            .registry()
            .all_variants()
            .iter()
            .map(|v| VariantDescriptor::from_variant(v))
            .collect();
        FileCatalog::write_json_lines(path, &descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimulatedExecutor;
    use crate::models::{Application, StaticCatalog};
    use crate::scheduler::SloKind;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(vec![
            VariantDescriptor::new("fast", 0.70, Application::Image)
                .with_profiled_latency(0.05, None),
            VariantDescriptor::new("accurate", 0.85, Application::Image)
                .with_profiled_latency(0.40, None),
        ])
    }

    #[tokio::test]
    async fn test_router_from_catalog_routes() {
        let router = Router::from_catalog(
            &catalog(),
            RouterConfig::default(),
            Arc::new(SimulatedExecutor::default()),
        )
        .unwrap();
        assert_eq!(router.registry().len(), 2);
        assert_eq!(router.registry().active_count(), 0);

        let request = InferenceRequest::with_slo(SloKind::Accuracy, 0.8, Application::Image, vec![]);
        let response = router.route(request).await.unwrap();
        assert_eq!(response.model, "accurate");
        assert!(response.model_miss);
    }

    #[test]
    fn test_promote_all() {
        let config = RouterConfig {
            promote_all: true,
            ..RouterConfig::default()
        };
        let router =
            Router::from_catalog(&catalog(), config, Arc::new(SimulatedExecutor::default()))
                .unwrap();
        assert_eq!(router.registry().active_count(), 2);
    }

    #[test]
    fn test_duplicate_catalog_entry_rejected() {
        let dup = StaticCatalog::new(vec![
            VariantDescriptor::new("m", 0.7, Application::Image),
            VariantDescriptor::new("m", 0.8, Application::Image),
        ]);
        let result = Router::from_catalog(
            &dup,
            RouterConfig::default(),
            Arc::new(SimulatedExecutor::default()),
        );
        assert!(matches!(result, Err(BuildError::Registry(_))));
    }

    #[tokio::test]
    async fn test_warm_up_disabled_by_default() {
        let router = Router::from_catalog(
            &catalog(),
            RouterConfig::default(),
            Arc::new(SimulatedExecutor::default()),
        )
        .unwrap();
        assert!(router.warm_up().await.is_empty());
    }
}
