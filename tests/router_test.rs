//! Catalog loading, warm-up profiling, and routing end to end.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use slo_router::engine::SimulatedExecutor;
use slo_router::models::{
    ActionKind, Application, FileCatalog, UnloadPolicy, VariantCatalog, VariantDescriptor,
};
use slo_router::scheduler::{InferenceRequest, SloKind};
use slo_router::{Router, RouterConfig};

const MANIFEST: &str = r#"
[[variant]]
name = "mobilenet"
accuracy = 0.71
application = "image"
dimensions = [224, 224, 3]
profiled_latency = 0.002
profiled_cold_latency = 0.010

[[variant]]
name = "resnet50"
accuracy = 0.76
application = "image"
profiled_latency = 0.004
profiled_cold_latency = 0.020

[[variant]]
name = "bert"
accuracy = 0.88
application = "text"
endpoint = "http://bert:8080"
profiled_latency = 0.003
"#;

fn manifest_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(MANIFEST.as_bytes()).unwrap();
    file
}

fn router(path: &std::path::Path, config: RouterConfig) -> Router {
    let catalog = FileCatalog::new(path);
    let descriptors = catalog.list_known_variants().unwrap();
    let executor = SimulatedExecutor::from_descriptors(&descriptors);
    Router::from_catalog(&catalog, config, Arc::new(executor)).unwrap()
}

#[tokio::test]
async fn test_manifest_to_response() {
    let file = manifest_file();
    let router = router(file.path(), RouterConfig::default());
    assert_eq!(router.registry().len(), 3);

    let bert = router.registry().get("bert").unwrap();
    assert_eq!(bert.endpoint(), Some("http://bert:8080"));
    assert_eq!(bert.application(), Application::Text);

    let request = InferenceRequest::with_slo(SloKind::Accuracy, 0.75, Application::Image, vec![9; 32]);
    let response = router.route(request).await.unwrap();
    // bert (0.88) is the fastest qualifying variant: 0.003 vs 0.004 + 0.020.
    assert_eq!(response.model, "bert");
    assert!(response.model_miss);
    assert!(response.cold);

    let body: serde_json::Value = serde_json::from_slice(&response.response).unwrap();
    assert_eq!(body["input_bytes"], 32);
}

#[tokio::test]
async fn test_warm_up_profiles_every_variant() {
    let file = manifest_file();
    let config = RouterConfig {
        warmup_executions: 3,
        ..RouterConfig::default()
    };
    let router = router(file.path(), config);

    let reports = router.warm_up().await;
    assert_eq!(reports.len(), 3);
    let names: Vec<String> = reports
        .into_iter()
        .map(|r| r.unwrap().variant)
        .collect();
    assert_eq!(names, vec!["bert", "mobilenet", "resnet50"]);

    for v in router.registry().all_variants() {
        assert_eq!(v.stats(ActionKind::Load).count(), 1);
        assert_eq!(v.stats(ActionKind::Unload).count(), 1);
        assert!(!v.is_loaded());
        // One cold and three warm runs; history survives the unload.
        assert_eq!(v.stats(ActionKind::ExecuteCold).count(), 1);
        assert_eq!(v.stats(ActionKind::Execute).count(), 3);
    }
    assert_eq!(router.registry().active_count(), 0);
}

#[tokio::test]
async fn test_catalog_latencies_are_not_counted_as_executions() {
    let file = manifest_file();
    let router = router(file.path(), RouterConfig::default());

    let v = router.registry().get("resnet50").unwrap();
    for kind in ActionKind::ALL {
        assert!(v.stats(kind).is_empty());
    }
    assert!((v.effective_latency() - 0.024).abs() < 1e-9);

    const K: usize = 5;
    for _ in 0..K {
        router
            .route(InferenceRequest::for_model("resnet50", Application::Image, vec![]))
            .await
            .unwrap();
    }
    assert_eq!(v.stats(ActionKind::ExecuteCold).count(), 1);
    assert_eq!(v.stats(ActionKind::Execute).count(), K - 1);

    // A persisted and reloaded catalog starts from zero observations again.
    let dir = tempfile::tempdir().unwrap();
    let endpoints = dir.path().join("endpoints.info");
    router.persist(&endpoints).unwrap();
    let reloaded = crate::router(&endpoints, RouterConfig::default());
    let v = reloaded.registry().get("resnet50").unwrap();
    assert!(v.stats(ActionKind::Execute).is_empty());
    assert!(v.stats(ActionKind::ExecuteCold).is_empty());
    assert!(v.profiled_latency().is_some());
}

#[tokio::test]
async fn test_persist_and_reload_carries_measurements() {
    let file = manifest_file();
    let router = router(file.path(), RouterConfig::default());

    let request = InferenceRequest::for_model("resnet50", Application::Image, vec![]);
    router.route(request).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let endpoints = dir.path().join("endpoints.info");
    router.persist(&endpoints).unwrap();

    let contents = std::fs::read_to_string(&endpoints).unwrap();
    let names: Vec<String> = contents
        .lines()
        .map(|line| serde_json::from_str::<VariantDescriptor>(line).unwrap().name)
        .collect();
    assert_eq!(names, vec!["bert", "mobilenet", "resnet50"]);

    let reloaded = FileCatalog::new(&endpoints).list_known_variants().unwrap();
    let resnet = reloaded.iter().find(|d| d.name == "resnet50").unwrap();
    assert!(resnet.profiled_latency.is_some());
    assert!(resnet.profiled_cold_latency.is_some());
}

#[tokio::test]
async fn test_unload_with_reset_forgets_execution_history() {
    let file = manifest_file();
    let router = router(file.path(), RouterConfig::default());
    router
        .route(InferenceRequest::for_model("mobilenet", Application::Image, vec![]))
        .await
        .unwrap();

    let registry = router.registry();
    registry
        .unload("mobilenet", Duration::from_millis(1), UnloadPolicy::ResetStats)
        .unwrap();

    let v = registry.get("mobilenet").unwrap();
    assert!(!v.is_loaded());
    assert!(!registry.is_active("mobilenet"));
    assert!(v.stats(ActionKind::Execute).is_empty());
    assert!(v.stats(ActionKind::ExecuteCold).is_empty());
    assert_eq!(v.stats(ActionKind::Unload).count(), 1);
}

#[test]
fn test_matching_filters_catalog() {
    let file = manifest_file();
    let router = router(file.path(), RouterConfig::default());

    let images = router.registry().matching(Application::Image, 0.7, 0.015);
    let names: Vec<_> = images.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["mobilenet"]);
    assert!(!images[0].loaded);
}
