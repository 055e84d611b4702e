//! Request lifecycle: ordering, double-mark guard, completion and cancellation.

use std::sync::Arc;
use std::time::Duration;

use slo_router::engine::{ExecutionError, SimulatedExecutor};
use slo_router::models::{ActionKind, Application, ModelVariant, VariantRegistry};
use slo_router::scheduler::{
    Constraint, DispatchError, Dispatcher, DispatcherConfig, InferenceRequest, RequestContext,
    RequestPhase, SelectionEngine, SloKind,
};
use tokio_util::sync::CancellationToken;

fn dispatcher(latency: Duration) -> Arc<Dispatcher> {
    let registry = VariantRegistry::from_variants([
        ModelVariant::new("resnet18", 0.70, Application::Image),
        ModelVariant::new("resnet152", 0.78, Application::Image),
    ])
    .unwrap();
    Arc::new(Dispatcher::new(
        Arc::new(registry),
        SelectionEngine::default(),
        Arc::new(SimulatedExecutor::new(latency)),
        DispatcherConfig::default(),
    ))
}

fn by_name(name: &str) -> Arc<RequestContext> {
    Arc::new(RequestContext::new(
        Constraint::ByName(name.to_string()),
        Application::Image,
    ))
}

#[tokio::test]
async fn test_completed_context_timestamps_are_ordered() {
    let d = dispatcher(Duration::from_millis(3));
    let ctx = by_name("resnet18");
    let response = d
        .dispatch_context(&ctx, vec![1, 2], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(ctx.phase(), RequestPhase::Complete);
    let assignment = ctx.assignment().unwrap();
    let start = ctx.execution_start().unwrap();
    let end = ctx.execution_end().unwrap();
    assert!(ctx.entry() <= assignment);
    assert!(assignment <= start);
    assert!(start <= end);

    assert!(response.exec_delay >= 0.003);
    assert!(response.overall_latency >= response.exec_delay);
    let phases = response.placement_delay + response.queue_delay + response.exec_delay;
    assert!((response.overall_latency - phases).abs() < 1e-6);
    assert_eq!(ctx.assigned_model(), Some("resnet18"));
    assert!(ctx.response().is_some());
}

#[test]
fn test_execution_start_marked_once() {
    let ctx = by_name("resnet18");
    assert!(!ctx.mark_execution_start(), "unassigned context cannot start");

    assert!(ctx.mark_assigned("resnet18", false));
    assert!(ctx.mark_execution_start());
    let first = ctx.execution_start();
    assert!(!ctx.mark_execution_start());
    assert_eq!(ctx.execution_start(), first);
}

#[tokio::test]
async fn test_spawned_request_can_be_awaited_elsewhere() {
    let d = dispatcher(Duration::from_millis(5));
    let request = InferenceRequest::with_slo(SloKind::Latency, 10.0, Application::Image, vec![]);
    let (ctx, handle) = d.spawn(request).unwrap();

    let waiter = {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            ctx.wait_complete().await;
            ctx.phase()
        })
    };

    let response = handle.await.unwrap().unwrap();
    assert_eq!(waiter.await.unwrap(), RequestPhase::Complete);
    assert_eq!(response.request_id, ctx.id());
}

#[tokio::test]
async fn test_not_found_still_releases_waiters() {
    let d = dispatcher(Duration::ZERO);
    let request = InferenceRequest::with_slo(SloKind::Accuracy, 0.99, Application::Image, vec![]);
    let (ctx, handle) = d.spawn(request).unwrap();

    assert!(ctx.wait_complete_timeout(Duration::from_secs(2)).await);
    assert!(handle.await.unwrap().unwrap_err().is_not_found());
    assert!(ctx.failure().is_some());
    assert!(ctx.assignment().is_none());
}

#[tokio::test]
async fn test_cancellation_completes_with_failure() {
    let d = dispatcher(Duration::from_secs(30));
    let ctx = by_name("resnet152");
    let cancel = CancellationToken::new();

    let trigger = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        })
    };

    let err = d.dispatch_context(&ctx, vec![], &cancel).await.unwrap_err();
    trigger.await.unwrap();

    assert!(matches!(
        err,
        DispatchError::Execution { source: ExecutionError::Cancelled, .. }
    ));
    assert!(err.is_warning());
    assert!(ctx.is_complete());

    let v = d.registry().get("resnet152").unwrap();
    assert_eq!(v.failures(), 1);
    assert!(v.stats(ActionKind::Execute).is_empty());
    assert!(v.stats(ActionKind::ExecuteCold).is_empty());
}

#[tokio::test]
async fn test_dropped_dispatch_is_marked_abandoned() {
    let d = dispatcher(Duration::from_secs(30));
    let ctx = by_name("resnet18");

    let waiter = {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move { ctx.wait_complete().await })
    };

    let cancel = CancellationToken::new();
    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        d.dispatch_context(&ctx, vec![], &cancel),
    )
    .await;
    assert!(outcome.is_err(), "dispatch should still be in flight");

    tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("waiter released")
        .unwrap();
    assert!(ctx.is_complete());
    assert_eq!(ctx.failure(), Some(ExecutionError::Abandoned.to_string().as_str()));
    assert!(d
        .registry()
        .get("resnet18")
        .unwrap()
        .stats(ActionKind::Execute)
        .is_empty());
}

#[tokio::test]
async fn test_aborted_spawn_releases_waiters() {
    let d = dispatcher(Duration::from_secs(30));
    let request = InferenceRequest::for_model("resnet18", Application::Image, vec![]);
    let (ctx, handle) = d.spawn(request).unwrap();

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
    assert!(ctx.wait_complete_timeout(Duration::from_secs(2)).await);
    assert!(ctx.failure().is_some());
}

#[test]
fn test_contexts_order_by_entry() {
    let first = by_name("a");
    std::thread::sleep(Duration::from_millis(1));
    let second = by_name("b");
    assert!(first < second);
    assert!(first.id() < second.id());
}
