//! End-to-end dispatch of one inference request.
//!
//! Each request independently selects a variant, executes it through the
//! [`Executor`] and records the outcome. There is no shared queue: the only
//! shared state touched is the registry's active set and the chosen
//! variant's own statistics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::profile::Profiler;
use super::request::{InferenceRequest, RequestContext, RequestError, RequestPhase};
use super::selection::{SelectionEngine, SelectionError};
use crate::engine::{ExecutionError, ExecutionInput, Executor};
use crate::models::{ExecutionClass, ModelVariant, VariantRegistry};
use crate::telemetry::{self, RequestSpan, SpanExt};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    #[error("No suitable model: {0}")]
    NotFound(SelectionError),

    #[error("Request {0} was already dispatched")]
    DuplicateDispatch(u64),

    #[error("Execution failed on {model}: {source}")]
    Execution {
        model: String,
        #[source]
        source: ExecutionError,
    },
}

impl DispatchError {
    fn from_selection(err: SelectionError) -> Self {
        match err {
            SelectionError::InvalidConstraint(reason) => Self::InvalidConstraint(reason),
            other => Self::NotFound(other),
        }
    }

    /// No variant could serve the request.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// A variant was chosen but failed to run.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }

    /// Returns true if this error should be logged as a warning.
    pub fn is_warning(&self) -> bool {
        match self {
            Self::DuplicateDispatch(_) => true,
            Self::Execution { source, .. } => source.is_warning(),
            _ => false,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidConstraint(_) => "invalid_constraint",
            Self::NotFound(_) => "not_found",
            Self::DuplicateDispatch(_) => "duplicate_dispatch",
            Self::Execution { source, .. } => source.kind(),
        }
    }
}

/// Response payload handed back to the transport layer.
///
/// Delays are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub request_id: u64,
    pub model: String,
    pub response: Vec<u8>,
    pub placement_delay: f64,
    pub queue_delay: f64,
    pub exec_delay: f64,
    pub overall_latency: f64,
    pub model_miss: bool,
    pub accuracy: f64,
    pub cold: bool,
    pub completed_at: DateTime<Utc>,
}

impl DispatchResponse {
    fn from_context(
        ctx: &RequestContext,
        variant: &ModelVariant,
        class: ExecutionClass,
        response: Vec<u8>,
    ) -> Self {
        let secs = |d: Option<Duration>| d.unwrap_or_default().as_secs_f64();
        Self {
            request_id: ctx.id(),
            model: variant.name().to_string(),
            response,
            placement_delay: secs(ctx.placement_delay()),
            queue_delay: secs(ctx.queue_delay()),
            exec_delay: secs(ctx.exec_delay()),
            overall_latency: secs(ctx.overall_latency()),
            model_miss: ctx.model_miss(),
            accuracy: variant.accuracy(),
            cold: class == ExecutionClass::Cold,
            completed_at: Utc::now(),
        }
    }
}

/// Dispatcher tuning.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Upper bound on a single executor call. `None` waits indefinitely.
    pub execution_timeout: Option<Duration>,
}

/// Resolves a context left unfinished when its dispatch future is dropped,
/// so waiters on the completion signal are always released.
struct CompletionGuard {
    ctx: Arc<RequestContext>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.ctx.is_complete() {
            return;
        }
        self.ctx.set_failure(ExecutionError::Abandoned.to_string());
        self.ctx.mark_execution_end();
        tracing::warn!(request_id = self.ctx.id(), "request abandoned before completion");
    }
}

/// Orchestrates select -> assign -> execute -> record for each request.
pub struct Dispatcher {
    registry: Arc<VariantRegistry>,
    engine: SelectionEngine,
    executor: Arc<dyn Executor>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<VariantRegistry>,
        engine: SelectionEngine,
        executor: Arc<dyn Executor>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            engine,
            executor,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<VariantRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &SelectionEngine {
        &self.engine
    }

    /// Warm-up profiler sharing this dispatcher's registry and executor.
    pub fn profiler(&self) -> Profiler {
        Profiler::new(Arc::clone(&self.registry), Arc::clone(&self.executor))
    }

    /// Dispatch one request to completion.
    pub async fn dispatch(
        &self,
        request: InferenceRequest,
    ) -> Result<DispatchResponse, DispatchError> {
        self.dispatch_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Dispatch one request; cancelling `cancel` aborts the executor call.
    pub async fn dispatch_with_cancel(
        &self,
        request: InferenceRequest,
        cancel: &CancellationToken,
    ) -> Result<DispatchResponse, DispatchError> {
        let constraint = request.constraint()?;
        let ctx = Arc::new(RequestContext::new(constraint, request.application));
        self.dispatch_context(&ctx, request.payload, cancel).await
    }

    /// Dispatch a caller-created context.
    ///
    /// A context can be dispatched once; later calls return
    /// [`DispatchError::DuplicateDispatch`] and leave the context untouched.
    pub async fn dispatch_context(
        &self,
        ctx: &Arc<RequestContext>,
        payload: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<DispatchResponse, DispatchError> {
        if ctx.phase() != RequestPhase::Created || !ctx.claim_dispatch() {
            tracing::warn!(request_id = ctx.id(), "duplicate dispatch rejected");
            telemetry::record_request_failure("duplicate_dispatch");
            return Err(DispatchError::DuplicateDispatch(ctx.id()));
        }

        let span = RequestSpan::new(ctx.id(), &ctx.constraint().to_string());
        let result = self
            .run(ctx, payload, cancel)
            .instrument(span.clone())
            .await;
        span.record_result(&result);

        if let Err(e) = &result {
            telemetry::record_request_failure(e.kind());
            if e.is_warning() {
                tracing::warn!(request_id = ctx.id(), error = %e, "dispatch failed");
            } else if e.is_execution_failure() {
                tracing::error!(request_id = ctx.id(), error = %e, "dispatch failed");
            }
        }
        result
    }

    /// Dispatch on a new task. The returned context can be awaited with
    /// [`RequestContext::wait_complete`] from anywhere.
    pub fn spawn(
        self: &Arc<Self>,
        request: InferenceRequest,
    ) -> Result<
        (
            Arc<RequestContext>,
            JoinHandle<Result<DispatchResponse, DispatchError>>,
        ),
        DispatchError,
    > {
        let constraint = request.constraint()?;
        let ctx = Arc::new(RequestContext::new(constraint, request.application));

        let dispatcher = Arc::clone(self);
        let task_ctx = Arc::clone(&ctx);
        // Resolves the context even if the task is aborted before its first poll.
        let guard = CompletionGuard {
            ctx: Arc::clone(&ctx),
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            dispatcher
                .dispatch_context(&task_ctx, request.payload, &CancellationToken::new())
                .await
        });
        Ok((ctx, handle))
    }

    /// Dispatch independent requests concurrently; results keep input order.
    pub async fn dispatch_all(
        &self,
        requests: Vec<InferenceRequest>,
    ) -> Vec<Result<DispatchResponse, DispatchError>> {
        join_all(requests.into_iter().map(|r| self.dispatch(r))).await
    }

    async fn run(
        &self,
        ctx: &Arc<RequestContext>,
        payload: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<DispatchResponse, DispatchError> {
        let _guard = CompletionGuard { ctx: Arc::clone(ctx) };
        let kind = ctx.constraint().kind();

        let selection = match self.engine.select(ctx.constraint(), &self.registry) {
            Ok(selection) => selection,
            Err(e) => {
                telemetry::record_selection(kind, false);
                tracing::info!(error = %e, "selection failed");
                ctx.set_failure(e.to_string());
                ctx.mark_execution_end();
                return Err(DispatchError::from_selection(e));
            }
        };
        telemetry::record_selection(kind, true);

        let variant = selection.variant;
        ctx.mark_assigned(variant.name(), selection.fallback);
        let span = tracing::Span::current();
        span.record("model", variant.name());
        span.record("model_miss", selection.fallback);
        if selection.fallback {
            telemetry::record_model_miss(variant.name());
        }

        if !ctx.mark_execution_start() {
            return Err(DispatchError::DuplicateDispatch(ctx.id()));
        }

        let input = ExecutionInput::new(ctx.application(), payload);
        let started = Instant::now();
        let result = self.execute(&variant, &input, cancel).await;
        let elapsed = started.elapsed();

        match result {
            Ok(output) => {
                let class = variant.record_execution(elapsed);
                telemetry::record_execution(variant.name(), class, elapsed);
                ctx.set_response(output.clone());
                ctx.mark_execution_end();

                let response = DispatchResponse::from_context(ctx, &variant, class, output);
                span.record("latency_ms", (response.overall_latency * 1000.0) as u64);
                telemetry::record_request_success(variant.name(), response.overall_latency);
                tracing::debug!(class = class.as_str(), "request complete");
                Ok(response)
            }
            Err(e) => {
                variant.record_failure();
                ctx.set_failure(e.to_string());
                ctx.mark_execution_end();
                Err(DispatchError::Execution {
                    model: variant.name().to_string(),
                    source: e,
                })
            }
        }
    }

    async fn execute(
        &self,
        variant: &ModelVariant,
        input: &ExecutionInput,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ExecutionError> {
        let call = self.executor.execute(variant, input);
        let bounded = async {
            match self.config.execution_timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or_else(|_| Err(ExecutionError::Timeout(limit.as_millis() as u64))),
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ExecutionError::Cancelled),
            result = bounded => result,
        }
    }
}
