//! Per-request lifecycle record.
//!
//! A [`RequestContext`] moves through `Created -> Assigned -> Executing ->
//! Complete`. Every phase timestamp is write-once, so re-marking a phase is a
//! rejected no-op rather than an overwrite, and timestamps stay monotonic.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use super::selection::Constraint;
use crate::models::Application;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Kind of service-level objective attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SloKind {
    #[default]
    None,
    Accuracy,
    Latency,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("Request sets both a model name and an SLO")]
    AmbiguousTarget,

    #[error("Request sets neither a model name nor an SLO")]
    MissingTarget,

    #[error("SLO kind {0:?} requires a value")]
    MissingSloValue(SloKind),

    #[error("Invalid SLO value: {0}")]
    InvalidSloValue(f64),
}

/// Inbound selection request from the transport layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceRequest {
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub slo_kind: Option<SloKind>,
    #[serde(default)]
    pub slo_value: Option<f64>,
    #[serde(default)]
    pub application: Application,
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl InferenceRequest {
    pub fn for_model(name: impl Into<String>, application: Application, payload: Vec<u8>) -> Self {
        Self {
            model_name: Some(name.into()),
            application,
            payload,
            ..Self::default()
        }
    }

    pub fn with_slo(kind: SloKind, value: f64, application: Application, payload: Vec<u8>) -> Self {
        Self {
            slo_kind: Some(kind),
            slo_value: Some(value),
            application,
            payload,
            ..Self::default()
        }
    }

    /// Resolve the request target into a selection constraint.
    pub fn constraint(&self) -> Result<Constraint, RequestError> {
        let slo = self.slo_kind.filter(|k| *k != SloKind::None);

        match (&self.model_name, slo) {
            (Some(_), Some(_)) => Err(RequestError::AmbiguousTarget),
            (None, None) => Err(RequestError::MissingTarget),
            (Some(name), None) => Ok(Constraint::ByName(name.clone())),
            (None, Some(kind)) => {
                let value = self.slo_value.ok_or(RequestError::MissingSloValue(kind))?;
                if !value.is_finite() {
                    return Err(RequestError::InvalidSloValue(value));
                }
                Ok(match kind {
                    SloKind::Accuracy => Constraint::ByMinAccuracy(value),
                    _ => Constraint::ByMaxLatency(value),
                })
            }
        }
    }
}

/// Lifecycle phase, derived from which timestamps are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestPhase {
    Created,
    Assigned,
    Executing,
    Complete,
}

/// Lifecycle record for one inference request.
pub struct RequestContext {
    id: u64,
    constraint: Constraint,
    application: Application,
    entry: Instant,
    received_at: DateTime<Utc>,
    assignment: OnceLock<Instant>,
    execution_start: OnceLock<Instant>,
    execution_end: OnceLock<Instant>,
    model: OnceLock<String>,
    model_miss: AtomicBool,
    dispatched: AtomicBool,
    response: OnceLock<Vec<u8>>,
    failure: OnceLock<String>,
    completion: watch::Sender<bool>,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.id)
            .field("constraint", &self.constraint)
            .field("phase", &self.phase())
            .field("model", &self.model.get())
            .field("model_miss", &self.model_miss())
            .finish()
    }
}

impl RequestContext {
    /// Create a context stamped with the current time and a fresh id.
    pub fn new(constraint: Constraint, application: Application) -> Self {
        let (completion, _) = watch::channel(false);
        Self {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::SeqCst),
            constraint,
            application,
            entry: Instant::now(),
            received_at: Utc::now(),
            assignment: OnceLock::new(),
            execution_start: OnceLock::new(),
            execution_end: OnceLock::new(),
            model: OnceLock::new(),
            model_miss: AtomicBool::new(false),
            dispatched: AtomicBool::new(false),
            response: OnceLock::new(),
            failure: OnceLock::new(),
            completion,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    pub fn application(&self) -> Application {
        self.application
    }

    /// Explicitly requested model, if the request targeted one by name.
    pub fn model_name(&self) -> Option<&str> {
        match &self.constraint {
            Constraint::ByName(name) => Some(name),
            _ => None,
        }
    }

    pub fn slo_kind(&self) -> SloKind {
        match self.constraint {
            Constraint::ByName(_) => SloKind::None,
            Constraint::ByMinAccuracy(_) => SloKind::Accuracy,
            Constraint::ByMaxLatency(_) => SloKind::Latency,
        }
    }

    /// SLO threshold; meaningful only when `slo_kind` is not `None`.
    pub fn slo_value(&self) -> Option<f64> {
        match self.constraint {
            Constraint::ByName(_) => None,
            Constraint::ByMinAccuracy(v) | Constraint::ByMaxLatency(v) => Some(v),
        }
    }

    /// Variant the request was assigned to.
    pub fn assigned_model(&self) -> Option<&str> {
        self.model.get().map(String::as_str)
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn entry(&self) -> Instant {
        self.entry
    }

    pub fn assignment(&self) -> Option<Instant> {
        self.assignment.get().copied()
    }

    pub fn execution_start(&self) -> Option<Instant> {
        self.execution_start.get().copied()
    }

    pub fn execution_end(&self) -> Option<Instant> {
        self.execution_end.get().copied()
    }

    pub fn model_miss(&self) -> bool {
        self.model_miss.load(Ordering::Acquire)
    }

    pub fn mark_model_miss(&self) {
        self.model_miss.store(true, Ordering::Release);
    }

    pub fn phase(&self) -> RequestPhase {
        if self.execution_end.get().is_some() {
            RequestPhase::Complete
        } else if self.execution_start.get().is_some() {
            RequestPhase::Executing
        } else if self.assignment.get().is_some() {
            RequestPhase::Assigned
        } else {
            RequestPhase::Created
        }
    }

    /// Claim the right to dispatch this context. Only the first caller wins.
    pub fn claim_dispatch(&self) -> bool {
        self.dispatched
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `Created -> Assigned`. Returns false if already assigned or complete.
    pub fn mark_assigned(&self, model: &str, miss: bool) -> bool {
        if self.is_complete() || self.model.set(model.to_string()).is_err() {
            return false;
        }
        if miss {
            self.mark_model_miss();
        }
        self.assignment.set(Instant::now()).is_ok()
    }

    /// `Assigned -> Executing`.
    ///
    /// Returns false, recording nothing, if execution already started, the
    /// request is not yet assigned, or it is already complete.
    pub fn mark_execution_start(&self) -> bool {
        if self.assignment.get().is_none() || self.is_complete() {
            return false;
        }
        self.execution_start.set(Instant::now()).is_ok()
    }

    pub fn is_started(&self) -> bool {
        self.execution_start.get().is_some()
    }

    /// Store the result payload. Only the first call has any effect.
    pub fn set_response(&self, payload: Vec<u8>) -> bool {
        self.response.set(payload).is_ok()
    }

    /// Store a failure description. Only the first call has any effect.
    pub fn set_failure(&self, reason: impl Into<String>) -> bool {
        self.failure.set(reason.into()).is_ok()
    }

    pub fn response(&self) -> Option<&[u8]> {
        self.response.get().map(Vec::as_slice)
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.get().map(String::as_str)
    }

    /// Enter `Complete` and fire the completion signal. Returns false if the
    /// request was already complete.
    pub fn mark_execution_end(&self) -> bool {
        if self.execution_end.set(Instant::now()).is_err() {
            return false;
        }
        self.completion.send_replace(true);
        true
    }

    pub fn is_complete(&self) -> bool {
        self.execution_end.get().is_some()
    }

    /// Wait until the completion signal fires.
    pub async fn wait_complete(&self) {
        let mut rx = self.completion.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Wait for completion, giving up after `timeout`. Returns true if complete.
    pub async fn wait_complete_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_complete())
            .await
            .is_ok()
    }

    /// `assignment - entry`.
    pub fn placement_delay(&self) -> Option<Duration> {
        Some(self.assignment()?.saturating_duration_since(self.entry))
    }

    /// `execution_start - assignment`.
    pub fn queue_delay(&self) -> Option<Duration> {
        Some(self.execution_start()?.saturating_duration_since(self.assignment()?))
    }

    /// `execution_end - execution_start`.
    pub fn exec_delay(&self) -> Option<Duration> {
        Some(self.execution_end()?.saturating_duration_since(self.execution_start()?))
    }

    /// `execution_end - entry`.
    pub fn overall_latency(&self) -> Option<Duration> {
        Some(self.execution_end()?.saturating_duration_since(self.entry))
    }
}

impl PartialEq for RequestContext {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for RequestContext {}

impl PartialOrd for RequestContext {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// Ordered by entry time; ids break ties.
impl Ord for RequestContext {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.entry
            .cmp(&other.entry)
            .then_with(|| self.id.cmp(&other.id))
    }
}
