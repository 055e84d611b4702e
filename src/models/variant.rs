//! Model variant: one deployed model with a fixed accuracy and live latency statistics.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::stats::{LatencyStats, StatsSummary};

/// Application family a variant serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Application {
    #[default]
    Image,
    Text,
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Text => f.write_str("text"),
        }
    }
}

impl FromStr for Application {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown application type: {other}")),
        }
    }
}

/// Kind of timed action recorded against a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Load,
    Unload,
    Execute,
    ExecuteCold,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Load,
        ActionKind::Unload,
        ActionKind::Execute,
        ActionKind::ExecuteCold,
    ];

    fn index(self) -> usize {
        match self {
            Self::Load => 0,
            Self::Unload => 1,
            Self::Execute => 2,
            Self::ExecuteCold => 3,
        }
    }
}

/// Whether a successful execution was the first since load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionClass {
    Cold,
    Warm,
}

impl ExecutionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Warm => "warm",
        }
    }
}

/// A named, servable model variant.
///
/// Accuracy and shape metadata are fixed at construction. Latency statistics
/// are interior-mutable so a shared `Arc<ModelVariant>` can be recorded into
/// from many in-flight requests. They only ever hold observed actions;
/// offline-profiled latencies are kept apart and stand in for a series
/// until it has its first sample.
#[derive(Debug)]
pub struct ModelVariant {
    name: String,
    accuracy: f64,
    application: Application,
    dimensions: Vec<u32>,
    endpoint: Option<String>,
    profiled_warm: Option<f64>,
    profiled_cold: Option<f64>,
    loaded: AtomicBool,
    failures: AtomicU64,
    measurements: [LatencyStats; 4],
}

impl ModelVariant {
    pub fn new(name: impl Into<String>, accuracy: f64, application: Application) -> Self {
        Self {
            name: name.into(),
            accuracy,
            application,
            dimensions: Vec::new(),
            endpoint: None,
            profiled_warm: None,
            profiled_cold: None,
            loaded: AtomicBool::new(false),
            failures: AtomicU64::new(0),
            measurements: Default::default(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: Vec<u32>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Attach offline-profiled warm and cold latencies, in seconds.
    /// Non-finite or negative values are dropped.
    pub fn with_profiled_latency(mut self, warm: Option<f64>, cold: Option<f64>) -> Self {
        let valid = |secs: Option<f64>| secs.filter(|s| s.is_finite() && *s >= 0.0);
        self.profiled_warm = valid(warm);
        self.profiled_cold = valid(cold);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn application(&self) -> Application {
        self.application
    }

    pub fn dimensions(&self) -> &[u32] {
        &self.dimensions
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// True once a successful execution has happened since the last unload.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn stats(&self, kind: ActionKind) -> &LatencyStats {
        &self.measurements[kind.index()]
    }

    pub fn profiled_latency(&self) -> Option<f64> {
        self.profiled_warm
    }

    pub fn profiled_cold_latency(&self) -> Option<f64> {
        self.profiled_cold
    }

    /// Mean warm execution latency in seconds, or the profiled value while
    /// no warm execution has been observed.
    pub fn exec_latency(&self) -> f64 {
        self.mean_or_profiled(ActionKind::Execute, self.profiled_warm)
    }

    /// Mean cold execution latency in seconds, or the profiled value while
    /// no cold execution has been observed.
    pub fn cold_latency(&self) -> f64 {
        self.mean_or_profiled(ActionKind::ExecuteCold, self.profiled_cold)
    }

    fn mean_or_profiled(&self, kind: ActionKind, profiled: Option<f64>) -> f64 {
        let summary = self.stats(kind).summary();
        if summary.count == 0 {
            profiled.unwrap_or(0.0)
        } else {
            summary.mean
        }
    }

    pub fn load_latency(&self) -> f64 {
        self.stats(ActionKind::Load).mean()
    }

    pub fn unload_latency(&self) -> f64 {
        self.stats(ActionKind::Unload).mean()
    }

    /// Expected latency of the next request, including the cold-start
    /// penalty when the variant is not loaded.
    pub fn effective_latency(&self) -> f64 {
        if self.is_loaded() {
            self.exec_latency()
        } else {
            self.exec_latency() + self.cold_latency()
        }
    }

    /// Record a successful execution.
    ///
    /// Exactly one caller observes the not-loaded to loaded transition; that
    /// sample goes to `ExecuteCold`, every other to `Execute`.
    pub fn record_execution(&self, elapsed: Duration) -> ExecutionClass {
        let was_cold = self
            .loaded
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if was_cold {
            self.stats(ActionKind::ExecuteCold).record(elapsed);
            ExecutionClass::Cold
        } else {
            self.stats(ActionKind::Execute).record(elapsed);
            ExecutionClass::Warm
        }
    }

    /// Count a failed execution. Latency statistics are left untouched.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn record_load(&self, elapsed: Duration) {
        self.stats(ActionKind::Load).record(elapsed);
    }

    /// Record an unload: the next successful execution is classified cold.
    /// With `reset_execution_stats`, execution history is discarded as well.
    pub fn record_unload(&self, elapsed: Duration, reset_execution_stats: bool) {
        self.stats(ActionKind::Unload).record(elapsed);
        if reset_execution_stats {
            self.stats(ActionKind::Execute).reset();
            self.stats(ActionKind::ExecuteCold).reset();
        }
        self.loaded.store(false, Ordering::Release);
    }

    /// Serializable snapshot.
    pub fn info(&self, active: bool) -> VariantInfo {
        let stats = |kind| self.stats(kind).summary();
        VariantInfo {
            name: self.name.clone(),
            application: self.application,
            accuracy: self.accuracy,
            dimensions: self.dimensions.clone(),
            endpoint: self.endpoint.clone(),
            loaded: self.is_loaded(),
            active,
            exec_latency: self.exec_latency(),
            cold_latency: self.cold_latency(),
            effective_latency: self.effective_latency(),
            load: stats(ActionKind::Load),
            unload: stats(ActionKind::Unload),
            execute: stats(ActionKind::Execute),
            execute_cold: stats(ActionKind::ExecuteCold),
            failures: self.failures(),
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}, {} {:0.3}s ({:0.3})>",
            self.name,
            self.accuracy,
            self.exec_latency(),
            self.load_latency()
        )
    }
}

/// Snapshot of a variant for listing and observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantInfo {
    pub name: String,
    pub application: Application,
    pub accuracy: f64,
    pub dimensions: Vec<u32>,
    pub endpoint: Option<String>,
    pub loaded: bool,
    pub active: bool,
    pub exec_latency: f64,
    pub cold_latency: f64,
    pub effective_latency: f64,
    pub load: StatsSummary,
    pub unload: StatsSummary,
    pub execute: StatsSummary,
    pub execute_cold: StatsSummary,
    pub failures: u64,
}
