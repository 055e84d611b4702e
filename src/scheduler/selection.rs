//! SLO-driven variant selection.
//!
//! Active (proven-warm) variants are searched first. When none satisfies the
//! constraint the full catalog is searched and the result is flagged as a
//! fallback, which the dispatcher surfaces as a model miss. Ties are always
//! broken by the lexicographically smallest variant name, so for a fixed
//! registry state `select` is a pure function of its inputs.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ModelVariant, VariantRegistry};

/// Accuracy floor applied when a latency SLO falls back to the full catalog.
pub const DEFAULT_ACCURACY_FLOOR: f64 = 0.5;

/// What a request asks of the variant that serves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Exact variant name; no SLO reasoning.
    ByName(String),
    /// Minimum accuracy in [0, 1].
    ByMinAccuracy(f64),
    /// Maximum expected latency in seconds.
    ByMaxLatency(f64),
}

impl Constraint {
    /// Short stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ByName(_) => "name",
            Self::ByMinAccuracy(_) => "min_accuracy",
            Self::ByMaxLatency(_) => "max_latency",
        }
    }

    fn validate(&self) -> Result<(), SelectionError> {
        match self {
            Self::ByName(name) if name.is_empty() => {
                Err(SelectionError::InvalidConstraint("empty model name".to_string()))
            }
            Self::ByMinAccuracy(t) | Self::ByMaxLatency(t) if t.is_nan() => Err(
                SelectionError::InvalidConstraint(format!("{} threshold is NaN", self.kind())),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByName(name) => write!(f, "name={name}"),
            Self::ByMinAccuracy(t) => write!(f, "accuracy>={t}"),
            Self::ByMaxLatency(t) => write!(f, "latency<={t}s"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("Model not found: {0}")]
    UnknownModel(String),

    #[error("No model satisfies minimum accuracy {0}")]
    NoModelForAccuracy(f64),

    #[error("No model satisfies maximum latency {0}s")]
    NoModelForLatency(f64),

    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),
}

impl SelectionError {
    /// True when the catalog holds no variant that could serve the request.
    pub fn is_not_found(&self) -> bool {
        !matches!(self, Self::InvalidConstraint(_))
    }
}

/// Outcome of a successful selection.
#[derive(Debug, Clone)]
pub struct Selection {
    pub variant: Arc<ModelVariant>,
    /// True when no active variant qualified and the catalog was searched.
    pub fallback: bool,
}

/// A variant with its effective latency captured once, so ordering is
/// computed against a consistent snapshot.
struct Candidate {
    variant: Arc<ModelVariant>,
    latency: f64,
}

impl Candidate {
    fn snapshot(variants: Vec<Arc<ModelVariant>>) -> Vec<Candidate> {
        variants
            .into_iter()
            .map(|variant| Candidate {
                latency: variant.effective_latency(),
                variant,
            })
            .collect()
    }

    fn by_name(&self, other: &Self) -> Ordering {
        self.variant.name().cmp(other.variant.name())
    }
}

fn fastest(candidates: impl Iterator<Item = Candidate>) -> Option<Candidate> {
    candidates.min_by(|a, b| a.latency.total_cmp(&b.latency).then_with(|| a.by_name(b)))
}

fn most_accurate(candidates: impl Iterator<Item = Candidate>) -> Option<Candidate> {
    candidates.min_by(|a, b| {
        b.variant
            .accuracy()
            .total_cmp(&a.variant.accuracy())
            .then_with(|| a.by_name(b))
    })
}

/// Maps a [`Constraint`] to a variant of a [`VariantRegistry`].
#[derive(Debug, Clone)]
pub struct SelectionEngine {
    accuracy_floor: f64,
}

impl SelectionEngine {
    pub fn new(accuracy_floor: f64) -> Self {
        Self { accuracy_floor }
    }

    pub fn accuracy_floor(&self) -> f64 {
        self.accuracy_floor
    }

    /// Choose a variant for `constraint` and promote it to the active set.
    pub fn select(
        &self,
        constraint: &Constraint,
        registry: &VariantRegistry,
    ) -> Result<Selection, SelectionError> {
        constraint.validate()?;

        let selection = match constraint {
            Constraint::ByName(name) => registry
                .get(name)
                .map(|variant| Selection { variant, fallback: false })
                .ok_or_else(|| SelectionError::UnknownModel(name.clone()))?,
            Constraint::ByMinAccuracy(threshold) => self.by_min_accuracy(*threshold, registry)?,
            Constraint::ByMaxLatency(threshold) => self.by_max_latency(*threshold, registry)?,
        };

        registry.promote(selection.variant.name());
        tracing::debug!(
            constraint = %constraint,
            variant = %selection.variant.name(),
            fallback = selection.fallback,
            "selected variant"
        );
        Ok(selection)
    }

    fn by_min_accuracy(
        &self,
        threshold: f64,
        registry: &VariantRegistry,
    ) -> Result<Selection, SelectionError> {
        let qualifies = |c: &Candidate| c.variant.accuracy() >= threshold;

        let active = Candidate::snapshot(registry.active_variants());
        if let Some(c) = fastest(active.into_iter().filter(qualifies)) {
            return Ok(Selection { variant: c.variant, fallback: false });
        }

        let all = Candidate::snapshot(registry.all_variants());
        fastest(all.into_iter().filter(qualifies))
            .map(|c| Selection { variant: c.variant, fallback: true })
            .ok_or(SelectionError::NoModelForAccuracy(threshold))
    }

    /// Most accurate active variant within `threshold`; otherwise the fastest
    /// known variant at or above the accuracy floor that is also within
    /// `threshold`. A variant over the bound is never returned, even when
    /// that leaves the request unserved.
    fn by_max_latency(
        &self,
        threshold: f64,
        registry: &VariantRegistry,
    ) -> Result<Selection, SelectionError> {
        let active = Candidate::snapshot(registry.active_variants());
        if let Some(c) = most_accurate(active.into_iter().filter(|c| c.latency <= threshold)) {
            return Ok(Selection { variant: c.variant, fallback: false });
        }

        let floor = self.accuracy_floor;
        let all = Candidate::snapshot(registry.all_variants());
        fastest(
            all.into_iter()
                .filter(|c| c.variant.accuracy() >= floor && c.latency <= threshold),
        )
        .map(|c| Selection { variant: c.variant, fallback: true })
        .ok_or(SelectionError::NoModelForLatency(threshold))
    }
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ACCURACY_FLOOR)
    }
}
