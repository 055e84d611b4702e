//! Registry of known model variants and the active (proven-warm) subset.

use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use thiserror::Error;

use super::catalog::VariantDescriptor;
use super::variant::{Application, ModelVariant, VariantInfo};

#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("Variant already registered: {0}")]
    DuplicateVariant(String),

    #[error("Variant name must not be empty")]
    EmptyName,

    #[error("Invalid accuracy {accuracy} for variant {name}: must be within [0, 1]")]
    InvalidAccuracy { name: String, accuracy: f64 },

    #[error("Unknown variant: {0}")]
    UnknownVariant(String),
}

/// What an unload does to the execution history of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnloadPolicy {
    /// Keep latency history; only the loaded flag is cleared.
    #[default]
    KeepHistory,
    /// Discard execute and cold-execute statistics.
    ResetStats,
}

/// Thread-safe registry of model variants.
///
/// `all` only grows. `active` is always a subset of `all`; promotion is an
/// idempotent set insert and never takes a registry-wide lock.
pub struct VariantRegistry {
    all: DashMap<String, Arc<ModelVariant>>,
    active: DashSet<String>,
}

impl VariantRegistry {
    pub fn new() -> Self {
        Self {
            all: DashMap::new(),
            active: DashSet::new(),
        }
    }

    /// Build a registry from variants, rejecting duplicates.
    pub fn from_variants(
        variants: impl IntoIterator<Item = ModelVariant>,
    ) -> Result<Self, RegistryError> {
        let registry = Self::new();
        for variant in variants {
            registry.register(variant)?;
        }
        Ok(registry)
    }

    /// Build a registry from catalog descriptors. Profiled latencies become
    /// each variant's prior, not recorded observations.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = VariantDescriptor>,
    ) -> Result<Self, RegistryError> {
        Self::from_variants(descriptors.into_iter().map(VariantDescriptor::into_variant))
    }

    /// Register a new variant and return the shared handle.
    pub fn register(&self, variant: ModelVariant) -> Result<Arc<ModelVariant>, RegistryError> {
        if variant.name().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let accuracy = variant.accuracy();
        if !(0.0..=1.0).contains(&accuracy) {
            return Err(RegistryError::InvalidAccuracy {
                name: variant.name().to_string(),
                accuracy,
            });
        }

        match self.all.entry(variant.name().to_string()) {
            dashmap::mapref::entry::Entry::Occupied(e) => {
                Err(RegistryError::DuplicateVariant(e.key().clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(e) => {
                let variant = Arc::new(variant);
                e.insert(Arc::clone(&variant));
                tracing::debug!(variant = %variant.name(), "registered variant");
                Ok(variant)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelVariant>> {
        self.all.get(name).map(|v| Arc::clone(v.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.all.contains_key(name)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.contains(name)
    }

    /// Add a known variant to the active set.
    ///
    /// Returns true only on the first promotion; unknown names are ignored.
    pub fn promote(&self, name: &str) -> bool {
        if !self.all.contains_key(name) {
            return false;
        }
        let inserted = self.active.insert(name.to_string());
        if inserted {
            tracing::info!(variant = %name, "promoted variant to active set");
        }
        inserted
    }

    /// Promote every known variant.
    pub fn promote_all(&self) {
        for entry in self.all.iter() {
            self.active.insert(entry.key().clone());
        }
    }

    /// Every known variant, sorted by name.
    pub fn all_variants(&self) -> Vec<Arc<ModelVariant>> {
        let mut variants: Vec<_> = self.all.iter().map(|e| Arc::clone(e.value())).collect();
        variants.sort_by(|a, b| a.name().cmp(b.name()));
        variants
    }

    /// Active variants, sorted by name.
    pub fn active_variants(&self) -> Vec<Arc<ModelVariant>> {
        let mut variants: Vec<_> = self
            .active
            .iter()
            .filter_map(|name| self.get(name.key()))
            .collect();
        variants.sort_by(|a, b| a.name().cmp(b.name()));
        variants
    }

    /// Number of known variants.
    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Record an unload of `name`: clears its loaded flag and demotes it.
    pub fn unload(
        &self,
        name: &str,
        elapsed: Duration,
        policy: UnloadPolicy,
    ) -> Result<(), RegistryError> {
        let variant = self
            .get(name)
            .ok_or_else(|| RegistryError::UnknownVariant(name.to_string()))?;
        variant.record_unload(elapsed, policy == UnloadPolicy::ResetStats);
        self.active.remove(name);
        tracing::info!(variant = %name, ?policy, "unloaded variant");
        Ok(())
    }

    /// Variants of `application` meeting both bounds, sorted by name.
    pub fn matching(
        &self,
        application: Application,
        min_accuracy: f64,
        max_latency: f64,
    ) -> Vec<VariantInfo> {
        self.all_variants()
            .into_iter()
            .filter(|v| v.application() == application)
            .filter(|v| v.accuracy() >= min_accuracy && v.effective_latency() <= max_latency)
            .map(|v| v.info(self.is_active(v.name())))
            .collect()
    }

    /// Snapshot of every variant, sorted by name.
    pub fn infos(&self) -> Vec<VariantInfo> {
        self.all_variants()
            .into_iter()
            .map(|v| v.info(self.is_active(v.name())))
            .collect()
    }
}

impl Default for VariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}
