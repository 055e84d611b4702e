//! Variant catalogs: the startup source of known model variants.
//!
//! Two on-disk formats are understood:
//! - a TOML manifest with one `[[variant]]` table per variant,
//! - JSON lines, one descriptor per line (the persisted deployment record).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::stats::LatencyStats;
use super::variant::{ActionKind, Application, ModelVariant};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML catalog: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid catalog entry on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize catalog entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Static description of a deployable variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantDescriptor {
    pub name: String,
    pub accuracy: f64,
    #[serde(default)]
    pub application: Application,
    #[serde(default)]
    pub dimensions: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Offline-profiled warm latency in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiled_latency: Option<f64>,
    /// Offline-profiled cold latency in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiled_cold_latency: Option<f64>,
}

impl VariantDescriptor {
    pub fn new(name: impl Into<String>, accuracy: f64, application: Application) -> Self {
        Self {
            name: name.into(),
            accuracy,
            application,
            dimensions: Vec::new(),
            endpoint: None,
            profiled_latency: None,
            profiled_cold_latency: None,
        }
    }

    pub fn with_profiled_latency(mut self, warm: f64, cold: Option<f64>) -> Self {
        self.profiled_latency = Some(warm);
        self.profiled_cold_latency = cold;
        self
    }

    /// Describe a live variant, carrying its measured latencies forward.
    /// Series with no observations keep the variant's profiled value.
    pub fn from_variant(variant: &ModelVariant) -> Self {
        let measured = |stats: &LatencyStats| (!stats.is_empty()).then(|| stats.mean());
        Self {
            name: variant.name().to_string(),
            accuracy: variant.accuracy(),
            application: variant.application(),
            dimensions: variant.dimensions().to_vec(),
            endpoint: variant.endpoint().map(str::to_string),
            profiled_latency: measured(variant.stats(ActionKind::Execute))
                .or(variant.profiled_latency()),
            profiled_cold_latency: measured(variant.stats(ActionKind::ExecuteCold))
                .or(variant.profiled_cold_latency()),
        }
    }

    pub(crate) fn into_variant(self) -> ModelVariant {
        let variant = ModelVariant::new(self.name, self.accuracy, self.application)
            .with_dimensions(self.dimensions)
            .with_profiled_latency(self.profiled_latency, self.profiled_cold_latency);
        match self.endpoint {
            Some(endpoint) => variant.with_endpoint(endpoint),
            None => variant,
        }
    }
}

/// Source of the variants known at startup.
pub trait VariantCatalog: Send + Sync {
    fn list_known_variants(&self) -> Result<Vec<VariantDescriptor>, CatalogError>;
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    variants: Vec<VariantDescriptor>,
}

impl StaticCatalog {
    pub fn new(variants: Vec<VariantDescriptor>) -> Self {
        Self { variants }
    }
}

impl VariantCatalog for StaticCatalog {
    fn list_known_variants(&self) -> Result<Vec<VariantDescriptor>, CatalogError> {
        Ok(self.variants.clone())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogManifest {
    #[serde(default, rename = "variant")]
    variants: Vec<VariantDescriptor>,
}

/// Catalog backed by a file; `.toml` is a manifest, anything else JSON lines.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_toml(&self) -> bool {
        self.path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"))
    }

    /// Persist descriptors as JSON lines, sorted by name.
    pub fn write_json_lines(
        path: impl AsRef<Path>,
        descriptors: &[VariantDescriptor],
    ) -> Result<(), CatalogError> {
        let path = path.as_ref();
        let mut sorted: Vec<&VariantDescriptor> = descriptors.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = String::new();
        for descriptor in sorted {
            out.push_str(&serde_json::to_string(descriptor)?);
            out.push('\n');
        }

        std::fs::write(path, out).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl VariantCatalog for FileCatalog {
    fn list_known_variants(&self) -> Result<Vec<VariantDescriptor>, CatalogError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|source| CatalogError::Io {
            path: self.path.clone(),
            source,
        })?;

        if self.is_toml() {
            let manifest: CatalogManifest = toml::from_str(&contents)?;
            return Ok(manifest.variants);
        }

        parse_json_lines(&contents)
    }
}

fn parse_json_lines(contents: &str) -> Result<Vec<VariantDescriptor>, CatalogError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line.trim())
                .map_err(|source| CatalogError::Json { line: idx + 1, source })
        })
        .collect()
}
