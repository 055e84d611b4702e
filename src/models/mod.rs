//! Model variant management.
//!
//! Holds the variant data model, per-action latency statistics, the registry
//! of known and active variants, and the catalogs that populate it.

mod catalog;
mod registry;
mod stats;
mod variant;

pub use catalog::{CatalogError, FileCatalog, StaticCatalog, VariantCatalog, VariantDescriptor};
pub use registry::{RegistryError, UnloadPolicy, VariantRegistry};
pub use stats::{LatencyStats, StatsSummary};
pub use variant::{ActionKind, Application, ExecutionClass, ModelVariant, VariantInfo};
