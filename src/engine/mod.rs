//! Execution boundary.
//!
//! The router never computes inference itself. An [`Executor`] receives the
//! chosen variant and the raw request payload, does any model-specific
//! decoding and compute, and returns an opaque result. Timing is measured by
//! the caller, never reported by the executor.

pub mod error;
mod simulated;

use async_trait::async_trait;

use crate::models::{Application, ModelVariant};

pub use error::ExecutionError;
pub use simulated::SimulatedExecutor;

/// Payload handed to an executor.
#[derive(Debug, Clone, Default)]
pub struct ExecutionInput {
    pub application: Application,
    pub payload: Vec<u8>,
}

impl ExecutionInput {
    pub fn new(application: Application, payload: Vec<u8>) -> Self {
        Self { application, payload }
    }
}

/// Runs inference for a selected variant.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute one request against `variant`.
    async fn execute(
        &self,
        variant: &ModelVariant,
        input: &ExecutionInput,
    ) -> Result<Vec<u8>, ExecutionError>;

    /// Bring `variant` into a servable state. Used by warm-up profiling.
    async fn load(&self, _variant: &ModelVariant) -> Result<(), ExecutionError> {
        Ok(())
    }

    /// Release `variant`. Used by warm-up profiling.
    async fn unload(&self, _variant: &ModelVariant) -> Result<(), ExecutionError> {
        Ok(())
    }
}
