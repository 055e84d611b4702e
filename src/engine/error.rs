//! Execution error types.
//!
//! Every failure here is terminal for the attempt; the dispatcher never
//! retries and never records a failed attempt as a latency sample.

use thiserror::Error;

/// Errors an executor (or the dispatcher around it) can report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Input decoding failed: {0}")]
    InvalidInput(String),

    #[error("Execution timeout after {0}ms")]
    Timeout(u64),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Execution abandoned before completion")]
    Abandoned,

    #[error("Model error: {0}")]
    ModelError(String),
}

impl ExecutionError {
    /// Returns true if this error should be logged as a warning.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Abandoned)
    }

    /// Short stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::InvalidInput(_) => "invalid_input",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Abandoned => "abandoned",
            Self::ModelError(_) => "model_error",
        }
    }
}
