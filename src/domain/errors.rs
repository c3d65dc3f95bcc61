//! Error types for the RSA engine.

use thiserror::Error;

/// Validation failures raised while normalizing run parameters.
///
/// Per-field failures are recoverable (the field falls back to its default and
/// the error is kept as a rejection); cross-field failures abort normalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be an integer, got {value}")]
    NotAnInteger { field: &'static str, value: String },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: u64,
        max: u64,
    },

    #[error("traceMode must be one of off, summary, verbose; got {0:?}")]
    InvalidTraceMode(String),

    #[error("aggregationSize (K) must be <= populationSize (N): K={k}, N={n}")]
    AggregationExceedsPopulation { k: usize, n: usize },

    #[error("total calls N*T={total} exceeds the cap of {cap}")]
    TotalCallsExceeded { total: usize, cap: usize },
}

/// Errors that terminate a run.
#[derive(Debug, Error)]
pub enum RsaError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Model call failed: {0}")]
    Call(String),

    #[error("Model call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Run aborted")]
    Aborted,
}

impl RsaError {
    /// True when the run ended because the caller cancelled it.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Short machine-readable kind, used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Call(_) => "call_error",
            Self::Timeout { .. } => "timeout_error",
            Self::Aborted => "aborted_error",
        }
    }
}

pub type RsaResult<T> = Result<T, RsaError>;
