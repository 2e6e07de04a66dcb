//! Error types for the depot-forecast engine.

use thiserror::Error;

/// Result type alias for forecasting operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while aggregating, training, or forecasting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// No trained state is available for the named model.
    ///
    /// Recoverable: callers fall back to the remaining sub-models.
    #[error("model '{name}' is not initialized")]
    ModelNotInitialized { name: String },

    /// A training run is already in flight on this model instance.
    #[error("training already in progress")]
    ConcurrentTraining,

    /// The external worker process timed out, exited non-zero, or
    /// produced a payload that could not be parsed.
    #[error("external process failure: {0}")]
    ExternalProcess(String),

    /// Reading or writing a persisted model artifact failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Computation error (e.g. numerical issues).
    #[error("computation error: {0}")]
    ComputationError(String),
}

impl ForecastError {
    /// Whether the condition is expected to clear on its own and callers
    /// should degrade rather than abort.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ForecastError::ModelNotInitialized { .. })
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(err: std::io::Error) -> Self {
        ForecastError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Persistence(err.to_string())
    }
}
