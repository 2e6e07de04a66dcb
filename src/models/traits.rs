//! Predictor trait defining the common interface for all sub-models.

use crate::core::{ForecastResult, ObservationSeries};
use crate::error::Result;

/// Common interface over the seasonal, sequence, and tabular models.
///
/// Object-safe so the ensemble can treat contributors uniformly and
/// tests can substitute mocks. `produce` never trains; a model without
/// usable state returns `ModelNotInitialized` and lets the caller
/// degrade.
pub trait Predictor: Send + Sync {
    /// Forecast `horizon` daily steps past the end of `series`.
    fn produce(&self, series: &ObservationSeries, horizon: usize) -> Result<ForecastResult>;

    /// Get the model name used in logs and error reports.
    fn name(&self) -> &str;

    /// Whether the model currently holds usable state.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Type alias for boxed predictor trait objects.
pub type BoxedPredictor = Box<dyn Predictor>;
