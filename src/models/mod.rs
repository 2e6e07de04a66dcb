//! Forecasting sub-models.

mod traits;

pub mod seasonal;

pub use seasonal::SeasonalForecaster;
pub use traits::{BoxedPredictor, Predictor};
