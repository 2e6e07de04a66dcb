//! # depot-forecast
//!
//! Empty-container demand forecasting for container depots.
//!
//! Predicts future empty-container counts per (location, container-type)
//! from historical movement/booking events by combining three
//! forecasters — deterministic Holt-Winters seasonal smoothing, a
//! trainable recurrent sequence model over normalized sliding windows,
//! and a subprocess-backed gradient-boosted tabular model — under
//! horizon- and confidence-dependent weighting, then derives
//! safety-stock and risk advisories from the combined output.
//!
//! The engine degrades gracefully: a stale, untrained, or unreachable
//! sub-model is dropped from the blend, and fully degraded results are
//! tagged as such rather than disguised.

pub mod advisory;
pub mod aggregate;
pub mod core;
pub mod ensemble;
pub mod error;
pub mod models;
pub mod sequence;
pub mod tabular;
pub mod transform;
pub mod utils;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::advisory::{optimal_safety_stock, AdvisoryConfig, SafetyStockParams};
    pub use crate::aggregate::EventAggregator;
    pub use crate::core::{
        ForecastMethod, ForecastResult, HistoricalPoint, MovementRecord, ObservationSeries,
        Prediction, SeriesKey,
    };
    pub use crate::ensemble::{EnsembleCombiner, EnsembleConfig};
    pub use crate::error::{ForecastError, Result};
    pub use crate::models::{Predictor, SeasonalForecaster};
    pub use crate::sequence::{ModelStore, SequencePipeline, TrainingPolicy};
    pub use crate::tabular::{TabularModelClient, WorkerConfig};
}
