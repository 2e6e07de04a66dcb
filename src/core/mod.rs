//! Core data structures: movement records, observation series, and
//! forecast outputs.

pub mod forecast;
pub mod prediction;
pub mod record;
pub mod series;

pub use forecast::{ForecastMethod, ForecastResult, SmoothingComponents};
pub use prediction::{
    ComponentValues, ComponentWeights, Prediction, RedistributionInput, RiskLevel, Trend,
};
pub use record::{ContainerStatus, MovementRecord, SeriesKey};
pub use series::{HistoricalPoint, ObservationMeta, ObservationSeries};
