//! Shared statistical helpers and accuracy metrics.

pub mod metrics;
pub mod stats;

pub use metrics::{calculate_metrics, trailing_mape, AccuracyMetrics};
pub use stats::{mean, quantile_normal, std_dev, variance};
