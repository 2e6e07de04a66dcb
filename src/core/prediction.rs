//! Per-key, per-day ensemble output and the downstream optimizer payload.

use crate::core::record::SeriesKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of the forecast relative to the previous step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// Stockpile risk classification for one prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Raw sub-model values that fed one combined prediction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentValues {
    pub sequence: Option<f64>,
    pub tabular: Option<f64>,
}

/// Normalized combination weights. Sum to 1 when both sub-models
/// contributed; 1/0 when only one did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentWeights {
    pub sequence: f64,
    pub tabular: f64,
}

impl ComponentWeights {
    pub fn sum(&self) -> f64 {
        self.sequence + self.tabular
    }
}

/// One combined forecast step for a (location, container-type) key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub date: NaiveDate,
    /// Predicted empty-container count, never negative.
    pub predicted_count: f64,
    pub confidence: f64,
    pub location: String,
    pub container_type: String,
    pub trend: Trend,
    pub risk: RiskLevel,
    /// Which path produced this step; degraded results are labeled,
    /// never disguised as full ensemble output.
    pub method: crate::core::forecast::ForecastMethod,
    pub components: ComponentValues,
    pub weights: ComponentWeights,
}

impl Prediction {
    pub fn series_key(&self) -> SeriesKey {
        SeriesKey::new(&self.location, &self.container_type)
    }
}

/// Payload handed to the external redistribution optimizer. The engine
/// stops here; routing decisions belong to the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedistributionInput {
    pub location: String,
    pub container_type: String,
    pub predicted_counts: Vec<f64>,
    pub confidence: Vec<f64>,
}
