//! Ensemble combination of the sequence and tabular forecasters with
//! seasonal and heuristic fallbacks.

mod combiner;

pub use combiner::EnsembleCombiner;

use crate::error::{ForecastError, Result};

/// Weighting rules for the ensemble, read-only after construction.
///
/// The tabular model carries most of the weight on short horizons,
/// where its lag and rolling features are freshest; the sequence model
/// takes the complement and dominates further out.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleConfig {
    /// Steps (1-based) treated as "short horizon".
    pub short_horizon_days: usize,
    /// Base tabular weight within the short horizon.
    pub tabular_weight_short: f64,
    /// Base tabular weight past the short horizon.
    pub tabular_weight_long: f64,
    /// Sub-model confidence above this earns a weight boost.
    pub boost_threshold: f64,
    /// Additive boost applied before normalization.
    pub boost_amount: f64,
    /// Count at which a depot is considered saturated; normalizes the
    /// risk score.
    pub reference_cap: f64,
}

impl EnsembleConfig {
    pub fn new(
        short_horizon_days: usize,
        tabular_weight_short: f64,
        tabular_weight_long: f64,
        boost_threshold: f64,
        boost_amount: f64,
        reference_cap: f64,
    ) -> Result<Self> {
        for (name, w) in [
            ("tabular_weight_short", tabular_weight_short),
            ("tabular_weight_long", tabular_weight_long),
            ("boost_threshold", boost_threshold),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(ForecastError::InvalidParameter(format!(
                    "{name} must lie in [0, 1], got {w}"
                )));
            }
        }
        if boost_amount < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "boost_amount must be non-negative".to_string(),
            ));
        }
        if reference_cap <= 0.0 {
            return Err(ForecastError::InvalidParameter(
                "reference_cap must be positive".to_string(),
            ));
        }
        Ok(Self {
            short_horizon_days,
            tabular_weight_short,
            tabular_weight_long,
            boost_threshold,
            boost_amount,
            reference_cap,
        })
    }

    /// Base tabular weight for a 1-based forecast step.
    pub fn tabular_base_weight(&self, step: usize) -> f64 {
        if step <= self.short_horizon_days {
            self.tabular_weight_short
        } else {
            self.tabular_weight_long
        }
    }
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            short_horizon_days: 3,
            tabular_weight_short: 0.7,
            tabular_weight_long: 0.3,
            boost_threshold: 0.9,
            boost_amount: 0.15,
            reference_cap: 100.0,
        }
    }
}
