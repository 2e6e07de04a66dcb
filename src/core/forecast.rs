//! Forecast result container shared by all sub-models and the ensemble.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which path produced a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastMethod {
    /// Holt-Winters seasonal smoothing.
    Seasonal,
    /// Recurrent sequence model.
    Sequence,
    /// Subprocess-backed tabular regression.
    Tabular,
    /// Weighted combination of sequence and tabular outputs.
    Ensemble,
    /// Seasonal smoothing standing in because no trained model was available.
    Fallback,
    /// Recent-mean heuristic; last resort when even smoothing cannot run.
    Minimal,
}

impl ForecastMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastMethod::Seasonal => "seasonal",
            ForecastMethod::Sequence => "sequence",
            ForecastMethod::Tabular => "tabular",
            ForecastMethod::Ensemble => "ensemble",
            ForecastMethod::Fallback => "fallback",
            ForecastMethod::Minimal => "minimal",
        }
    }
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fitted smoothing state exposed for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingComponents {
    pub level: f64,
    pub trend: f64,
    pub seasonals: Vec<f64>,
}

/// Point forecast with per-step confidence over a daily horizon.
///
/// Invariants enforced at construction: `values`, `confidence`, and
/// `dates` share one length; values are non-negative; confidences lie
/// in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    values: Vec<f64>,
    confidence: Vec<f64>,
    dates: Vec<NaiveDate>,
    method: ForecastMethod,
    components: Option<SmoothingComponents>,
}

impl ForecastResult {
    pub fn new(
        values: Vec<f64>,
        confidence: Vec<f64>,
        dates: Vec<NaiveDate>,
        method: ForecastMethod,
    ) -> Result<Self> {
        if confidence.len() != values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: values.len(),
                got: confidence.len(),
            });
        }
        if dates.len() != values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: values.len(),
                got: dates.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ForecastError::ComputationError(
                "forecast values must be finite and non-negative".to_string(),
            ));
        }
        if confidence.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ForecastError::ComputationError(
                "confidence values must lie in [0, 1]".to_string(),
            ));
        }
        Ok(Self {
            values,
            confidence,
            dates,
            method,
            components: None,
        })
    }

    pub fn with_components(mut self, components: SmoothingComponents) -> Self {
        self.components = Some(components);
        self
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn confidence(&self) -> &[f64] {
        &self.confidence
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn method(&self) -> ForecastMethod {
        self.method
    }

    pub fn components(&self) -> Option<&SmoothingComponents> {
        self.components.as_ref()
    }

    /// Number of forecast steps.
    pub fn horizon(&self) -> usize {
        self.values.len()
    }

    /// Value and confidence for a given date, if the date is covered.
    pub fn at(&self, date: NaiveDate) -> Option<(f64, f64)> {
        self.dates
            .iter()
            .position(|d| *d == date)
            .map(|i| (self.values[i], self.confidence[i]))
    }

    /// Re-tag the producing method, e.g. when a seasonal result is used
    /// as a fallback.
    pub fn retagged(mut self, method: ForecastMethod) -> Self {
        self.method = method;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let base = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        (0..n).map(|i| base + chrono::Duration::days(i as i64)).collect()
    }

    #[test]
    fn lengths_must_agree() {
        let err = ForecastResult::new(
            vec![1.0, 2.0],
            vec![0.5],
            dates(2),
            ForecastMethod::Seasonal,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ForecastError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn negative_values_are_rejected() {
        let err = ForecastResult::new(
            vec![1.0, -0.5],
            vec![0.5, 0.5],
            dates(2),
            ForecastMethod::Sequence,
        )
        .unwrap_err();
        assert!(matches!(err, ForecastError::ComputationError(_)));
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let err = ForecastResult::new(
            vec![1.0],
            vec![1.2],
            dates(1),
            ForecastMethod::Tabular,
        )
        .unwrap_err();
        assert!(matches!(err, ForecastError::ComputationError(_)));
    }

    #[test]
    fn lookup_by_date() {
        let ds = dates(3);
        let result = ForecastResult::new(
            vec![5.0, 6.0, 7.0],
            vec![0.8, 0.7, 0.6],
            ds.clone(),
            ForecastMethod::Ensemble,
        )
        .unwrap();
        assert_eq!(result.at(ds[1]), Some((6.0, 0.7)));
        let outside = ds[2] + chrono::Duration::days(1);
        assert_eq!(result.at(outside), None);
    }

    #[test]
    fn retag_changes_only_method() {
        let result = ForecastResult::new(
            vec![5.0],
            vec![0.8],
            dates(1),
            ForecastMethod::Seasonal,
        )
        .unwrap()
        .retagged(ForecastMethod::Fallback);
        assert_eq!(result.method(), ForecastMethod::Fallback);
        assert_eq!(result.values(), &[5.0]);
    }
}
