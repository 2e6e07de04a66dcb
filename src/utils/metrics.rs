//! Accuracy metrics for forecast evaluation.

use crate::error::{ForecastError, Result};

/// Accuracy metrics for evaluating forecast performance.
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error (None if zeros in actual)
    pub mape: Option<f64>,
}

/// Calculate accuracy metrics between actual and predicted values.
pub fn calculate_metrics(actual: &[f64], predicted: &[f64]) -> Result<AccuracyMetrics> {
    if actual.is_empty() || predicted.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    if actual.len() != predicted.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }

    let n = actual.len() as f64;

    let mae: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / n;

    let mse: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / n;

    let mape = if actual.contains(&0.0) {
        None
    } else {
        let sum: f64 = actual
            .iter()
            .zip(predicted.iter())
            .map(|(a, p)| ((a - p) / a).abs())
            .sum();
        Some(sum / n)
    };

    Ok(AccuracyMetrics {
        mae,
        rmse: mse.sqrt(),
        mape,
    })
}

/// Mean absolute percentage error over the trailing `window` pairs,
/// as a fraction (0.12 = 12%). Zero-valued actuals are skipped.
///
/// Feeds the seasonal forecaster's confidence estimate from its last
/// one-step-ahead fitted values.
pub fn trailing_mape(actual: &[f64], predicted: &[f64], window: usize) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 || window == 0 {
        return 1.0;
    }
    let start = n.saturating_sub(window);

    let mut sum = 0.0;
    let mut count = 0usize;
    for i in start..n {
        if actual[i].abs() > 1e-10 {
            sum += ((actual[i] - predicted[i]) / actual[i]).abs();
            count += 1;
        }
    }

    if count == 0 {
        1.0
    } else {
        sum / count as f64
    }
}
