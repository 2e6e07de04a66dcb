//! Min-max scaling with parameters retained for inverse transforms.
//!
//! Scaling bounds are fitted once, at training time, and carried inside
//! the persisted model state so inference reuses them verbatim.

use serde::{Deserialize, Serialize};

/// Result of scaling a single series, keeping the parameters needed to
/// map values back to the original scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleResult {
    /// Transformed data.
    pub data: Vec<f64>,
    /// Minimum of the fitted series.
    pub min: f64,
    /// Maximum of the fitted series.
    pub max: f64,
}

impl ScaleResult {
    /// Map scaled values back to the original range.
    pub fn inverse(&self, data: &[f64]) -> Vec<f64> {
        let range = self.range();
        data.iter().map(|&x| x * range + self.min).collect()
    }

    /// Transform new data using the fitted parameters.
    pub fn transform(&self, data: &[f64]) -> Vec<f64> {
        let range = self.range();
        data.iter().map(|&x| (x - self.min) / range).collect()
    }

    fn range(&self) -> f64 {
        let range = self.max - self.min;
        if range.abs() < 1e-10 {
            1.0
        } else {
            range
        }
    }
}

/// Normalize data to [0, 1] (min-max normalization).
///
/// x_scaled = (x - min) / (max - min)
pub fn normalize(series: &[f64]) -> ScaleResult {
    if series.is_empty() {
        return ScaleResult {
            data: Vec::new(),
            min: 0.0,
            max: 1.0,
        };
    }

    let min = series.iter().copied().fold(f64::INFINITY, f64::min);
    let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    let scale = if range < 1e-10 { 1.0 } else { range };
    let data = series.iter().map(|&x| (x - min) / scale).collect();

    ScaleResult { data, min, max }
}

/// Per-column min-max scaler for feature matrices.
///
/// Fitted over the full feature matrix at window-building time; the
/// fitted bounds are serialized into the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit bounds over rows of equal width. Constant columns scale to 0.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut mins = vec![f64::INFINITY; width];
        let mut maxs = vec![f64::NEG_INFINITY; width];
        for row in rows {
            for (j, &v) in row.iter().enumerate() {
                mins[j] = mins[j].min(v);
                maxs[j] = maxs[j].max(v);
            }
        }
        Self { mins, maxs }
    }

    pub fn width(&self) -> usize {
        self.mins.len()
    }

    /// Scale one row in place using the fitted bounds.
    pub fn transform_row(&self, row: &mut [f64]) {
        for (j, v) in row.iter_mut().enumerate() {
            let range = self.maxs[j] - self.mins[j];
            *v = if range.abs() < 1e-10 {
                0.0
            } else {
                (*v - self.mins[j]) / range
            };
        }
    }

    /// Scale a single value belonging to column `column`.
    pub fn transform_value(&self, column: usize, value: f64) -> f64 {
        let range = self.maxs[column] - self.mins[column];
        if range.abs() < 1e-10 {
            0.0
        } else {
            (value - self.mins[column]) / range
        }
    }

    /// Map a scaled value of column `column` back to its original range.
    pub fn invert_value(&self, column: usize, value: f64) -> f64 {
        let range = self.maxs[column] - self.mins[column];
        if range.abs() < 1e-10 {
            self.mins[column]
        } else {
            value * range + self.mins[column]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_maps_to_unit_interval() {
        let result = normalize(&[10.0, 20.0, 30.0]);
        assert_relative_eq!(result.data[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(result.data[1], 0.5, epsilon = 1e-12);
        assert_relative_eq!(result.data[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn normalize_constant_series_is_stable() {
        let result = normalize(&[7.0, 7.0, 7.0]);
        assert!(result.data.iter().all(|&x| x == 0.0));
        assert_eq!(result.inverse(&result.data), vec![7.0, 7.0, 7.0]);
    }

    #[test]
    fn scale_result_round_trips() {
        let original = vec![3.0, 9.0, 6.0, 12.0];
        let result = normalize(&original);
        let recovered = result.inverse(&result.data);
        for (o, r) in original.iter().zip(recovered.iter()) {
            assert_relative_eq!(o, r, epsilon = 1e-12);
        }
    }

    #[test]
    fn scaler_transforms_per_column() {
        let rows = vec![vec![0.0, 100.0], vec![10.0, 200.0]];
        let scaler = MinMaxScaler::fit(&rows);
        let mut row = vec![5.0, 150.0];
        scaler.transform_row(&mut row);
        assert_relative_eq!(row[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(row[1], 0.5, epsilon = 1e-12);
        assert_relative_eq!(scaler.invert_value(0, 0.5), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn scaler_survives_serialization() {
        let scaler = MinMaxScaler::fit(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let json = serde_json::to_string(&scaler).unwrap();
        let back: MinMaxScaler = serde_json::from_str(&json).unwrap();
        assert_eq!(scaler, back);
    }
}
