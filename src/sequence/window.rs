//! Sliding-window sample construction for the sequence model.
//!
//! Each day contributes a 7-entry feature row; windows are normalized
//! with a min-max scaler fitted over the full series. The fitted bounds
//! travel with the trained model so inference reuses them verbatim.

use crate::aggregate::seasonal_factor;
use crate::core::{HistoricalPoint, ObservationSeries};
use crate::error::{ForecastError, Result};
use crate::transform::MinMaxScaler;
use chrono::Datelike;

/// Engineered features per day: count, total activity, utilization,
/// seasonal factor, day-of-week, day-of-month, month.
pub const FEATURE_COUNT: usize = 7;

/// Default sliding-window length in days.
pub const DEFAULT_WINDOW: usize = 30;

/// One training sample: a normalized window of feature rows plus the
/// normalized target count. Built once, consumed once.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceSample {
    pub window: Vec<Vec<f64>>,
    pub target: f64,
}

/// Raw (unnormalized) feature row for one observation.
pub fn feature_row(point: &HistoricalPoint) -> Vec<f64> {
    let date = point.date;
    let (total, utilization, factor) = match point.meta {
        Some(meta) => (meta.total_activity, meta.utilization, meta.seasonal_factor),
        // Interpolated or bare points: activity defaults to the count
        // itself and the factor comes from the calendar.
        None => (point.value, 0.0, seasonal_factor(date.month())),
    };
    vec![
        point.value,
        total,
        utilization,
        factor,
        date.weekday().num_days_from_monday() as f64,
        date.day() as f64,
        date.month() as f64,
    ]
}

/// Raw feature rows for every observation in the series.
pub fn feature_rows(series: &ObservationSeries) -> Vec<Vec<f64>> {
    series.points().iter().map(feature_row).collect()
}

/// Build normalized training samples with a `window`-day input and the
/// count `target_offset` days past the window end as target.
///
/// Requires at least `window + target_offset` observations. Returns the
/// samples together with the scaler fitted over the full series; the
/// scaler must be persisted alongside the trained weights.
pub fn build_samples(
    series: &ObservationSeries,
    window: usize,
    target_offset: usize,
) -> Result<(Vec<SequenceSample>, MinMaxScaler)> {
    if window == 0 || target_offset == 0 {
        return Err(ForecastError::InvalidParameter(
            "window and target offset must be positive".to_string(),
        ));
    }
    let needed = window + target_offset;
    let n = series.len();
    if n < needed {
        return Err(ForecastError::InsufficientData { needed, got: n });
    }

    let mut rows = feature_rows(series);
    let scaler = MinMaxScaler::fit(&rows);
    for row in rows.iter_mut() {
        scaler.transform_row(row);
    }

    let mut samples = Vec::with_capacity(n - needed + 1);
    for start in 0..=(n - needed) {
        let target_idx = start + window + target_offset - 1;
        samples.push(SequenceSample {
            window: rows[start..start + window].to_vec(),
            target: rows[target_idx][0],
        });
    }

    Ok((samples, scaler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ObservationMeta, SeriesKey};
    use chrono::{Duration, NaiveDate};

    fn make_series(n: usize) -> ObservationSeries {
        let base = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(); // a Monday
        let points = (0..n)
            .map(|i| {
                HistoricalPoint::with_meta(
                    base + Duration::days(i as i64),
                    i as f64,
                    ObservationMeta {
                        total_activity: 2.0 * i as f64,
                        utilization: 0.5,
                        seasonal_factor: 1.0,
                    },
                )
            })
            .collect();
        ObservationSeries::new(SeriesKey::new("BUSAN", "40HC"), points).unwrap()
    }

    #[test]
    fn feature_row_has_seven_entries() {
        let series = make_series(3);
        let row = feature_row(&series.points()[0]);
        assert_eq!(row.len(), FEATURE_COUNT);
        assert_eq!(row[0], 0.0); // count
        assert_eq!(row[4], 0.0); // Monday
        assert_eq!(row[6], 3.0); // March
    }

    #[test]
    fn sample_count_and_target_alignment() {
        let series = make_series(12);
        let (samples, scaler) = build_samples(&series, 5, 2).unwrap();
        // 12 - (5 + 2) + 1 windows
        assert_eq!(samples.len(), 6);
        assert_eq!(samples[0].window.len(), 5);
        // First target is the count at index 6 (value 6.0), normalized
        // over the 0..=11 range.
        let expected = scaler.transform_value(0, 6.0);
        assert!((samples[0].target - expected).abs() < 1e-12);
    }

    #[test]
    fn windows_are_normalized_to_unit_range() {
        let series = make_series(20);
        let (samples, _) = build_samples(&series, 10, 1).unwrap();
        for sample in &samples {
            for row in &sample.window {
                assert!(row.iter().all(|v| (-1e-9..=1.0 + 1e-9).contains(v)));
            }
        }
    }

    #[test]
    fn too_short_series_is_rejected() {
        let series = make_series(10);
        let err = build_samples(&series, 10, 1).unwrap_err();
        assert_eq!(err, ForecastError::InsufficientData { needed: 11, got: 10 });
    }

    #[test]
    fn missing_meta_falls_back_to_derived_features() {
        let base = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let point = HistoricalPoint::new(base, 5.0);
        let row = feature_row(&point);
        assert_eq!(row[1], 5.0);
        assert_eq!(row[2], 0.0);
        assert_eq!(row[3], seasonal_factor(9));
    }
}
