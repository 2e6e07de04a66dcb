//! Aggregation of raw movement events into daily observation series.
//!
//! Groups records by (date, location, container-type), counts empty and
//! total movements, and attaches the monthly seasonal factor. Gap days
//! inside a series' observed span are filled by linear interpolation so
//! downstream models see a contiguous daily axis.

use crate::core::{
    HistoricalPoint, MovementRecord, ObservationMeta, ObservationSeries, SeriesKey,
};
use crate::error::{ForecastError, Result};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Monthly seasonal factors for empty-container accumulation.
///
/// Peak shipping ahead of year-end holidays (Aug–Oct) leaves more
/// empties at import depots; the lull after Chinese New Year (Feb)
/// leaves fewer.
pub const SEASONAL_FACTORS: [f64; 12] = [
    0.90, 0.80, 0.92, 0.96, 1.00, 1.04, 1.10, 1.18, 1.24, 1.20, 1.06, 0.96,
];

/// Seasonal factor for a 1-based month number.
pub fn seasonal_factor(month: u32) -> f64 {
    SEASONAL_FACTORS[(month as usize - 1) % 12]
}

/// Turns raw movement/booking events into per-key daily series.
#[derive(Debug, Clone)]
pub struct EventAggregator {
    /// Fill gaps inside each series' span after aggregation.
    fill_gaps: bool,
}

impl Default for EventAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl EventAggregator {
    pub fn new() -> Self {
        Self { fill_gaps: true }
    }

    /// Keep gap days absent instead of interpolating them.
    pub fn without_gap_fill(mut self) -> Self {
        self.fill_gaps = false;
        self
    }

    /// Aggregate records into one series per (location, container-type).
    ///
    /// A failure to build one key's series (e.g. conflicting duplicate
    /// observations) is logged and skipped; independent keys are never
    /// affected.
    pub fn aggregate(&self, records: &[MovementRecord]) -> Result<Vec<ObservationSeries>> {
        if records.is_empty() {
            return Err(ForecastError::EmptyData);
        }

        // (key, date) -> (empty_count, total_count)
        let mut groups: BTreeMap<(SeriesKey, NaiveDate), (f64, f64)> = BTreeMap::new();
        for record in records {
            let entry = groups
                .entry((record.series_key(), record.date))
                .or_insert((0.0, 0.0));
            entry.1 += record.quantity as f64;
            if record.is_empty_positioning() {
                entry.0 += record.quantity as f64;
            }
        }

        let mut per_key: BTreeMap<SeriesKey, Vec<HistoricalPoint>> = BTreeMap::new();
        for ((key, date), (empty, total)) in groups {
            let utilization = if total > 0.0 { 1.0 - empty / total } else { 0.0 };
            let meta = ObservationMeta {
                total_activity: total,
                utilization,
                seasonal_factor: seasonal_factor(date.month()),
            };
            per_key
                .entry(key)
                .or_default()
                .push(HistoricalPoint::with_meta(date, empty, meta));
        }

        let mut result = Vec::with_capacity(per_key.len());
        for (key, points) in per_key {
            let series = match ObservationSeries::new(key.clone(), points) {
                Ok(series) => series,
                Err(err) => {
                    warn!(key = %key, error = %err, "skipping series");
                    continue;
                }
            };
            let series = if self.fill_gaps {
                match fill_missing_dates(&series) {
                    Ok(filled) => filled,
                    Err(err) => {
                        warn!(key = %key, error = %err, "gap fill failed, keeping sparse series");
                        series
                    }
                }
            } else {
                series
            };
            result.push(series);
        }

        debug!(series = result.len(), records = records.len(), "aggregated events");
        Ok(result)
    }
}

/// Fill missing days inside the observed span by linear interpolation
/// between the nearest known neighbors. A single-day gap between values
/// 10 and 20 fills to 15.
pub fn fill_missing_dates(series: &ObservationSeries) -> Result<ObservationSeries> {
    let points = series.points();
    let span_days = (series.last_date() - series.first_date()).num_days() as usize + 1;
    if span_days == points.len() {
        return Ok(series.clone());
    }

    let mut filled = Vec::with_capacity(span_days);
    for pair in points.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        filled.push(prev.clone());

        let gap = (next.date - prev.date).num_days();
        for step in 1..gap {
            let fraction = step as f64 / gap as f64;
            let date = prev.date + Duration::days(step);
            let value = prev.value + (next.value - prev.value) * fraction;
            let meta = interpolate_meta(prev, next, fraction, date);
            filled.push(HistoricalPoint {
                date,
                value,
                meta,
            });
        }
    }
    filled.push(points[points.len() - 1].clone());

    series.with_points(filled)
}

fn interpolate_meta(
    prev: &HistoricalPoint,
    next: &HistoricalPoint,
    fraction: f64,
    date: NaiveDate,
) -> Option<ObservationMeta> {
    match (&prev.meta, &next.meta) {
        (Some(a), Some(b)) => Some(ObservationMeta {
            total_activity: a.total_activity + (b.total_activity - a.total_activity) * fraction,
            utilization: a.utilization + (b.utilization - a.utilization) * fraction,
            seasonal_factor: seasonal_factor(date.month()),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ContainerStatus;
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    fn record(date: NaiveDate, qty: u32, status: ContainerStatus) -> MovementRecord {
        MovementRecord {
            date,
            origin: "SINGAPORE".to_string(),
            destination: "ROTTERDAM".to_string(),
            container_type: "40HC".to_string(),
            quantity: qty,
            status,
        }
    }

    #[test]
    fn counts_empty_and_total_per_day() {
        let records = vec![
            record(day(1), 4, ContainerStatus::Empty),
            record(day(1), 6, ContainerStatus::Laden),
            record(day(2), 2, ContainerStatus::Empty),
        ];
        let series = EventAggregator::new().aggregate(&records).unwrap();
        assert_eq!(series.len(), 1);
        let points = series[0].points();
        assert_eq!(points[0].value, 4.0);
        let meta = points[0].meta.unwrap();
        assert_relative_eq!(meta.total_activity, 10.0);
        assert_relative_eq!(meta.utilization, 0.6);
        assert_relative_eq!(meta.seasonal_factor, seasonal_factor(5));
    }

    #[test]
    fn independent_keys_produce_independent_series() {
        let mut records = vec![record(day(1), 1, ContainerStatus::Empty)];
        records.push(MovementRecord {
            destination: "HAMBURG".to_string(),
            ..record(day(1), 3, ContainerStatus::Empty)
        });
        let series = EventAggregator::new().aggregate(&records).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn single_day_gap_interpolates_to_midpoint() {
        let series = ObservationSeries::new(
            SeriesKey::new("ROTTERDAM", "40HC"),
            vec![
                HistoricalPoint::new(day(1), 10.0),
                HistoricalPoint::new(day(3), 20.0),
            ],
        )
        .unwrap();
        let filled = fill_missing_dates(&series).unwrap();
        assert_eq!(filled.len(), 3);
        assert_relative_eq!(filled.points()[1].value, 15.0, epsilon = 1e-12);
        assert_eq!(filled.points()[1].date, day(2));
    }

    #[test]
    fn multi_day_gap_interpolates_linearly() {
        let series = ObservationSeries::new(
            SeriesKey::new("ROTTERDAM", "40HC"),
            vec![
                HistoricalPoint::new(day(1), 0.0),
                HistoricalPoint::new(day(5), 8.0),
            ],
        )
        .unwrap();
        let filled = fill_missing_dates(&series).unwrap();
        let values: Vec<f64> = filled.values();
        assert_eq!(values, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn contiguous_series_is_unchanged() {
        let series = ObservationSeries::new(
            SeriesKey::new("ROTTERDAM", "40HC"),
            vec![
                HistoricalPoint::new(day(1), 1.0),
                HistoricalPoint::new(day(2), 2.0),
            ],
        )
        .unwrap();
        let filled = fill_missing_dates(&series).unwrap();
        assert_eq!(filled, series);
    }

    #[test]
    fn sparse_mode_keeps_gaps() {
        let records = vec![
            record(day(1), 4, ContainerStatus::Empty),
            record(day(4), 2, ContainerStatus::Empty),
        ];
        let series = EventAggregator::new()
            .without_gap_fill()
            .aggregate(&records)
            .unwrap();
        assert_eq!(series[0].len(), 2);
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = EventAggregator::new().aggregate(&[]).unwrap_err();
        assert_eq!(err, ForecastError::EmptyData);
    }

    #[test]
    fn seasonal_table_covers_the_year() {
        assert_eq!(SEASONAL_FACTORS.len(), 12);
        // Peak season factors exceed the slack season's.
        assert!(seasonal_factor(9) > seasonal_factor(2));
    }
}
