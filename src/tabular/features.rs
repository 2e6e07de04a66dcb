//! Feature engineering for the tabular regression worker.
//!
//! Rows are keyed by (location, container-type, date) and combine
//! calendar flags, lag and rolling statistics of the empty count,
//! location-level aggregates, route frequency, and an externally
//! supplied optimization score.

use crate::core::{MovementRecord, ObservationSeries, SeriesKey};
use crate::error::{ForecastError, Result};
use crate::transform::{rolling_max, rolling_mean, rolling_min, rolling_std};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

/// Column order of `FeatureRow::values`. The CSV handed to the worker
/// uses exactly these headers.
pub const FEATURE_NAMES: [&str; 25] = [
    "dwell_days",
    "movement_count",
    "container_type_id",
    "location_id",
    "empty_share",
    "day_of_week",
    "month",
    "week_of_year",
    "is_weekend",
    "is_month_start",
    "is_month_end",
    "lag_1",
    "lag_7",
    "lag_30",
    "roll7_mean",
    "roll7_std",
    "roll7_max",
    "roll7_min",
    "roll30_dwell_mean",
    "location_empty_ratio",
    "location_total",
    "location_avg_dwell",
    "route_frequency",
    "optimization_score",
    "seasonal_factor",
];

/// One engineered sample. `target` is the observed count for training
/// rows and `None` for inference rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub key: SeriesKey,
    pub date: NaiveDate,
    pub values: Vec<f64>,
    pub target: Option<f64>,
}

/// A batch of feature rows, the transfer unit to the worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    pub rows: Vec<FeatureRow>,
}

impl FeatureFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as CSV for the subprocess transfer artifact.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("location,container_type,date");
        for name in FEATURE_NAMES {
            out.push(',');
            out.push_str(name);
        }
        out.push_str(",target\n");
        for row in &self.rows {
            out.push_str(&format!(
                "{},{},{}",
                row.key.location, row.key.container_type, row.date
            ));
            for v in &row.values {
                out.push_str(&format!(",{v}"));
            }
            match row.target {
                Some(t) => out.push_str(&format!(",{t}\n")),
                None => out.push_str(",\n"),
            }
        }
        out
    }
}

/// Per-location aggregates derived from the raw records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationStats {
    /// Share of inbound quantity that arrived empty.
    pub empty_ratio: f64,
    /// Total inbound container quantity.
    pub total_containers: f64,
    /// Mean days between consecutive activity days; dwell proxy.
    pub avg_dwell_days: f64,
    /// Dominant inbound lane's share of all inbound moves.
    pub route_frequency: f64,
}

/// Everything the feature builder needs beyond the observation series
/// itself. Built once from the raw records, reused for training and
/// inference frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureContext {
    type_ids: BTreeMap<String, f64>,
    location_ids: BTreeMap<String, f64>,
    location_stats: BTreeMap<String, LocationStats>,
    scores: BTreeMap<SeriesKey, f64>,
}

impl FeatureContext {
    /// Derive ids, location aggregates, and route frequencies from the
    /// record stream. `scores` carries externally supplied optimization
    /// scores per key; missing keys default to 0.5.
    pub fn from_records(
        records: &[MovementRecord],
        scores: BTreeMap<SeriesKey, f64>,
    ) -> Result<Self> {
        if records.is_empty() {
            return Err(ForecastError::EmptyData);
        }

        let mut types: Vec<&str> = records.iter().map(|r| r.container_type.as_str()).collect();
        types.sort_unstable();
        types.dedup();
        let type_ids = types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i as f64))
            .collect();

        let mut locations: Vec<&str> = records
            .iter()
            .flat_map(|r| [r.origin.as_str(), r.destination.as_str()])
            .collect();
        locations.sort_unstable();
        locations.dedup();
        let location_ids: BTreeMap<String, f64> = locations
            .iter()
            .enumerate()
            .map(|(i, l)| (l.to_string(), i as f64))
            .collect();

        let mut location_stats = BTreeMap::new();
        for location in location_ids.keys() {
            let inbound: Vec<&MovementRecord> = records
                .iter()
                .filter(|r| &r.destination == location)
                .collect();
            if inbound.is_empty() {
                continue;
            }

            let total: f64 = inbound.iter().map(|r| r.quantity as f64).sum();
            let empty: f64 = inbound
                .iter()
                .filter(|r| r.is_empty_positioning())
                .map(|r| r.quantity as f64)
                .sum();

            let mut dates: Vec<NaiveDate> = inbound.iter().map(|r| r.date).collect();
            dates.sort_unstable();
            dates.dedup();
            let avg_dwell_days = if dates.len() > 1 {
                let gaps: f64 = dates
                    .windows(2)
                    .map(|w| (w[1] - w[0]).num_days() as f64)
                    .sum();
                gaps / (dates.len() - 1) as f64
            } else {
                1.0
            };

            let mut lanes: BTreeMap<&str, f64> = BTreeMap::new();
            for r in &inbound {
                *lanes.entry(r.origin.as_str()).or_default() += r.quantity as f64;
            }
            let dominant = lanes.values().copied().fold(0.0, f64::max);

            location_stats.insert(
                location.clone(),
                LocationStats {
                    empty_ratio: if total > 0.0 { empty / total } else { 0.0 },
                    total_containers: total,
                    avg_dwell_days,
                    route_frequency: if total > 0.0 { dominant / total } else { 0.0 },
                },
            );
        }

        Ok(Self {
            type_ids,
            location_ids,
            location_stats,
            scores,
        })
    }

    pub fn score_for(&self, key: &SeriesKey) -> f64 {
        self.scores.get(key).copied().unwrap_or(0.5)
    }

    pub fn stats_for(&self, location: &str) -> LocationStats {
        self.location_stats
            .get(location)
            .copied()
            .unwrap_or(LocationStats {
                empty_ratio: 0.0,
                total_containers: 0.0,
                avg_dwell_days: 1.0,
                route_frequency: 0.0,
            })
    }

    fn type_id(&self, container_type: &str) -> f64 {
        self.type_ids.get(container_type).copied().unwrap_or(-1.0)
    }

    fn location_id(&self, location: &str) -> f64 {
        self.location_ids.get(location).copied().unwrap_or(-1.0)
    }
}

/// Calendar and lag/rolling state shared by training and inference rows.
fn assemble_row(
    key: &SeriesKey,
    date: NaiveDate,
    values: &[f64],
    idx_exclusive: usize,
    meta_total: f64,
    meta_empty_share: f64,
    seasonal: f64,
    ctx: &FeatureContext,
) -> Vec<f64> {
    let stats = ctx.stats_for(&key.location);

    let lag = |offset: usize| -> f64 {
        if idx_exclusive >= offset {
            values[idx_exclusive - offset]
        } else if idx_exclusive > 0 {
            values[0]
        } else {
            0.0
        }
    };

    let window_start = idx_exclusive.saturating_sub(7);
    let recent = &values[window_start..idx_exclusive];
    let (r_mean, r_std, r_max, r_min) = if recent.is_empty() {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        let hist = &values[..idx_exclusive];
        let pick = |v: Vec<f64>| v.last().copied().filter(|x| x.is_finite()).unwrap_or(0.0);
        (
            pick(rolling_mean(hist, recent.len())),
            pick(rolling_std(hist, recent.len().max(2))),
            pick(rolling_max(hist, recent.len())),
            pick(rolling_min(hist, recent.len())),
        )
    };

    let weekday = date.weekday().num_days_from_monday();
    let month_end = {
        let next = date + Duration::days(1);
        next.month() != date.month()
    };

    vec![
        stats.avg_dwell_days,
        meta_total,
        ctx.type_id(&key.container_type),
        ctx.location_id(&key.location),
        meta_empty_share,
        weekday as f64,
        date.month() as f64,
        date.iso_week().week() as f64,
        if weekday >= 5 { 1.0 } else { 0.0 },
        if date.day() == 1 { 1.0 } else { 0.0 },
        if month_end { 1.0 } else { 0.0 },
        lag(1),
        lag(7),
        lag(30),
        r_mean,
        r_std,
        r_max,
        r_min,
        stats.avg_dwell_days, // 30-period dwell mean collapses to the location mean
        stats.empty_ratio,
        stats.total_containers,
        stats.avg_dwell_days,
        stats.route_frequency,
        ctx.score_for(key),
        seasonal,
    ]
}

/// Build labeled training rows for every observation of every series.
pub fn build_training_frame(
    series_list: &[ObservationSeries],
    ctx: &FeatureContext,
) -> FeatureFrame {
    let mut rows = Vec::new();
    for series in series_list {
        let values = series.values();
        for (i, point) in series.points().iter().enumerate() {
            let (total, empty_share, seasonal) = match point.meta {
                Some(meta) => {
                    let share = if meta.total_activity > 0.0 {
                        point.value / meta.total_activity
                    } else {
                        0.0
                    };
                    (meta.total_activity, share, meta.seasonal_factor)
                }
                None => (
                    point.value,
                    1.0,
                    crate::aggregate::seasonal_factor(point.date.month()),
                ),
            };
            rows.push(FeatureRow {
                key: series.key().clone(),
                date: point.date,
                values: assemble_row(
                    series.key(),
                    point.date,
                    &values,
                    i,
                    total,
                    empty_share,
                    seasonal,
                    ctx,
                ),
                target: Some(point.value),
            });
        }
    }
    FeatureFrame { rows }
}

/// Build unlabeled rows for `horizon` days past the series end. Lags and
/// rolling statistics clamp to the observed history; the worker model
/// handles the rest.
pub fn build_inference_frame(
    series: &ObservationSeries,
    horizon: usize,
    ctx: &FeatureContext,
) -> FeatureFrame {
    let values = series.values();
    let n = values.len();
    let last = &series.points()[n - 1];
    let (total, empty_share) = match last.meta {
        Some(meta) => (
            meta.total_activity,
            if meta.total_activity > 0.0 {
                last.value / meta.total_activity
            } else {
                0.0
            },
        ),
        None => (last.value, 1.0),
    };

    let rows = (1..=horizon)
        .map(|h| {
            let date = series.last_date() + Duration::days(h as i64);
            FeatureRow {
                key: series.key().clone(),
                date,
                values: assemble_row(
                    series.key(),
                    date,
                    &values,
                    n,
                    total,
                    empty_share,
                    crate::aggregate::seasonal_factor(date.month()),
                    ctx,
                ),
                target: None,
            }
        })
        .collect();
    FeatureFrame { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContainerStatus, HistoricalPoint};
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    fn records() -> Vec<MovementRecord> {
        vec![
            MovementRecord {
                date: day(1),
                origin: "SHANGHAI".to_string(),
                destination: "ROTTERDAM".to_string(),
                container_type: "40HC".to_string(),
                quantity: 6,
                status: ContainerStatus::Empty,
            },
            MovementRecord {
                date: day(3),
                origin: "SHANGHAI".to_string(),
                destination: "ROTTERDAM".to_string(),
                container_type: "40HC".to_string(),
                quantity: 2,
                status: ContainerStatus::Laden,
            },
            MovementRecord {
                date: day(3),
                origin: "SINGAPORE".to_string(),
                destination: "ROTTERDAM".to_string(),
                container_type: "20GP".to_string(),
                quantity: 2,
                status: ContainerStatus::Laden,
            },
        ]
    }

    fn make_series(n: usize) -> ObservationSeries {
        let points = (0..n)
            .map(|i| HistoricalPoint::new(day(1) + Duration::days(i as i64), 10.0 + i as f64))
            .collect();
        ObservationSeries::new(SeriesKey::new("ROTTERDAM", "40HC"), points).unwrap()
    }

    #[test]
    fn context_aggregates_per_location() {
        let ctx = FeatureContext::from_records(&records(), BTreeMap::new()).unwrap();
        let stats = ctx.stats_for("ROTTERDAM");
        assert_relative_eq!(stats.total_containers, 10.0);
        assert_relative_eq!(stats.empty_ratio, 0.6);
        // Two distinct activity days, two days apart.
        assert_relative_eq!(stats.avg_dwell_days, 2.0);
        // Shanghai lane carries 8 of 10 inbound boxes.
        assert_relative_eq!(stats.route_frequency, 0.8);
    }

    #[test]
    fn rows_have_declared_width() {
        let ctx = FeatureContext::from_records(&records(), BTreeMap::new()).unwrap();
        let frame = build_training_frame(&[make_series(10)], &ctx);
        assert_eq!(frame.len(), 10);
        for row in &frame.rows {
            assert_eq!(row.values.len(), FEATURE_NAMES.len());
            assert!(row.target.is_some());
        }
    }

    #[test]
    fn lags_read_backwards_from_each_row() {
        let ctx = FeatureContext::from_records(&records(), BTreeMap::new()).unwrap();
        let frame = build_training_frame(&[make_series(10)], &ctx);
        let lag1_col = FEATURE_NAMES.iter().position(|n| *n == "lag_1").unwrap();
        // Row 5 (value 15) has lag_1 = value of row 4 = 14.
        assert_relative_eq!(frame.rows[5].values[lag1_col], 14.0);
    }

    #[test]
    fn inference_rows_cover_the_horizon_without_targets() {
        let ctx = FeatureContext::from_records(&records(), BTreeMap::new()).unwrap();
        let series = make_series(10);
        let frame = build_inference_frame(&series, 4, &ctx);
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.rows[0].date, series.last_date() + Duration::days(1));
        assert!(frame.rows.iter().all(|r| r.target.is_none()));
    }

    #[test]
    fn csv_has_header_and_one_line_per_row() {
        let ctx = FeatureContext::from_records(&records(), BTreeMap::new()).unwrap();
        let frame = build_inference_frame(&make_series(10), 2, &ctx);
        let csv = frame.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("location,container_type,date,dwell_days"));
        assert!(lines[0].ends_with(",target"));
        assert!(lines[1].ends_with(','));
    }

    #[test]
    fn unknown_score_defaults_to_neutral() {
        let ctx = FeatureContext::from_records(&records(), BTreeMap::new()).unwrap();
        assert_relative_eq!(ctx.score_for(&SeriesKey::new("X", "Y")), 0.5);
    }

    #[test]
    fn empty_records_are_rejected() {
        let err = FeatureContext::from_records(&[], BTreeMap::new()).unwrap_err();
        assert_eq!(err, ForecastError::EmptyData);
    }
}
