//! Daily observation series per (location, container-type).

use crate::core::record::SeriesKey;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Context captured alongside a daily empty-count observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationMeta {
    /// Total container movements that day (empty + laden).
    pub total_activity: f64,
    /// Share of activity that was laden, in [0, 1].
    pub utilization: f64,
    /// Monthly seasonal factor for the observation's month.
    pub seasonal_factor: f64,
}

/// One aggregated daily observation. Immutable once produced by the
/// aggregator; interpolated gap-fill points carry derived meta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub meta: Option<ObservationMeta>,
}

impl HistoricalPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value,
            meta: None,
        }
    }

    pub fn with_meta(date: NaiveDate, value: f64, meta: ObservationMeta) -> Self {
        Self {
            date,
            value,
            meta: Some(meta),
        }
    }
}

/// Time-ordered daily observations for one series key.
///
/// Construction sorts points by date and rejects duplicates, so
/// downstream consumers can assume a strictly increasing daily axis
/// (possibly with gaps until `fill_missing_dates` has run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSeries {
    key: SeriesKey,
    points: Vec<HistoricalPoint>,
}

impl ObservationSeries {
    pub fn new(key: SeriesKey, mut points: Vec<HistoricalPoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(ForecastError::EmptyData);
        }
        points.sort_by_key(|p| p.date);
        for pair in points.windows(2) {
            if pair[0].date == pair[1].date {
                return Err(ForecastError::InvalidParameter(format!(
                    "duplicate observation for {}",
                    pair[0].date
                )));
            }
        }
        Ok(Self { key, points })
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn points(&self) -> &[HistoricalPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Observation values in date order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.points[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }

    /// Value of the most recent observation.
    pub fn last_value(&self) -> f64 {
        self.points[self.points.len() - 1].value
    }

    /// Mean of the trailing `n` observations (all of them if fewer).
    pub fn trailing_mean(&self, n: usize) -> f64 {
        let tail = &self.points[self.points.len().saturating_sub(n)..];
        tail.iter().map(|p| p.value).sum::<f64>() / tail.len() as f64
    }

    /// Replace the point list, keeping the key. Used by gap filling.
    pub(crate) fn with_points(&self, points: Vec<HistoricalPoint>) -> Result<Self> {
        Self::new(self.key.clone(), points)
    }
}
