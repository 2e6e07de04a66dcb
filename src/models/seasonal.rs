//! Holt-Winters seasonal forecaster.
//!
//! Triple exponential smoothing with multiplicative weekly seasonality.
//! Deterministic and stateless across calls: every `produce` fits from
//! scratch, which keeps the model usable as an always-available
//! fallback source.

use crate::core::{ForecastMethod, ForecastResult, ObservationSeries, SmoothingComponents};
use crate::error::{ForecastError, Result};
use crate::models::Predictor;
use crate::utils::metrics::trailing_mape;
use chrono::Duration;

/// Weekly season length.
const SEASON_LENGTH: usize = 7;

/// One-step-ahead pairs used for the trailing error estimate.
const CONFIDENCE_WINDOW: usize = 20;

/// Per-step confidence discount for longer horizons.
const HORIZON_DISCOUNT: f64 = 0.95;

/// Holt-Winters forecaster over daily empty-container counts.
///
/// Model equations (slot `s = t mod 7`):
/// - Level: `l_t = α(y_t / s_t) + (1-α)(l_{t-1} + b_{t-1})`
/// - Trend: `b_t = β(l_t - l_{t-1}) + (1-β)b_{t-1}`
/// - Seasonal: `s_t = γ(y_t / l_t) + (1-γ)s_t`
/// - Forecast: `ŷ_{t+h} = max(0, (l_t + h·b_t) · s_{(n+h-1) mod 7})`
#[derive(Debug, Clone)]
pub struct SeasonalForecaster {
    alpha: f64,
    beta: f64,
    gamma: f64,
}

/// Fitted smoothing state plus the one-step-ahead history needed for
/// the confidence estimate.
struct FittedState {
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
    n: usize,
    one_step_actual: Vec<f64>,
    one_step_predicted: Vec<f64>,
}

impl SeasonalForecaster {
    /// Create a forecaster with explicit smoothing parameters.
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0001, 0.9999),
            beta: beta.clamp(0.0001, 0.9999),
            gamma: gamma.clamp(0.0001, 0.9999),
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Minimum observations required: two full seasons.
    pub fn min_observations() -> usize {
        2 * SEASON_LENGTH
    }

    fn fit(&self, values: &[f64]) -> Result<FittedState> {
        if values.len() < Self::min_observations() {
            return Err(ForecastError::InsufficientData {
                needed: Self::min_observations(),
                got: values.len(),
            });
        }

        // Seasonal indices from the first two seasons: per-slot average
        // over the overall average.
        let init_window = &values[..2 * SEASON_LENGTH];
        let overall = init_window.iter().sum::<f64>() / init_window.len() as f64;
        if overall.abs() < 1e-10 {
            return Err(ForecastError::ComputationError(
                "series mean is zero, multiplicative seasonality undefined".to_string(),
            ));
        }
        let mut seasonals: Vec<f64> = (0..SEASON_LENGTH)
            .map(|slot| {
                let slot_avg = (init_window[slot] + init_window[slot + SEASON_LENGTH]) / 2.0;
                let index = slot_avg / overall;
                if index.abs() < 1e-10 {
                    1.0
                } else {
                    index
                }
            })
            .collect();

        let mut level = values[0] / seasonals[0];
        let mut trend = 0.0;

        let mut one_step_actual = Vec::with_capacity(values.len());
        let mut one_step_predicted = Vec::with_capacity(values.len());

        for (t, &y) in values.iter().enumerate().skip(1) {
            let slot = t % SEASON_LENGTH;
            let s = seasonals[slot];

            one_step_actual.push(y);
            one_step_predicted.push((level + trend) * s);

            let level_prev = level;
            level = self.alpha * (y / s) + (1.0 - self.alpha) * (level_prev + trend);
            trend = self.beta * (level - level_prev) + (1.0 - self.beta) * trend;
            if level.abs() > 1e-10 {
                seasonals[slot] = self.gamma * (y / level) + (1.0 - self.gamma) * s;
            }
        }

        Ok(FittedState {
            level,
            trend,
            seasonals,
            n: values.len(),
            one_step_actual,
            one_step_predicted,
        })
    }
}

impl Default for SeasonalForecaster {
    fn default() -> Self {
        Self::new(0.3, 0.1, 0.2)
    }
}

impl Predictor for SeasonalForecaster {
    fn produce(&self, series: &ObservationSeries, horizon: usize) -> Result<ForecastResult> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "horizon must be positive".to_string(),
            ));
        }

        let values = series.values();
        let state = self.fit(&values)?;

        let base_confidence = 1.0
            - trailing_mape(
                &state.one_step_actual,
                &state.one_step_predicted,
                CONFIDENCE_WINDOW,
            );

        let mut forecast = Vec::with_capacity(horizon);
        let mut confidence = Vec::with_capacity(horizon);
        let mut dates = Vec::with_capacity(horizon);
        for h in 1..=horizon {
            let slot = (state.n + h - 1) % SEASON_LENGTH;
            let value = (state.level + h as f64 * state.trend) * state.seasonals[slot];
            forecast.push(value.max(0.0));
            let discounted = base_confidence * HORIZON_DISCOUNT.powi(h as i32 - 1);
            confidence.push(discounted.clamp(0.1, 0.9));
            dates.push(series.last_date() + Duration::days(h as i64));
        }

        ForecastResult::new(forecast, confidence, dates, ForecastMethod::Seasonal).map(|r| {
            r.with_components(SmoothingComponents {
                level: state.level,
                trend: state.trend,
                seasonals: state.seasonals,
            })
        })
    }

    fn name(&self) -> &str {
        "seasonal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HistoricalPoint, SeriesKey};
    use chrono::NaiveDate;

    fn make_series(values: &[f64]) -> ObservationSeries {
        let base = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &v)| HistoricalPoint::new(base + Duration::days(i as i64), v))
            .collect();
        ObservationSeries::new(SeriesKey::new("ROTTERDAM", "40HC"), points).unwrap()
    }

    fn weekly_sinusoid(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 20.0 + 10.0 * (2.0 * std::f64::consts::PI * i as f64 / 7.0).sin())
            .collect()
    }

    #[test]
    fn forecast_length_matches_horizon() {
        let series = make_series(&weekly_sinusoid(30));
        let model = SeasonalForecaster::default();
        let result = model.produce(&series, 7).unwrap();
        assert_eq!(result.horizon(), 7);
        assert_eq!(result.dates().len(), 7);
        assert_eq!(result.method(), ForecastMethod::Seasonal);
    }

    #[test]
    fn sinusoid_forecast_tracks_continuation() {
        let n = 30;
        let series = make_series(&weekly_sinusoid(n));
        let model = SeasonalForecaster::default();
        let result = model.produce(&series, 7).unwrap();

        for (h, &predicted) in result.values().iter().enumerate() {
            let i = n + h;
            let expected = 20.0 + 10.0 * (2.0 * std::f64::consts::PI * i as f64 / 7.0).sin();
            let relative = (predicted - expected).abs() / expected.abs();
            assert!(
                relative <= 0.30,
                "step {h}: predicted {predicted:.2}, expected {expected:.2}"
            );
        }
    }

    #[test]
    fn forecast_values_are_non_negative() {
        // Decaying series pushes level toward zero; forecasts must floor at 0.
        let values: Vec<f64> = (0..28).map(|i| (28.0 - i as f64).max(0.1)).collect();
        let series = make_series(&values);
        let result = SeasonalForecaster::default().produce(&series, 14).unwrap();
        assert!(result.values().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn confidence_is_clamped_and_decaying() {
        let series = make_series(&weekly_sinusoid(35));
        let result = SeasonalForecaster::default().produce(&series, 10).unwrap();
        let confidence = result.confidence();
        assert!(confidence.iter().all(|&c| (0.1..=0.9).contains(&c)));
        for pair in confidence.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12);
        }
    }

    #[test]
    fn two_seasons_are_required() {
        let series = make_series(&weekly_sinusoid(13));
        let err = SeasonalForecaster::default().produce(&series, 7).unwrap_err();
        assert_eq!(err, ForecastError::InsufficientData { needed: 14, got: 13 });
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let series = make_series(&weekly_sinusoid(30));
        let err = SeasonalForecaster::default().produce(&series, 0).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter(_)));
    }

    #[test]
    fn components_expose_fitted_state() {
        let series = make_series(&weekly_sinusoid(30));
        let result = SeasonalForecaster::default().produce(&series, 3).unwrap();
        let components = result.components().unwrap();
        assert_eq!(components.seasonals.len(), 7);
        // Level should sit near the series mean for a stable sinusoid.
        assert!((components.level - 20.0).abs() < 4.0);
    }

    #[test]
    fn forecast_dates_continue_the_series() {
        let series = make_series(&weekly_sinusoid(30));
        let result = SeasonalForecaster::default().produce(&series, 2).unwrap();
        assert_eq!(result.dates()[0], series.last_date() + Duration::days(1));
        assert_eq!(result.dates()[1], series.last_date() + Duration::days(2));
    }
}
