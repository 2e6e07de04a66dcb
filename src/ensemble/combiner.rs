//! Horizon- and confidence-weighted merging of sub-model forecasts.

use crate::core::{
    ComponentValues, ComponentWeights, ForecastMethod, ForecastResult, ObservationSeries,
    Prediction, RiskLevel, Trend,
};
use crate::ensemble::EnsembleConfig;
use crate::error::{ForecastError, Result};
use crate::models::Predictor;
use chrono::Duration;
use tracing::{debug, warn};

/// Relative change past which a step is classified as a trend move.
const TREND_THRESHOLD: f64 = 0.10;

/// Merges per-date sub-model outputs into combined predictions.
///
/// The three sub-model calls run concurrently with independent failure
/// isolation: one failing model never aborts the others, and the
/// combiner proceeds with whatever subset succeeded.
#[derive(Debug, Clone, Default)]
pub struct EnsembleCombiner {
    config: EnsembleConfig,
}

impl EnsembleCombiner {
    pub fn new(config: EnsembleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Run all sub-models concurrently and combine their outputs.
    pub fn forecast(
        &self,
        series: &ObservationSeries,
        horizon: usize,
        seasonal: &dyn Predictor,
        sequence: &dyn Predictor,
        tabular: &dyn Predictor,
    ) -> Result<Vec<Prediction>> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "horizon must be positive".to_string(),
            ));
        }

        let (seasonal_out, sequence_out, tabular_out) = std::thread::scope(|scope| {
            let h_seasonal = scope.spawn(|| seasonal.produce(series, horizon));
            let h_sequence = scope.spawn(|| sequence.produce(series, horizon));
            let h_tabular = scope.spawn(|| tabular.produce(series, horizon));
            (
                join_model(h_seasonal, seasonal.name(), series),
                join_model(h_sequence, sequence.name(), series),
                join_model(h_tabular, tabular.name(), series),
            )
        });

        self.combine(
            series,
            horizon,
            sequence_out.as_ref(),
            tabular_out.as_ref(),
            seasonal_out.as_ref(),
        )
    }

    /// Merge already-produced sub-model results.
    ///
    /// Dates covered by both trained models get a weighted blend; dates
    /// covered by exactly one get that model's value with weight 1/0;
    /// dates covered by neither are omitted. With no trained output at
    /// all, the seasonal result stands in (`Fallback`), and below that
    /// a recent-mean heuristic (`Minimal`).
    pub fn combine(
        &self,
        series: &ObservationSeries,
        horizon: usize,
        sequence: Option<&ForecastResult>,
        tabular: Option<&ForecastResult>,
        seasonal: Option<&ForecastResult>,
    ) -> Result<Vec<Prediction>> {
        let mut predictions = Vec::with_capacity(horizon);
        let mut previous = series.last_value();

        for step in 1..=horizon {
            let date = series.last_date() + Duration::days(step as i64);
            let seq_hit = sequence.and_then(|r| r.at(date));
            let tab_hit = tabular.and_then(|r| r.at(date));

            let (value, confidence, weights, components, method) = match (seq_hit, tab_hit) {
                (Some((sv, sc)), Some((tv, tc))) => {
                    let (w_seq, w_tab) = self.step_weights(step, sc, tc);
                    (
                        w_seq * sv + w_tab * tv,
                        (w_seq * sc + w_tab * tc).clamp(0.0, 1.0),
                        ComponentWeights {
                            sequence: w_seq,
                            tabular: w_tab,
                        },
                        ComponentValues {
                            sequence: Some(sv),
                            tabular: Some(tv),
                        },
                        ForecastMethod::Ensemble,
                    )
                }
                (Some((sv, sc)), None) => (
                    sv,
                    sc,
                    ComponentWeights {
                        sequence: 1.0,
                        tabular: 0.0,
                    },
                    ComponentValues {
                        sequence: Some(sv),
                        tabular: None,
                    },
                    ForecastMethod::Sequence,
                ),
                (None, Some((tv, tc))) => (
                    tv,
                    tc,
                    ComponentWeights {
                        sequence: 0.0,
                        tabular: 1.0,
                    },
                    ComponentValues {
                        sequence: None,
                        tabular: Some(tv),
                    },
                    ForecastMethod::Tabular,
                ),
                (None, None) => continue,
            };

            predictions.push(self.classify(series, date, value, confidence, weights, components, method, previous));
            previous = value;
        }

        if !predictions.is_empty() {
            return Ok(predictions);
        }

        // No trained model produced anything: degrade, never fabricate
        // a second source.
        if let Some(seasonal) = seasonal {
            debug!(key = %series.key(), "both trained models unavailable, using seasonal fallback");
            return Ok(self.from_single_result(series, seasonal, ForecastMethod::Fallback));
        }

        warn!(key = %series.key(), "all sub-models unavailable, using recent-mean heuristic");
        let mean = series.trailing_mean(7).max(0.0);
        let dates: Vec<_> = (1..=horizon)
            .map(|h| series.last_date() + Duration::days(h as i64))
            .collect();
        let minimal = ForecastResult::new(
            vec![mean; horizon],
            vec![0.3; horizon],
            dates,
            ForecastMethod::Minimal,
        )?;
        Ok(self.from_single_result(series, &minimal, ForecastMethod::Minimal))
    }

    /// Normalized (sequence, tabular) weights for one step.
    ///
    /// Base weights follow the horizon band; a sub-model whose own
    /// confidence exceeds the boost threshold gains a fixed additive
    /// boost. Boosted weights are clamped to [0, 1] before the final
    /// normalization.
    fn step_weights(&self, step: usize, seq_confidence: f64, tab_confidence: f64) -> (f64, f64) {
        let mut w_tab = self.config.tabular_base_weight(step);
        let mut w_seq = 1.0 - w_tab;

        if tab_confidence > self.config.boost_threshold {
            w_tab += self.config.boost_amount;
        }
        if seq_confidence > self.config.boost_threshold {
            w_seq += self.config.boost_amount;
        }

        w_tab = w_tab.clamp(0.0, 1.0);
        w_seq = w_seq.clamp(0.0, 1.0);

        let sum = w_tab + w_seq;
        if sum <= f64::EPSILON {
            (0.5, 0.5)
        } else {
            (w_seq / sum, w_tab / sum)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn classify(
        &self,
        series: &ObservationSeries,
        date: chrono::NaiveDate,
        value: f64,
        confidence: f64,
        weights: ComponentWeights,
        components: ComponentValues,
        method: ForecastMethod,
        previous: f64,
    ) -> Prediction {
        Prediction {
            date,
            predicted_count: value.max(0.0),
            confidence,
            location: series.key().location.clone(),
            container_type: series.key().container_type.clone(),
            trend: classify_trend(previous, value),
            risk: self.classify_risk(value, confidence),
            method,
            components,
            weights,
        }
    }

    fn from_single_result(
        &self,
        series: &ObservationSeries,
        result: &ForecastResult,
        method: ForecastMethod,
    ) -> Vec<Prediction> {
        let mut previous = series.last_value();
        result
            .dates()
            .iter()
            .zip(result.values().iter().zip(result.confidence().iter()))
            .map(|(&date, (&value, &confidence))| {
                let prediction = self.classify(
                    series,
                    date,
                    value,
                    confidence,
                    ComponentWeights {
                        sequence: 0.0,
                        tabular: 0.0,
                    },
                    ComponentValues::default(),
                    method,
                    previous,
                );
                previous = value;
                prediction
            })
            .collect()
    }

    /// Risk from the normalized predicted count scaled by confidence.
    fn classify_risk(&self, value: f64, confidence: f64) -> RiskLevel {
        let score = (value / self.config.reference_cap).clamp(0.0, 1.0) * confidence;
        if score > 0.7 {
            RiskLevel::High
        } else if score > 0.4 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Relative-change trend classification against the previous value.
fn classify_trend(previous: f64, current: f64) -> Trend {
    if previous.abs() < 1e-10 {
        return if current > 1e-10 {
            Trend::Increasing
        } else {
            Trend::Stable
        };
    }
    let change = (current - previous) / previous;
    if change > TREND_THRESHOLD {
        Trend::Increasing
    } else if change < -TREND_THRESHOLD {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Collect one sub-model's scoped-thread result, logging failures
/// instead of propagating them.
fn join_model(
    handle: std::thread::ScopedJoinHandle<'_, Result<ForecastResult>>,
    name: &str,
    series: &ObservationSeries,
) -> Option<ForecastResult> {
    match handle.join() {
        Ok(Ok(result)) => Some(result),
        Ok(Err(err)) if err.is_recoverable() => {
            debug!(model = name, key = %series.key(), error = %err, "sub-model unavailable");
            None
        }
        Ok(Err(err)) => {
            warn!(model = name, key = %series.key(), error = %err, "sub-model failed");
            None
        }
        Err(_) => {
            warn!(model = name, key = %series.key(), "sub-model panicked");
            None
        }
    }
}
