//! Tabular regression client: feature engineering plus an
//! out-of-process gradient-boosted model behind a swappable backend.

pub mod features;
pub mod worker;

pub use features::{
    build_inference_frame, build_training_frame, FeatureContext, FeatureFrame, FeatureRow,
    LocationStats, FEATURE_NAMES,
};
pub use worker::{
    SubprocessBackend, TabularBackend, TrainReport, WorkerCommand, WorkerConfig, WorkerOutcome,
    WorkerPrediction,
};

use crate::core::{ForecastMethod, ForecastResult, MovementRecord, ObservationSeries, SeriesKey};
use crate::error::{ForecastError, Result};
use crate::models::Predictor;
use chrono::Duration;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Minimum labeled rows before a training run is attempted.
pub const MIN_TRAINING_SAMPLES: usize = 50;

/// Client over the tabular model. Holds the feature context derived
/// from the raw records; the model itself lives behind the backend
/// port (a subprocess in production).
pub struct TabularModelClient {
    name: String,
    backend: Box<dyn TabularBackend>,
    context: RwLock<Option<FeatureContext>>,
    training_active: AtomicBool,
}

impl TabularModelClient {
    pub fn new(backend: Box<dyn TabularBackend>) -> Self {
        Self {
            name: "tabular".to_string(),
            backend,
            context: RwLock::new(None),
            training_active: AtomicBool::new(false),
        }
    }

    pub fn subprocess(config: WorkerConfig) -> Self {
        Self::new(Box::new(SubprocessBackend::new(config)))
    }

    /// Rebuild the feature context without retraining, so inference can
    /// run against a model trained in an earlier process.
    pub fn refresh_context(
        &self,
        records: &[MovementRecord],
        scores: BTreeMap<SeriesKey, f64>,
    ) -> Result<()> {
        let ctx = FeatureContext::from_records(records, scores)?;
        *self.context.write() = Some(ctx);
        Ok(())
    }

    /// Train the backend model on engineered features for all series.
    ///
    /// Enforces the minimum sample threshold and the per-instance
    /// training reentrancy guard.
    pub fn train(
        &self,
        records: &[MovementRecord],
        series_list: &[ObservationSeries],
        scores: BTreeMap<SeriesKey, f64>,
    ) -> Result<TrainReport> {
        if self
            .training_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ForecastError::ConcurrentTraining);
        }
        struct Release<'a>(&'a AtomicBool);
        impl Drop for Release<'_> {
            fn drop(&mut self) {
                self.0.store(false, Ordering::SeqCst);
            }
        }
        let _guard = Release(&self.training_active);

        let ctx = FeatureContext::from_records(records, scores)?;
        let frame = build_training_frame(series_list, &ctx);
        if frame.len() < MIN_TRAINING_SAMPLES {
            return Err(ForecastError::InsufficientData {
                needed: MIN_TRAINING_SAMPLES,
                got: frame.len(),
            });
        }

        info!(rows = frame.len(), "training tabular model");
        let report = self.backend.train(&frame)?;
        *self.context.write() = Some(ctx);
        Ok(report)
    }
}

impl Predictor for TabularModelClient {
    fn produce(&self, series: &ObservationSeries, horizon: usize) -> Result<ForecastResult> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "horizon must be positive".to_string(),
            ));
        }

        let ctx = self.context.read();
        let ctx = ctx.as_ref().ok_or_else(|| ForecastError::ModelNotInitialized {
            name: self.name.clone(),
        })?;

        let frame = build_inference_frame(series, horizon, ctx);
        let predictions = self.backend.predict(&frame)?;

        let mut values = Vec::with_capacity(horizon);
        let mut confidence = Vec::with_capacity(horizon);
        let mut dates = Vec::with_capacity(horizon);
        for h in 1..=horizon {
            let date = series.last_date() + Duration::days(h as i64);
            let hit = predictions
                .iter()
                .find(|p| p.date == date && &p.key == series.key())
                .ok_or_else(|| {
                    ForecastError::ExternalProcess(format!(
                        "worker returned no prediction for {} on {date}",
                        series.key()
                    ))
                })?;
            values.push(hit.value);
            confidence.push(hit.confidence);
            dates.push(date);
        }

        ForecastResult::new(values, confidence, dates, ForecastMethod::Tabular)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.context.read().is_some()
    }
}
