//! Recurrent sequence-model pipeline: windowing, training, persistence,
//! and autoregressive inference.
//!
//! Known limitation: inference forecasts only the primary count
//! feature. Calendar features for future days are derived from the
//! date, but activity and utilization are carried forward from the last
//! observation, which can degrade accuracy over long horizons.

pub mod network;
pub mod persist;
pub mod training;
pub mod window;

pub use network::RecurrentNet;
pub use persist::{ModelState, ModelStore};
pub use training::{EpochReport, TrainingConfig, TrainingPolicy, TrainingSummary};
pub use window::{build_samples, SequenceSample, DEFAULT_WINDOW, FEATURE_COUNT};

use crate::aggregate::seasonal_factor;
use crate::core::{ForecastMethod, ForecastResult, ObservationSeries};
use crate::error::{ForecastError, Result};
use crate::models::Predictor;
use crate::utils::stats::variance;
use chrono::{Datelike, Duration, Utc};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Releases the training flag when a run finishes or unwinds.
struct TrainingGuard<'a>(&'a AtomicBool);

impl Drop for TrainingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Sequence-model pipeline for one model name.
///
/// Shareable across threads: trained state sits behind a lock and
/// training runs are guarded against reentrancy. A pipeline without
/// trained state reports `ModelNotInitialized` from `produce`, which
/// the ensemble treats as a recoverable degradation.
#[derive(Debug)]
pub struct SequencePipeline {
    name: String,
    window: usize,
    target_offset: usize,
    config: TrainingConfig,
    state: RwLock<Option<ModelState>>,
    training_active: AtomicBool,
}

impl SequencePipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, DEFAULT_WINDOW, 1, TrainingConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        window: usize,
        target_offset: usize,
        config: TrainingConfig,
    ) -> Self {
        Self {
            name: name.into(),
            window,
            target_offset,
            config,
            state: RwLock::new(None),
            training_active: AtomicBool::new(false),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.name
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn is_trained(&self) -> bool {
        self.state.read().is_some()
    }

    /// Install externally obtained state (e.g. loaded in tests).
    pub fn attach_state(&self, state: ModelState) {
        *self.state.write() = Some(state);
    }

    /// Train on the series, replacing any existing state.
    ///
    /// A second call while a run is in flight fails fast with
    /// `ConcurrentTraining`. The stop signal is checked between epochs;
    /// an aborted run that completed at least one epoch still installs
    /// its partially trained state.
    pub fn train(
        &self,
        series: &ObservationSeries,
        observer: Option<&mut dyn FnMut(&EpochReport)>,
        stop: Option<&AtomicBool>,
    ) -> Result<TrainingSummary> {
        if self
            .training_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ForecastError::ConcurrentTraining);
        }
        let _guard = TrainingGuard(&self.training_active);

        let (samples, scaler) = build_samples(series, self.window, self.target_offset)?;
        info!(
            model = %self.name,
            samples = samples.len(),
            window = self.window,
            "training sequence model"
        );

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut network = RecurrentNet::new(FEATURE_COUNT, self.config.hidden_units, &mut rng);
        let summary = training::run_training(
            &mut network,
            &samples,
            &self.config,
            observer,
            stop,
            &mut rng,
        );

        if summary.epochs_run == 0 {
            warn!(model = %self.name, "training aborted before the first epoch");
            return Ok(summary);
        }

        *self.state.write() = Some(ModelState {
            network,
            scaler,
            window: self.window,
            target_offset: self.target_offset,
            trained_at: Utc::now(),
            samples_seen: summary.samples,
        });
        Ok(summary)
    }

    /// Apply the retraining policy: load persisted state if none is in
    /// memory, retrain and save when the policy demands it. Returns
    /// whether a training run happened.
    pub fn ensure_trained(
        &self,
        series: &ObservationSeries,
        policy: &TrainingPolicy,
        store: &ModelStore,
    ) -> Result<bool> {
        if self.state.read().is_none() {
            match store.load(&self.name) {
                Ok(state) => {
                    info!(model = %self.name, "loaded persisted state");
                    *self.state.write() = Some(state);
                }
                Err(err) if err.is_recoverable() => {}
                Err(err) => return Err(err),
            }
        }

        let samples_available = series
            .len()
            .saturating_sub(self.window + self.target_offset - 1);
        let retrain = {
            let state = self.state.read();
            policy.should_retrain(state.as_ref(), Utc::now(), samples_available)
        };
        if !retrain {
            return Ok(false);
        }

        self.train(series, None, None)?;
        self.save(store)?;
        Ok(true)
    }

    /// Persist the current state under this pipeline's name.
    pub fn save(&self, store: &ModelStore) -> Result<()> {
        let state = self.state.read();
        let state = state.as_ref().ok_or_else(|| ForecastError::ModelNotInitialized {
            name: self.name.clone(),
        })?;
        store.save(&self.name, state)
    }

    /// Load persisted state under this pipeline's name, replacing any
    /// in-memory state.
    pub fn load(&self, store: &ModelStore) -> Result<()> {
        let state = store.load(&self.name)?;
        *self.state.write() = Some(state);
        Ok(())
    }
}

impl Predictor for SequencePipeline {
    fn produce(&self, series: &ObservationSeries, horizon: usize) -> Result<ForecastResult> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "horizon must be positive".to_string(),
            ));
        }

        let state = self.state.read();
        let state = state.as_ref().ok_or_else(|| ForecastError::ModelNotInitialized {
            name: self.name.clone(),
        })?;

        let n = series.len();
        if n < state.window {
            return Err(ForecastError::InsufficientData {
                needed: state.window,
                got: n,
            });
        }

        // Normalize the trailing window with the bounds persisted at
        // training time.
        let mut rows: Vec<Vec<f64>> = series.points()[n - state.window..]
            .iter()
            .map(window::feature_row)
            .collect();
        for row in rows.iter_mut() {
            state.scaler.transform_row(row);
        }

        let last_point = &series.points()[n - 1];
        let (carry_total, carry_util) = match last_point.meta {
            Some(meta) => (meta.total_activity, meta.utilization),
            None => (last_point.value, 0.0),
        };

        let mut trajectory = Vec::with_capacity(horizon);
        let mut dates = Vec::with_capacity(horizon);
        for h in 1..=horizon {
            let predicted = state.network.forward(&rows);
            let raw = state.scaler.invert_value(0, predicted).max(0.0);
            let date = series.last_date() + Duration::days(h as i64);
            trajectory.push(raw);
            dates.push(date);

            // Next window row: the prediction becomes the count; the
            // calendar features are real, the rest are placeholders
            // carried from the last observation.
            let mut row = vec![
                raw,
                carry_total,
                carry_util,
                seasonal_factor(date.month()),
                date.weekday().num_days_from_monday() as f64,
                date.day() as f64,
                date.month() as f64,
            ];
            state.scaler.transform_row(&mut row);
            rows.remove(0);
            rows.push(row);
        }

        let spread = if trajectory.len() > 1 {
            variance(&trajectory)
        } else {
            0.0
        };
        let confidence_value = (1.0 / (1.0 + spread)).clamp(0.0, 1.0);
        let confidence = vec![confidence_value; horizon];

        ForecastResult::new(trajectory, confidence, dates, ForecastMethod::Sequence)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.is_trained()
    }
}
