//! Training loop, progress reporting, and the retraining policy.

use crate::sequence::network::RecurrentNet;
use crate::sequence::persist::ModelState;
use crate::sequence::window::SequenceSample;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Hyperparameters for a training run.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub hidden_units: usize,
    /// Fraction of samples held out for validation, in [0, 0.5].
    pub validation_split: f64,
    /// Seed for weight init and shuffling; fixed for reproducible runs.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 80,
            learning_rate: 0.05,
            hidden_units: 12,
            validation_split: 0.2,
            seed: 42,
        }
    }
}

/// Per-epoch progress snapshot passed to the observer callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
}

/// Outcome of a completed (or aborted) training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub samples: usize,
    /// Whether the external stop signal ended the run early.
    pub aborted: bool,
}

/// Decides when an existing trained state should be replaced.
///
/// Retrain only when no state exists, or the state is older than
/// `max_age_days` *and* at least `min_new_samples` samples have
/// accumulated since it was trained. Anything else reuses the existing
/// state untouched.
#[derive(Debug, Clone)]
pub struct TrainingPolicy {
    pub max_age_days: i64,
    pub min_new_samples: usize,
}

impl Default for TrainingPolicy {
    fn default() -> Self {
        Self {
            max_age_days: 14,
            min_new_samples: 48,
        }
    }
}

impl TrainingPolicy {
    pub fn should_retrain(
        &self,
        state: Option<&ModelState>,
        now: DateTime<Utc>,
        samples_available: usize,
    ) -> bool {
        match state {
            None => true,
            Some(state) => {
                let age_days = (now - state.trained_at).num_days();
                let new_samples = samples_available.saturating_sub(state.samples_seen);
                age_days > self.max_age_days && new_samples >= self.min_new_samples
            }
        }
    }
}

/// Run SGD over the samples, reporting per-epoch losses through the
/// observer and honoring the stop signal between epochs.
pub(crate) fn run_training(
    network: &mut RecurrentNet,
    samples: &[SequenceSample],
    config: &TrainingConfig,
    mut observer: Option<&mut dyn FnMut(&EpochReport)>,
    stop: Option<&AtomicBool>,
    rng: &mut impl Rng,
) -> TrainingSummary {
    let split = config.validation_split.clamp(0.0, 0.5);
    let val_len = ((samples.len() as f64) * split).round() as usize;
    let train_len = samples.len() - val_len;

    let mut order: Vec<usize> = (0..train_len).collect();

    let mut train_loss = f64::NAN;
    let mut val_loss = f64::NAN;
    let mut epochs_run = 0;
    let mut aborted = false;

    for epoch in 0..config.epochs {
        if stop.map(|s| s.load(Ordering::SeqCst)).unwrap_or(false) {
            aborted = true;
            break;
        }

        order.shuffle(rng);
        let mut epoch_loss = 0.0;
        for &i in &order {
            let sample = &samples[i];
            epoch_loss += network.train_sample(&sample.window, sample.target, config.learning_rate);
        }
        train_loss = epoch_loss / train_len.max(1) as f64;

        val_loss = if val_len > 0 {
            samples[train_len..]
                .iter()
                .map(|s| (network.forward(&s.window) - s.target).powi(2))
                .sum::<f64>()
                / val_len as f64
        } else {
            train_loss
        };

        epochs_run = epoch + 1;
        let report = EpochReport {
            epoch,
            train_loss,
            val_loss,
        };
        debug!(
            epoch,
            train_loss = report.train_loss,
            val_loss = report.val_loss,
            "training epoch complete"
        );
        if let Some(observer) = observer.as_deref_mut() {
            observer(&report);
        }
    }

    TrainingSummary {
        epochs_run,
        train_loss,
        val_loss,
        samples: samples.len(),
        aborted,
    }
}
