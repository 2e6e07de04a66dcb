//! Persistence for trained sequence-model state.
//!
//! Artifacts are JSON files written to a temp path and atomically
//! renamed into place, so concurrent readers never observe a partial
//! write. A per-store mutex keeps writers serialized.

use crate::error::{ForecastError, Result};
use crate::sequence::network::RecurrentNet;
use crate::transform::MinMaxScaler;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Trained weights plus everything inference needs to reproduce the
/// training-time view of the data: the min-max scaling bounds recorded
/// when windows were built, and the window geometry.
///
/// Lifecycle: built → trained → saved → (loaded in a later process) →
/// disposed. The scaler is computed once at training time; inference
/// reuses it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub network: RecurrentNet,
    pub scaler: MinMaxScaler,
    pub window: usize,
    pub target_offset: usize,
    pub trained_at: DateTime<Utc>,
    pub samples_seen: usize,
}

/// Directory-backed store for named model artifacts.
#[derive(Debug)]
pub struct ModelStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ModelStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Whether a persisted artifact exists for `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.artifact_path(name).is_file()
    }

    /// Persist `state` under `name` with a write-then-rename swap.
    pub fn save(&self, name: &str, state: &ModelState) -> Result<()> {
        let _guard = self.write_lock.lock();
        let json = serde_json::to_vec_pretty(state)?;
        let target = self.artifact_path(name);
        let tmp = self.dir.join(format!(".{name}.json.tmp"));
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &target)?;
        info!(name, path = %target.display(), "saved model state");
        Ok(())
    }

    /// Load the artifact for `name`. A missing artifact is the
    /// recoverable `ModelNotInitialized`, not a persistence failure.
    pub fn load(&self, name: &str) -> Result<ModelState> {
        let path = self.artifact_path(name);
        if !path.is_file() {
            return Err(ForecastError::ModelNotInitialized {
                name: name.to_string(),
            });
        }
        let bytes = fs::read(&path)?;
        let state = serde_json::from_slice(&bytes)?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn state() -> ModelState {
        let mut rng = StdRng::seed_from_u64(9);
        ModelState {
            network: RecurrentNet::new(7, 4, &mut rng),
            scaler: MinMaxScaler::fit(&[vec![0.0; 7], vec![1.0; 7]]),
            window: 30,
            target_offset: 1,
            trained_at: Utc::now(),
            samples_seen: 120,
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        let original = state();

        store.save("rotterdam-40hc", &original).unwrap();
        assert!(store.exists("rotterdam-40hc"));

        let loaded = store.load("rotterdam-40hc").unwrap();
        assert_eq!(loaded.network, original.network);
        assert_eq!(loaded.scaler, original.scaler);
        assert_eq!(loaded.samples_seen, original.samples_seen);
    }

    #[test]
    fn missing_artifact_is_model_not_initialized() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        let err = store.load("nope").unwrap_err();
        assert_eq!(
            err,
            ForecastError::ModelNotInitialized {
                name: "nope".to_string()
            }
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        store.save("m", &state()).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn corrupt_artifact_is_a_persistence_error() {
        let dir = tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("bad.json"), b"{not json").unwrap();
        let err = store.load("bad").unwrap_err();
        assert!(matches!(err, ForecastError::Persistence(_)));
    }
}
