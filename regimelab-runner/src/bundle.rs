//! Model bundle: the persisted output of training.
//!
//! Pretty JSON with a `schema_version` field. Newer versions are rejected on
//! load; the Gaussian caches inside the model are rebuilt during parsing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use regimelab_core::features::{FeatureError, WaveletFeaturizer};
use regimelab_core::hmm::{FitReport, GaussianHmm, Normalization, StateLabeling};

/// Current schema version for model bundles.
pub const BUNDLE_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    BUNDLE_SCHEMA_VERSION
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("model bundle JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported bundle schema version {found} (max supported: {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    #[error("bundle labels {labels} states but the model has {model}")]
    StateCountMismatch { labels: usize, model: usize },
}

/// Settings the model was trained with; the backtest featurizes with these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingInfo {
    pub ticker: String,
    pub n_states: usize,
    pub window: usize,
    pub scale: f64,
    pub n_iter: usize,
    pub seed: u64,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub n_observations: usize,
}

/// Everything needed to label and decode new data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub model: GaussianHmm,
    pub labeling: StateLabeling,
    pub training: TrainingInfo,
    pub fit: FitReport,
    pub dataset_hash: String,
    /// Days per decoded state over the training sample.
    pub state_distribution: BTreeMap<usize, usize>,
}

impl ModelBundle {
    pub fn normalization(&self) -> &Normalization {
        self.model.normalization()
    }

    pub fn bull_state(&self) -> usize {
        self.labeling.bull_state()
    }

    /// Featurizer matching the one used in training.
    pub fn featurizer(&self) -> Result<WaveletFeaturizer, FeatureError> {
        WaveletFeaturizer::new(self.training.window, self.training.scale)
    }

    /// Content hash of the serialized bundle.
    pub fn bundle_id(&self) -> Result<String, BundleError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn to_json(&self) -> Result<String, BundleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse, rejecting unknown schema versions and inconsistent labels.
    pub fn from_json(json: &str) -> Result<Self, BundleError> {
        let bundle: Self = serde_json::from_str(json)?;
        if bundle.schema_version > BUNDLE_SCHEMA_VERSION {
            return Err(BundleError::UnsupportedSchema {
                found: bundle.schema_version,
                supported: BUNDLE_SCHEMA_VERSION,
            });
        }
        if bundle.labeling.n_states() != bundle.model.n_states() {
            return Err(BundleError::StateCountMismatch {
                labels: bundle.labeling.n_states(),
                model: bundle.model.n_states(),
            });
        }
        Ok(bundle)
    }

    /// Write pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), BundleError> {
        let write_err = |source| BundleError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, self.to_json()?).map_err(write_err)
    }

    pub fn load(path: &Path) -> Result<Self, BundleError> {
        let json = std::fs::read_to_string(path).map_err(|source| BundleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}
