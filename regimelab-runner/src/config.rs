//! Serializable pipeline configuration.
//!
//! Loaded from a TOML file with `[data]`, `[model]`, `[risk]` and `[output]`
//! sections. Every field has a default, so an empty file is a valid config.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use regimelab_core::domain::Regime;
use regimelab_core::features::{FeatureError, WaveletFeaturizer};
use regimelab_core::hmm::FitOptions;
use regimelab_core::risk::{RiskConfig, RiskError};

/// Unique identifier for a configuration (content-addressable hash).
pub type RunId = String;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid wavelet settings: {0}")]
    Feature(#[from] FeatureError),

    #[error("invalid risk settings: {0}")]
    Risk(#[from] RiskError),
}

/// Complete configuration for train + backtest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub risk: RiskConfig,
    pub output: OutputConfig,
}

/// Input series and the train/test split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub csv_path: PathBuf,
    pub ticker: String,
    /// Last training date (inclusive).
    pub train_end: NaiveDate,
    /// First test date (inclusive).
    pub test_start: NaiveDate,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("data/SPY.csv"),
            ticker: "SPY".into(),
            train_end: NaiveDate::from_ymd_opt(2007, 12, 31).unwrap_or(NaiveDate::MIN),
            test_start: NaiveDate::from_ymd_opt(2008, 1, 1).unwrap_or(NaiveDate::MIN),
        }
    }
}

/// Featurizer and HMM settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub n_states: usize,
    /// Wavelet window in days.
    pub window: usize,
    pub scale: f64,
    pub n_iter: usize,
    pub seed: u64,
    pub tol: f64,
    pub min_covar: f64,
    /// Regime assigned to the middle state when `n_states == 3`.
    pub sideways_regime: Regime,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let fit = FitOptions::default();
        Self {
            n_states: fit.n_states,
            window: 5,
            scale: 5.0,
            n_iter: fit.max_iterations,
            seed: fit.seed,
            tol: fit.tol,
            min_covar: fit.min_covar,
            sideways_regime: Regime::Undesirable,
        }
    }
}

impl ModelConfig {
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            n_states: self.n_states,
            max_iterations: self.n_iter,
            seed: self.seed,
            tol: self.tol,
            min_covar: self.min_covar,
        }
    }

    pub fn featurizer(&self) -> Result<WaveletFeaturizer, FeatureError> {
        WaveletFeaturizer::new(self.window, self.scale)
    }
}

/// Where artifacts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub model_path: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/hmm_model.json"),
            results_dir: PathBuf::from("results"),
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Fail fast on settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.model;
        if !matches!(m.n_states, 2 | 3) {
            return Err(ConfigError::Invalid(format!(
                "n_states must be 2 or 3, got {}",
                m.n_states
            )));
        }
        if m.n_iter == 0 {
            return Err(ConfigError::Invalid("n_iter must be >= 1".into()));
        }
        if !(m.tol.is_finite() && m.tol > 0.0) {
            return Err(ConfigError::Invalid(format!("tol must be > 0, got {}", m.tol)));
        }
        if !(m.min_covar.is_finite() && m.min_covar > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "min_covar must be > 0, got {}",
                m.min_covar
            )));
        }
        m.featurizer()?;
        self.risk.validate()?;
        if self.data.test_start <= self.data.train_end {
            return Err(ConfigError::Invalid(format!(
                "test_start {} must be after train_end {}",
                self.data.test_start, self.data.train_end
            )));
        }
        Ok(())
    }

    /// Deterministic hash of the full configuration.
    ///
    /// Two runs with identical configs share the same id.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)
            .map_err(|e| ConfigError::Invalid(format!("config not serializable: {e}")))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
