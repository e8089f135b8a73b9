//! RegimeLab Runner — configuration, data loading, training, backtest, export.
//!
//! This crate builds on `regimelab-core` to provide:
//! - TOML pipeline configuration with research defaults
//! - CSV loading with validation and dataset fingerprinting
//! - Training stage producing a persisted model bundle
//! - Day-by-day regime-gated backtest with summary metrics
//! - CSV/JSON artifact export

pub mod bundle;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod result;
pub mod runner;
pub mod training;

#[cfg(test)]
mod synthetic;

pub use bundle::{BundleError, ModelBundle, TrainingInfo};
pub use config::{ConfigError, DataConfig, ModelConfig, OutputConfig, PipelineConfig};
pub use data_loader::{load_csv, parse_csv, LoadError, LoadedSeries};
pub use metrics::BacktestMetrics;
pub use result::ResultRow;
pub use runner::{run_backtest, run_pipeline, BacktestResult, PipelineOutcome, RunError};
pub use training::{train_model, TrainError};
