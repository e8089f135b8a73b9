//! Backtest runner — wires together featurizer, model, risk gate, and metrics.
//!
//! Two entry points:
//! - `run_backtest()`: takes loaded bars and a trained bundle. No I/O.
//! - `run_pipeline()`: loads the CSV named in the config, trains, then backtests.
//!   Used by the CLI `run` command.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use regimelab_core::domain::{DailyBar, StateLabel};
use regimelab_core::features::{FeatureError, ObservationMatrix};
use regimelab_core::hmm::HmmError;
use regimelab_core::risk::{RiskError, RiskGate};

use crate::bundle::{BundleError, ModelBundle};
use crate::config::{ConfigError, PipelineConfig};
use crate::data_loader::{load_csv, test_start_index, LoadError, LoadedSeries};
use crate::metrics::BacktestMetrics;
use crate::result::ResultRow;
use crate::training::{train_model, TrainError};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("training error: {0}")]
    Train(#[from] TrainError),
    #[error("bundle error: {0}")]
    Bundle(#[from] BundleError),
    #[error("feature error: {0}")]
    Feature(#[from] FeatureError),
    #[error("model error: {0}")]
    Hmm(#[from] HmmError),
    #[error("risk error: {0}")]
    Risk(#[from] RiskError),
    #[error("no bars on or after test_start {0}")]
    EmptyTestPeriod(NaiveDate),
    #[error("no test day had at least {window} valid observations")]
    NoTradableDays { window: usize },
}

/// Current schema version for persisted backtest artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub dataset_hash: String,
    pub bundle_id: String,
    /// Test days dropped for insufficient history.
    pub skipped_days: usize,
    pub rows: Vec<ResultRow>,
    pub metrics: BacktestMetrics,
}

impl BacktestResult {
    /// Executed BUY/SELL rows in date order.
    pub fn trades(&self) -> impl Iterator<Item = &ResultRow> {
        self.rows.iter().filter(|r| r.executed())
    }

    pub fn equity_curve(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.total_value).collect()
    }
}

/// Everything `run_pipeline` produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub bundle: ModelBundle,
    pub result: BacktestResult,
}

/// Run the day-by-day backtest over bars from `config.data.test_start` on.
///
/// The feature series starts `window` bars before the first test day so the
/// first test days already have a full wavelet window. Each day decodes the
/// full valid-observation prefix through that day and keeps the last state.
pub fn run_backtest(
    bars: &[DailyBar],
    bundle: &ModelBundle,
    config: &PipelineConfig,
    dataset_hash: &str,
) -> Result<BacktestResult, RunError> {
    let test_start = config.data.test_start;
    let test_idx = test_start_index(bars, test_start).ok_or(RunError::EmptyTestPeriod(test_start))?;

    let window = bundle.training.window;
    let featurizer = bundle.featurizer()?;
    let lookback_start = test_idx.saturating_sub(window);
    let feature_bars = &bars[lookback_start..];
    let obs = ObservationMatrix::build(feature_bars, &featurizer);

    let sideways = config.model.sideways_regime;
    let mut gate = RiskGate::new(config.risk)?;
    let mut rows = Vec::with_capacity(bars.len() - test_idx);
    let mut skipped_days = 0;

    info!(
        start = %bars[test_idx].date,
        days = bars.len() - test_idx,
        bull_state = bundle.bull_state(),
        "running backtest"
    );

    for (offset, bar) in bars[test_idx..].iter().enumerate() {
        let history = obs.prefix_through(test_idx - lookback_start + offset);
        let last = match history.last() {
            Some(last) if history.len() >= window => *last,
            _ => {
                skipped_days += 1;
                continue;
            }
        };

        let state = bundle.model.current_state(history)?;
        let regime = bundle.labeling.regime_for(state, sideways);
        let decision = gate.step(regime, bar.price);
        let portfolio = gate.portfolio();

        rows.push(ResultRow {
            date: bar.date,
            price: bar.price,
            daily_return: if bar.has_return() {
                bar.daily_return
            } else {
                0.0
            },
            energy: last[1],
            state,
            label: bundle.labeling.label(state).unwrap_or(StateLabel::Bear),
            regime: decision.regime,
            raw_signal: decision.signal,
            action: decision.action,
            invested: portfolio.invested,
            position: portfolio.position,
            cash: portfolio.cash,
            total_value: gate.total_value(bar.price),
            stop_triggered: decision.stop_triggered,
        });
    }

    if skipped_days > 0 {
        warn!(skipped_days, window, "test days skipped for insufficient history");
    }
    let (first, last) = match (rows.first(), rows.last()) {
        (Some(f), Some(l)) => (f.date, l.date),
        _ => return Err(RunError::NoTradableDays { window }),
    };

    let metrics = BacktestMetrics::compute(&rows, config.risk.initial_capital);
    info!(
        days = rows.len(),
        final_value = metrics.final_value,
        total_return = metrics.total_return,
        orders_executed = metrics.orders_executed,
        orders_blocked = metrics.orders_blocked,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        ticker: config.data.ticker.clone(),
        start_date: first,
        end_date: last,
        dataset_hash: dataset_hash.to_string(),
        bundle_id: bundle.bundle_id()?,
        skipped_days,
        rows,
        metrics,
    })
}

/// Load the configured CSV, train on the train split, backtest on the test split.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutcome, RunError> {
    config.validate()?;
    let LoadedSeries {
        bars, dataset_hash, ..
    } = load_csv(&config.data.csv_path)?;
    let bundle = train_model(&bars, config, &dataset_hash)?;
    let result = run_backtest(&bars, &bundle, config, &dataset_hash)?;
    Ok(PipelineOutcome { bundle, result })
}
