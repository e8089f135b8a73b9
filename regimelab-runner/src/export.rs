//! Reporting and export — JSON and CSV artifact generation.
//!
//! A backtest writes three artifacts into the results directory:
//! - `results.csv`: one row per test day in date order
//! - `metrics.json`: summary metrics
//! - `manifest.json`: config, dataset hash, and model bundle id
//!
//! All persisted JSON includes a `schema_version` field. Unknown versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::metrics::BacktestMetrics;
use crate::result::ResultRow;
use crate::runner::{BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

pub fn export_metrics_json(metrics: &BacktestMetrics) -> Result<String> {
    serde_json::to_string_pretty(metrics).context("failed to serialize metrics to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export result rows as CSV.
///
/// Columns: date, price, return, energy, state, label, regime, raw_signal,
/// action, invested, position, cash, total_value, stop_triggered.
/// `regime` is written as its numeric code (0 = desirable, 1 = undesirable).
pub fn export_results_csv(rows: &[ResultRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "date",
        "price",
        "return",
        "energy",
        "state",
        "label",
        "regime",
        "raw_signal",
        "action",
        "invested",
        "position",
        "cash",
        "total_value",
        "stop_triggered",
    ])?;

    for r in rows {
        wtr.write_record([
            &r.date.to_string(),
            &format!("{:.6}", r.price),
            &format!("{:.8}", r.daily_return),
            &format!("{:.10}", r.energy),
            &r.state.to_string(),
            &r.label.to_string(),
            &r.regime.code().to_string(),
            &r.raw_signal.to_string(),
            &r.action.to_string(),
            &r.invested.to_string(),
            &r.position.to_string(),
            &format!("{:.2}", r.cash),
            &format!("{:.2}", r.total_value),
            &r.stop_triggered.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Manifest ───────────────────────────────────────────────────────

/// Provenance for a results directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub run_id: String,
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub trading_days: usize,
    pub skipped_days: usize,
    pub dataset_hash: String,
    pub bundle_id: String,
    pub config: PipelineConfig,
}

impl Manifest {
    pub fn new(result: &BacktestResult, config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            schema_version: SCHEMA_VERSION,
            run_id: config.run_id()?,
            ticker: result.ticker.clone(),
            start_date: result.start_date,
            end_date: result.end_date,
            trading_days: result.rows.len(),
            skipped_days: result.skipped_days,
            dataset_hash: result.dataset_hash.clone(),
            bundle_id: result.bundle_id.clone(),
            config: config.clone(),
        })
    }
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a backtest run into `output_dir`.
///
/// Creates the directory if needed and writes `results.csv`, `metrics.json`
/// and `manifest.json`. Returns the directory path.
pub fn save_artifacts(
    result: &BacktestResult,
    config: &PipelineConfig,
    output_dir: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create results dir: {}", output_dir.display()))?;

    let results_csv = export_results_csv(&result.rows)?;
    std::fs::write(output_dir.join("results.csv"), results_csv)?;

    let metrics = export_metrics_json(&result.metrics)?;
    std::fs::write(output_dir.join("metrics.json"), metrics)?;

    let manifest = serde_json::to_string_pretty(&Manifest::new(result, config)?)
        .context("failed to serialize manifest")?;
    std::fs::write(output_dir.join("manifest.json"), manifest)?;

    Ok(output_dir.to_path_buf())
}
