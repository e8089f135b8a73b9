//! Return-series loading for the pipeline.
//!
//! Reads a daily CSV with a date column, a price column, and an optional
//! `return` column:
//! 1. Date: `Date` or `date` (`YYYY-MM-DD`, a trailing time part is ignored)
//! 2. Price: first of `Adj Close`, `adj_close`, `Close`, `close`
//! 3. Return: `return` if present (empty or `nan` → undefined), otherwise
//!    derived from price as `p[t] / p[t-1] - 1`
//!
//! The loaded series is validated (strictly increasing dates, positive
//! prices) and fingerprinted with BLAKE3.

use chrono::NaiveDate;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use regimelab_core::domain::bar::{simple_returns, validate_series};
use regimelab_core::domain::{BarError, DailyBar};

const DATE_COLUMNS: &[&str] = &["Date", "date"];
const PRICE_COLUMNS: &[&str] = &["Adj Close", "adj_close", "Close", "close"];
const RETURN_COLUMN: &str = "return";

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Open { path: PathBuf, source: csv::Error },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing {what} column (expected one of: {expected})")]
    MissingColumn { what: &'static str, expected: String },

    #[error("row {row}: invalid date '{value}'")]
    InvalidDate { row: usize, value: String },

    #[error("row {row}: invalid {column} '{value}'")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("invalid series: {0}")]
    Series(#[from] BarError),
}

/// A validated daily return series with provenance.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub bars: Vec<DailyBar>,
    /// Dataset hash for fingerprinting (BLAKE3 over all bar data).
    pub dataset_hash: String,
    /// True when returns were computed from prices.
    pub derived_returns: bool,
}

impl LoadedSeries {
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

/// Load and validate a CSV file.
pub fn load_csv(path: &Path) -> Result<LoadedSeries, LoadError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let series = read_series(reader)?;
    info!(
        path = %path.display(),
        rows = series.bars.len(),
        derived_returns = series.derived_returns,
        "loaded return series"
    );
    Ok(series)
}

/// Parse CSV text from any reader.
pub fn parse_csv<R: Read>(input: R) -> Result<LoadedSeries, LoadError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);
    read_series(reader)
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|name| headers.iter().position(|h| h == *name))
}

fn read_series<R: Read>(mut reader: csv::Reader<R>) -> Result<LoadedSeries, LoadError> {
    let headers = reader.headers()?.clone();
    let date_col = find_column(&headers, DATE_COLUMNS).ok_or_else(|| LoadError::MissingColumn {
        what: "date",
        expected: DATE_COLUMNS.join(", "),
    })?;
    let price_col =
        find_column(&headers, PRICE_COLUMNS).ok_or_else(|| LoadError::MissingColumn {
            what: "price",
            expected: PRICE_COLUMNS.join(", "),
        })?;
    let return_col = find_column(&headers, &[RETURN_COLUMN]);

    let mut bars = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let row = i + 2;
        let raw_date = record.get(date_col).unwrap_or("");
        let date = parse_date(raw_date).ok_or_else(|| LoadError::InvalidDate {
            row,
            value: raw_date.to_string(),
        })?;

        let raw_price = record.get(price_col).unwrap_or("");
        let price = raw_price
            .parse::<f64>()
            .map_err(|_| LoadError::InvalidNumber {
                row,
                column: headers[price_col].to_string(),
                value: raw_price.to_string(),
            })?;

        let daily_return = match return_col {
            Some(col) => parse_optional(record.get(col).unwrap_or("")).ok_or_else(|| {
                LoadError::InvalidNumber {
                    row,
                    column: RETURN_COLUMN.to_string(),
                    value: record.get(col).unwrap_or("").to_string(),
                }
            })?,
            None => f64::NAN,
        };
        bars.push(DailyBar::new(date, price, daily_return));
    }

    validate_series(&bars)?;

    let derived_returns = return_col.is_none();
    if derived_returns {
        let prices: Vec<f64> = bars.iter().map(|b| b.price).collect();
        for (bar, r) in bars.iter_mut().zip(simple_returns(&prices)) {
            bar.daily_return = r;
        }
    }

    let dataset_hash = compute_dataset_hash(&bars);
    Ok(LoadedSeries {
        bars,
        dataset_hash,
        derived_returns,
    })
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Empty or NaN-like cells are undefined returns; anything else must parse.
fn parse_optional(value: &str) -> Option<f64> {
    if value.is_empty() || value.eq_ignore_ascii_case("nan") || value.eq_ignore_ascii_case("null")
    {
        return Some(f64::NAN);
    }
    value.parse::<f64>().ok()
}

/// BLAKE3 over every bar's date, price, and return bits.
pub fn compute_dataset_hash(bars: &[DailyBar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.price.to_le_bytes());
        hasher.update(&bar.daily_return.to_bits().to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Bars on or before `train_end`.
pub fn train_slice(bars: &[DailyBar], train_end: NaiveDate) -> &[DailyBar] {
    let end = bars.partition_point(|b| b.date <= train_end);
    &bars[..end]
}

/// Index of the first bar on or after `test_start`, if any.
pub fn test_start_index(bars: &[DailyBar], test_start: NaiveDate) -> Option<usize> {
    let idx = bars.partition_point(|b| b.date < test_start);
    (idx < bars.len()).then_some(idx)
}
