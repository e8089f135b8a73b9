//! DailyBar — one trading day of the return series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One row of the return series: date, adjusted price, simple daily return.
///
/// `daily_return` is `f64::NAN` when undefined (first row, data gaps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub price: f64,
    #[serde(rename = "return")]
    pub daily_return: f64,
}

impl DailyBar {
    pub fn new(date: NaiveDate, price: f64, daily_return: f64) -> Self {
        Self {
            date,
            price,
            daily_return,
        }
    }

    /// True when the return is defined (finite).
    pub fn has_return(&self) -> bool {
        self.daily_return.is_finite()
    }
}

/// Structural problems with a return series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("return series is empty")]
    Empty,

    #[error("dates not strictly increasing at row {index}: {previous} then {current}")]
    NonIncreasingDate {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("invalid price {price} on {date}")]
    InvalidPrice { date: NaiveDate, price: f64 },
}

/// Check the series invariants: non-empty, strictly increasing dates,
/// finite positive prices.
pub fn validate_series(bars: &[DailyBar]) -> Result<(), BarError> {
    if bars.is_empty() {
        return Err(BarError::Empty);
    }
    for (i, bar) in bars.iter().enumerate() {
        if !bar.price.is_finite() || bar.price <= 0.0 {
            return Err(BarError::InvalidPrice {
                date: bar.date,
                price: bar.price,
            });
        }
        if i > 0 && bars[i - 1].date >= bar.date {
            return Err(BarError::NonIncreasingDate {
                index: i,
                previous: bars[i - 1].date,
                current: bar.date,
            });
        }
    }
    Ok(())
}

/// Simple returns from a price series: `p[t] / p[t-1] - 1`, first value NaN.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(prices.len());
    for (i, &p) in prices.iter().enumerate() {
        if i == 0 || prices[i - 1] <= 0.0 {
            out.push(f64::NAN);
        } else {
            out.push(p / prices[i - 1] - 1.0);
        }
    }
    out
}
