//! PortfolioState — cash, share position, and entry bookkeeping for one run.

use serde::{Deserialize, Serialize};

/// Single-asset, long-only portfolio state.
///
/// The accounting identity holds at every step:
/// `total_value(price) == cash + position * price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub initial_capital: f64,
    pub cash: f64,
    /// Whole shares held.
    pub position: u64,
    /// Fill price of the open position, 0.0 when flat.
    pub entry_price: f64,
    pub invested: bool,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            position: 0,
            entry_price: 0.0,
            invested: false,
        }
    }

    /// Market value of the share position.
    pub fn market_value(&self, price: f64) -> f64 {
        self.position as f64 * price
    }

    /// Total portfolio value = cash + position value.
    pub fn total_value(&self, price: f64) -> f64 {
        self.cash + self.market_value(price)
    }
}
