//! Per-day backtest output rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use regimelab_core::domain::{Action, Regime, Signal, StateLabel};

/// One tradable test day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub date: NaiveDate,
    pub price: f64,
    /// Daily return; undefined returns are recorded as 0.
    #[serde(rename = "return")]
    pub daily_return: f64,
    /// Energy of the last valid observation in the decoded history.
    pub energy: f64,
    pub state: usize,
    pub label: StateLabel,
    /// Regime after any stop-loss override.
    pub regime: Regime,
    pub raw_signal: Signal,
    pub action: Action,
    pub invested: bool,
    pub position: u64,
    pub cash: f64,
    pub total_value: f64,
    pub stop_triggered: bool,
}

impl ResultRow {
    /// A raw signal was executed as a trade.
    pub fn executed(&self) -> bool {
        self.action.is_trade()
    }

    /// The raw signal was turned into HOLD.
    pub fn blocked(&self) -> bool {
        !self.executed()
    }

    pub fn stop_exit(&self) -> bool {
        self.stop_triggered && self.action == Action::Sell
    }
}
