//! Performance metrics — pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or result rows in,
//! scalar out. No dependencies on the runner loop or data pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use regimelab_core::domain::Action;

use crate::result::ResultRow;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub buy_hold_return: f64,
    pub excess_return: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub trading_days: usize,
    pub num_buys: usize,
    pub num_sells: usize,
    pub num_holds: usize,
    pub orders_executed: usize,
    pub orders_blocked: usize,
    pub stop_loss_exits: usize,
    /// Fraction of result days ending invested.
    pub time_invested: f64,
    /// Fraction of days per regime name.
    pub regime_distribution: BTreeMap<String, f64>,
    /// Days per decoded state.
    pub state_distribution: BTreeMap<usize, usize>,
}

impl BacktestMetrics {
    /// Compute all metrics from the result rows.
    pub fn compute(rows: &[ResultRow], initial_capital: f64) -> Self {
        let equity: Vec<f64> = rows.iter().map(|r| r.total_value).collect();
        let prices: Vec<f64> = rows.iter().map(|r| r.price).collect();
        let final_value = equity.last().copied().unwrap_or(initial_capital);
        let total = return_vs_capital(final_value, initial_capital);
        let buy_hold = buy_and_hold_return(&prices);

        let count = |a: Action| rows.iter().filter(|r| r.action == a).count();
        let num_buys = count(Action::Buy);
        let num_sells = count(Action::Sell);
        let num_holds = count(Action::Hold);

        Self {
            initial_capital,
            final_value,
            total_return: total,
            buy_hold_return: buy_hold,
            excess_return: total - buy_hold,
            sharpe: sharpe_ratio(&equity, 0.0),
            max_drawdown: max_drawdown(&equity),
            win_rate: win_rate(&equity),
            trading_days: rows.len(),
            num_buys,
            num_sells,
            num_holds,
            orders_executed: rows.iter().filter(|r| r.executed()).count(),
            orders_blocked: rows.iter().filter(|r| r.blocked()).count(),
            stop_loss_exits: rows.iter().filter(|r| r.stop_exit()).count(),
            time_invested: fraction(rows.iter().filter(|r| r.invested).count(), rows.len()),
            regime_distribution: regime_distribution(rows),
            state_distribution: state_distribution(rows),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Return relative to starting capital: (final - initial) / initial.
pub fn return_vs_capital(final_value: f64, initial_capital: f64) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }
    (final_value - initial_capital) / initial_capital
}

/// Buy-and-hold return from the first to the last price.
pub fn buy_and_hold_return(prices: &[f64]) -> f64 {
    match (prices.first(), prices.last()) {
        (Some(&first), Some(&last)) if prices.len() >= 2 && first > 0.0 => (last - first) / first,
        _ => 0.0,
    }
}

/// Annualized Sharpe ratio from daily returns.
///
/// Sharpe = mean(daily returns - rf) / std(daily returns) * sqrt(252).
/// Returns 0.0 if variance is zero or fewer than 2 days.
pub fn sharpe_ratio(equity_curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * (252.0_f64).sqrt()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Win rate: fraction of daily strategy returns that were positive.
pub fn win_rate(equity_curve: &[f64]) -> f64 {
    let returns = daily_returns(equity_curve);
    fraction(returns.iter().filter(|&&r| r > 0.0).count(), returns.len())
}

/// Share of days per regime, keyed by regime name.
pub fn regime_distribution(rows: &[ResultRow]) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for r in rows {
        *counts.entry(r.regime.to_string()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(k, c)| (k, fraction(c, rows.len())))
        .collect()
}

/// Days per decoded state.
pub fn state_distribution(rows: &[ResultRow]) -> BTreeMap<usize, usize> {
    let states: Vec<usize> = rows.iter().map(|r| r.state).collect();
    regimelab_core::hmm::state_distribution(&states)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Compute daily returns from an equity curve.
pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    if equity_curve.len() < 2 {
        return Vec::new();
    }
    equity_curve
        .windows(2)
        .map(|w| {
            if w[0] > 0.0 {
                (w[1] - w[0]) / w[0]
            } else {
                0.0
            }
        })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn fraction(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
