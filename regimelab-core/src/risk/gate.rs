//! Two-state (flat / invested) order gate.
//!
//! Desirable regimes pass entries and exits through; undesirable regimes
//! block new entries but still allow exits, so a regime flip never forces
//! an immediate round trip.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::{Action, PortfolioState, Regime, Signal};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    #[error("initial capital must be positive, got {0}")]
    InvalidCapital(f64),

    #[error("max position fraction must be in (0, 1], got {0}")]
    InvalidPositionFraction(f64),

    #[error("stop-loss fraction must be in [0, 1), got {0}")]
    InvalidStopLoss(f64),
}

/// Capital and risk limits for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub initial_capital: f64,
    /// Fraction of cash committed on entry.
    pub max_position_pct: f64,
    /// Fractional loss from entry that forces an exit.
    pub stop_loss_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            max_position_pct: 1.0,
            stop_loss_pct: 0.02,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), RiskError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(RiskError::InvalidCapital(self.initial_capital));
        }
        if !(self.max_position_pct > 0.0 && self.max_position_pct <= 1.0) {
            return Err(RiskError::InvalidPositionFraction(self.max_position_pct));
        }
        if !(self.stop_loss_pct >= 0.0 && self.stop_loss_pct < 1.0) {
            return Err(RiskError::InvalidStopLoss(self.stop_loss_pct));
        }
        Ok(())
    }
}

/// What `execute_order` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub action: Action,
    pub shares: u64,
    pub cost: f64,
    pub proceeds: f64,
}

impl Execution {
    fn none(action: Action) -> Self {
        Self {
            action,
            shares: 0,
            cost: 0.0,
            proceeds: 0.0,
        }
    }

    /// True when shares actually changed hands.
    pub fn filled(&self) -> bool {
        self.shares > 0
    }
}

/// One day's pass through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    /// Regime after any stop-loss override.
    pub regime: Regime,
    /// Raw signal after any stop-loss override.
    pub signal: Signal,
    pub stop_triggered: bool,
    pub action: Action,
    pub execution: Execution,
}

impl GateDecision {
    /// A raw signal was turned into HOLD.
    pub fn blocked(&self) -> bool {
        self.action == Action::Hold
    }
}

/// Refinement table as a pure function of the position state.
///
/// | invested | regime      | signal | action |
/// |----------|-------------|--------|--------|
/// | no       | desirable   | BUY    | BUY    |
/// | yes      | any         | SELL   | SELL   |
/// | no       | undesirable | BUY    | HOLD   |
/// | otherwise                        | HOLD   |
pub fn refine(invested: bool, regime: Regime, signal: Signal) -> Action {
    match (regime, signal, invested) {
        (Regime::Desirable, Signal::Buy, false) => Action::Buy,
        (_, Signal::Sell, true) => Action::Sell,
        _ => Action::Hold,
    }
}

#[derive(Debug, Clone)]
pub struct RiskGate {
    config: RiskConfig,
    portfolio: PortfolioState,
}

impl RiskGate {
    pub fn new(config: RiskConfig) -> Result<Self, RiskError> {
        config.validate()?;
        Ok(Self {
            portfolio: PortfolioState::new(config.initial_capital),
            config,
        })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn portfolio(&self) -> &PortfolioState {
        &self.portfolio
    }

    pub fn is_invested(&self) -> bool {
        self.portfolio.invested
    }

    /// Invested with a known entry and the loss from entry has reached the limit.
    pub fn check_stop_loss(&self, price: f64) -> bool {
        let p = &self.portfolio;
        if !p.invested || p.entry_price <= 0.0 {
            return false;
        }
        (p.entry_price - price) / p.entry_price >= self.config.stop_loss_pct
    }

    pub fn refine_order(&self, regime: Regime, signal: Signal) -> Action {
        refine(self.portfolio.invested, regime, signal)
    }

    /// Apply a refined action at `price`. Mismatched actions are no-ops.
    pub fn execute_order(&mut self, action: Action, price: f64) -> Execution {
        let p = &mut self.portfolio;
        match action {
            Action::Buy if !p.invested => {
                let budget = p.cash * self.config.max_position_pct;
                let shares = if price > 0.0 {
                    (budget / price).floor() as u64
                } else {
                    0
                };
                if shares == 0 {
                    return Execution::none(action);
                }
                let cost = shares as f64 * price;
                p.cash -= cost;
                p.position = shares;
                p.entry_price = price;
                p.invested = true;
                debug!(shares, price, cost, "entered position");
                Execution {
                    action,
                    shares,
                    cost,
                    proceeds: 0.0,
                }
            }
            Action::Sell if p.invested => {
                let shares = p.position;
                let proceeds = shares as f64 * price;
                p.cash += proceeds;
                p.position = 0;
                p.entry_price = 0.0;
                p.invested = false;
                debug!(shares, price, proceeds, "exited position");
                Execution {
                    action,
                    shares,
                    cost: 0.0,
                    proceeds,
                }
            }
            _ => Execution::none(action),
        }
    }

    pub fn total_value(&self, price: f64) -> f64 {
        self.portfolio.total_value(price)
    }

    /// Full daily sequence: stop check, raw signal, override, refine, execute.
    pub fn step(&mut self, regime: Regime, price: f64) -> GateDecision {
        let stop_triggered = self.check_stop_loss(price);
        let (regime, signal) = if stop_triggered {
            (Regime::Undesirable, Signal::Sell)
        } else {
            (regime, regime.signal())
        };
        let action = self.refine_order(regime, signal);
        let execution = self.execute_order(action, price);
        GateDecision {
            regime,
            signal,
            stop_triggered,
            action,
            execution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> RiskGate {
        RiskGate::new(RiskConfig::default()).unwrap()
    }

    #[test]
    fn refinement_table() {
        use Action::*;
        assert_eq!(refine(false, Regime::Desirable, Signal::Buy), Buy);
        assert_eq!(refine(true, Regime::Desirable, Signal::Buy), Hold);
        assert_eq!(refine(true, Regime::Desirable, Signal::Sell), Sell);
        assert_eq!(refine(false, Regime::Desirable, Signal::Sell), Hold);
        assert_eq!(refine(false, Regime::Undesirable, Signal::Buy), Hold);
        assert_eq!(refine(true, Regime::Undesirable, Signal::Buy), Hold);
        assert_eq!(refine(true, Regime::Undesirable, Signal::Sell), Sell);
        assert_eq!(refine(false, Regime::Undesirable, Signal::Sell), Hold);
    }

    #[test]
    fn buy_commits_whole_shares() {
        // Scenario B: 100000 at 250 buys 400 shares.
        let mut g = gate();
        let e = g.execute_order(Action::Buy, 250.0);
        assert_eq!(e.shares, 400);
        assert_eq!(e.cost, 100_000.0);
        let p = g.portfolio();
        assert_eq!(p.cash, 0.0);
        assert_eq!(p.position, 400);
        assert_eq!(p.entry_price, 250.0);
        assert!(p.invested);
        assert_eq!(g.total_value(250.0), 100_000.0);
    }

    #[test]
    fn fractional_budget_leaves_cash() {
        let mut g = gate();
        let e = g.execute_order(Action::Buy, 300.0);
        assert_eq!(e.shares, 333);
        assert!((g.portfolio().cash - 100.0).abs() < 1e-9);
    }

    #[test]
    fn unaffordable_buy_is_noop() {
        let mut g = RiskGate::new(RiskConfig {
            initial_capital: 100.0,
            ..RiskConfig::default()
        })
        .unwrap();
        let e = g.execute_order(Action::Buy, 250.0);
        assert!(!e.filled());
        assert!(!g.is_invested());
        assert_eq!(g.portfolio().cash, 100.0);
    }

    #[test]
    fn stop_loss_forces_exit() {
        // Scenario C: entry 250, price 244.5 is a 2.2% loss.
        let mut g = gate();
        g.execute_order(Action::Buy, 250.0);
        let d = g.step(Regime::Desirable, 244.5);
        assert!(d.stop_triggered);
        assert_eq!(d.signal, Signal::Sell);
        assert_eq!(d.regime, Regime::Undesirable);
        assert_eq!(d.action, Action::Sell);
        assert_eq!(d.execution.proceeds, 97_800.0);
        assert_eq!(g.portfolio().cash, 97_800.0);
        assert!(!g.is_invested());
        assert_eq!(g.portfolio().entry_price, 0.0);
    }

    #[test]
    fn stop_loss_boundary_and_flat_state() {
        let mut g = gate();
        assert!(!g.check_stop_loss(1.0));
        g.execute_order(Action::Buy, 100.0);
        assert!(!g.check_stop_loss(98.5));
        assert!(g.check_stop_loss(98.0));
    }

    #[test]
    fn buy_at_fifty_takes_two_thousand_shares() {
        let mut g = gate();
        let e = g.execute_order(Action::Buy, 50.0);
        assert_eq!(e.shares, 2_000);
        assert_eq!(e.cost, 100_000.0);
        assert_eq!(g.portfolio().cash, 0.0);
        assert_eq!(g.portfolio().position, 2_000);
    }

    #[test]
    fn stop_triggers_at_three_percent_not_one() {
        let mut g = gate();
        g.execute_order(Action::Buy, 100.0);
        assert_eq!(g.portfolio().entry_price, 100.0);
        assert!(g.check_stop_loss(97.0));
        assert!(!g.check_stop_loss(99.0));
    }

    #[test]
    fn undesirable_regime_blocks_entry_without_side_effects() {
        // Flat, bear regime, raw BUY: held, and holding again changes nothing.
        let mut g = gate();
        let before = g.portfolio().clone();
        for _ in 0..2 {
            let action = g.refine_order(Regime::Undesirable, Signal::Buy);
            assert_eq!(action, Action::Hold);
            let e = g.execute_order(action, 50.0);
            assert!(!e.filled());
            assert_eq!(e.shares, 0);
            assert_eq!(g.portfolio(), &before);
        }
        assert!(!g.is_invested());
        assert_eq!(g.total_value(50.0), 100_000.0);
    }

    #[test]
    fn hold_while_invested_leaves_position() {
        let mut g = gate();
        g.execute_order(Action::Buy, 50.0);
        let before = g.portfolio().clone();
        let action = g.refine_order(Regime::Desirable, Signal::Buy);
        assert_eq!(action, Action::Hold);
        g.execute_order(action, 55.0);
        assert_eq!(g.portfolio(), &before);
    }

    #[test]
    fn step_holds_through_repeated_regime() {
        let mut g = gate();
        let first = g.step(Regime::Desirable, 100.0);
        assert_eq!(first.action, Action::Buy);
        let second = g.step(Regime::Desirable, 101.0);
        assert_eq!(second.action, Action::Hold);
        assert!(second.blocked());
        let exit = g.step(Regime::Undesirable, 102.0);
        assert_eq!(exit.action, Action::Sell);
    }

    #[test]
    fn config_validation() {
        let bad = [
            RiskConfig {
                initial_capital: 0.0,
                ..RiskConfig::default()
            },
            RiskConfig {
                max_position_pct: 1.5,
                ..RiskConfig::default()
            },
            RiskConfig {
                stop_loss_pct: 1.0,
                ..RiskConfig::default()
            },
        ];
        for cfg in bad {
            assert!(RiskGate::new(cfg).is_err());
        }
    }
}
