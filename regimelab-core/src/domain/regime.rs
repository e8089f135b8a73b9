//! Regime vocabulary: state labels, trading regimes, raw signals, actions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic label attached to a fitted HMM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateLabel {
    Bear,
    Sideways,
    Bull,
}

impl fmt::Display for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StateLabel::Bear => "BEAR",
            StateLabel::Sideways => "SIDEWAYS",
            StateLabel::Bull => "BULL",
        };
        f.pad(s)
    }
}

/// Whether today's regime allows new entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Desirable,
    Undesirable,
}

impl Regime {
    /// Raw signal implied by the regime: desirable → BUY, undesirable → SELL.
    pub fn signal(self) -> Signal {
        match self {
            Regime::Desirable => Signal::Buy,
            Regime::Undesirable => Signal::Sell,
        }
    }

    /// Numeric code used in exported results (0 = desirable, 1 = undesirable).
    pub fn code(self) -> u8 {
        match self {
            Regime::Desirable => 0,
            Regime::Undesirable => 1,
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Regime::Desirable => "DESIRABLE",
            Regime::Undesirable => "UNDESIRABLE",
        };
        f.pad(s)
    }
}

/// Raw strategy signal before risk refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
        })
    }
}

/// Refined, executable order action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn is_trade(self) -> bool {
        !matches!(self, Action::Hold)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
        })
    }
}
