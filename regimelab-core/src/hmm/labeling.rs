//! Bull/bear labeling of fitted states by mean return.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::model::GaussianHmm;
use super::HmmError;
use crate::domain::{Regime, StateLabel};

/// Immutable state index → label mapping, computed once after fitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLabeling {
    labels: Vec<StateLabel>,
}

impl StateLabeling {
    /// Build from per-state mean returns. Ties keep the lower state index first.
    pub fn from_mean_returns(mean_returns: &[f64]) -> Result<Self, HmmError> {
        let k = mean_returns.len();
        let ladder: &[StateLabel] = match k {
            2 => &[StateLabel::Bear, StateLabel::Bull],
            3 => &[StateLabel::Bear, StateLabel::Sideways, StateLabel::Bull],
            _ => return Err(HmmError::UnsupportedStateCount(k)),
        };
        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| mean_returns[a].total_cmp(&mean_returns[b]));

        let mut labels = vec![StateLabel::Bear; k];
        for (rank, &state) in order.iter().enumerate() {
            labels[state] = ladder[rank];
        }
        Ok(Self { labels })
    }

    pub fn n_states(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[StateLabel] {
        &self.labels
    }

    pub fn label(&self, state: usize) -> Option<StateLabel> {
        self.labels.get(state).copied()
    }

    fn find(&self, wanted: StateLabel) -> usize {
        self.labels
            .iter()
            .position(|l| *l == wanted)
            .unwrap_or_default()
    }

    /// State with the highest mean return.
    pub fn bull_state(&self) -> usize {
        self.find(StateLabel::Bull)
    }

    /// State with the lowest mean return.
    pub fn bear_state(&self) -> usize {
        self.find(StateLabel::Bear)
    }

    /// Trading regime for a decoded state. Only the bull state is desirable
    /// unless `sideways` opts the middle state in.
    pub fn regime_for(&self, state: usize, sideways: Regime) -> Regime {
        match self.label(state) {
            Some(StateLabel::Bull) => Regime::Desirable,
            Some(StateLabel::Sideways) => sideways,
            _ => Regime::Undesirable,
        }
    }
}

/// Label a fitted model's states by ascending mean return.
pub fn label_states(model: &GaussianHmm) -> Result<StateLabeling, HmmError> {
    StateLabeling::from_mean_returns(&model.mean_returns())
}

/// Count of days spent in each state.
pub fn state_distribution(states: &[usize]) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for &s in states {
        *counts.entry(s).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_states_bear_then_bull() {
        let l = StateLabeling::from_mean_returns(&[0.001, -0.002]).unwrap();
        assert_eq!(l.labels(), &[StateLabel::Bull, StateLabel::Bear]);
        assert_eq!(l.bull_state(), 0);
        assert_eq!(l.bear_state(), 1);
    }

    #[test]
    fn three_states_include_sideways() {
        let l = StateLabeling::from_mean_returns(&[0.0001, 0.002, -0.003]).unwrap();
        assert_eq!(
            l.labels(),
            &[StateLabel::Sideways, StateLabel::Bull, StateLabel::Bear]
        );
        assert_eq!(l.regime_for(0, Regime::Undesirable), Regime::Undesirable);
        assert_eq!(l.regime_for(0, Regime::Desirable), Regime::Desirable);
        assert_eq!(l.regime_for(1, Regime::Undesirable), Regime::Desirable);
        assert_eq!(l.regime_for(2, Regime::Desirable), Regime::Undesirable);
    }

    #[test]
    fn unsupported_counts_rejected() {
        for k in [1usize, 4, 5] {
            let means = vec![0.0; k];
            assert_eq!(
                StateLabeling::from_mean_returns(&means),
                Err(HmmError::UnsupportedStateCount(k))
            );
        }
    }

    #[test]
    fn out_of_range_state_is_undesirable() {
        let l = StateLabeling::from_mean_returns(&[-0.1, 0.1]).unwrap();
        assert_eq!(l.label(7), None);
        assert_eq!(l.regime_for(7, Regime::Desirable), Regime::Undesirable);
    }

    #[test]
    fn distribution_counts_each_state() {
        let d = state_distribution(&[0, 1, 1, 0, 1]);
        assert_eq!(d.get(&0), Some(&2));
        assert_eq!(d.get(&1), Some(&3));
    }
}
