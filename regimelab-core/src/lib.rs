//! RegimeLab Core — features, HMM regime model, and regime-aware risk gate.
//!
//! This crate contains the numerical heart of the pipeline:
//! - Domain types (daily bars, regimes, signals, actions, portfolio state)
//! - Complex Morlet wavelet energy featurizer and observation matrix
//! - Full-covariance Gaussian HMM: Baum-Welch fitting, Viterbi decoding
//! - State labeling by fitted mean return
//! - Two-state risk gate with stop-loss override

pub mod domain;
pub mod features;
pub mod hmm;
pub mod risk;

pub use domain::{Action, DailyBar, Observation, PortfolioState, Regime, Signal, StateLabel};
pub use features::{ObservationMatrix, WaveletFeaturizer};
pub use hmm::{label_states, FitOptions, FitReport, GaussianHmm, HmmError, StateLabeling};
pub use risk::{GateDecision, RiskConfig, RiskGate};
