//! Gaussian hidden Markov model over `[return, energy]` observations.
//!
//! - Full-covariance bivariate Gaussian emissions
//! - Scaled forward-backward and Baum-Welch (EM) fitting
//! - Viterbi decoding
//! - Bull/bear state labeling by fitted mean return

pub mod algorithms;
pub mod gaussian;
pub mod init;
pub mod labeling;
pub mod model;
pub mod normalize;

pub use gaussian::Gaussian2;
pub use labeling::{label_states, state_distribution, StateLabeling};
pub use model::{FitOptions, FitReport, GaussianHmm, HmmParams};
pub use normalize::Normalization;

use thiserror::Error;

/// Errors from fitting, decoding, or labeling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HmmError {
    #[error("observation sequence is empty")]
    EmptyObservations,

    #[error("need at least {required} observations to fit {required} states, got {got}")]
    InsufficientObservations { required: usize, got: usize },

    #[error("observation {index} is not finite")]
    NonFiniteObservation { index: usize },

    #[error("feature column {column} has zero variance; cannot normalize")]
    DegenerateFeature { column: usize },

    #[error("state count must be >= 1, got {0}")]
    InvalidStateCount(usize),

    #[error("state labeling supports 2 or 3 states, got {0}")]
    UnsupportedStateCount(usize),

    #[error("covariance matrix is not positive definite (det = {det})")]
    NotPositiveDefinite { det: f64 },

    #[error("invalid model parameters: {0}")]
    InvalidParameters(String),
}
