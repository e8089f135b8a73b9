//! Domain types for RegimeLab

pub mod bar;
pub mod portfolio;
pub mod regime;

pub use bar::{BarError, DailyBar};
pub use portfolio::PortfolioState;
pub use regime::{Action, Regime, Signal, StateLabel};

/// A single HMM observation: `[return, wavelet_energy]`.
pub type Observation = [f64; OBS_DIM];

/// Number of observation dimensions (return, energy).
pub const OBS_DIM: usize = 2;
