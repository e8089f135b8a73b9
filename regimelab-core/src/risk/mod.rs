//! Regime-aware risk gate: order refinement, execution, and stop-loss.

pub mod gate;

pub use gate::{refine, Execution, GateDecision, RiskConfig, RiskError, RiskGate};
