//! Per-column z-normalization constants that travel with a fitted model.

use serde::{Deserialize, Serialize};

use super::HmmError;
use crate::domain::{Observation, OBS_DIM};
use crate::features::observation::column_stats;

/// Mean and standard deviation per observation column, computed on the
/// fitting sample and reapplied unchanged at inference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: [f64; OBS_DIM],
    pub std: [f64; OBS_DIM],
}

impl Normalization {
    /// Identity transform (mean 0, std 1).
    pub fn identity() -> Self {
        Self {
            mean: [0.0; OBS_DIM],
            std: [1.0; OBS_DIM],
        }
    }

    /// Fit on a sample. Fails on an empty sample or a zero-variance column.
    pub fn fit(rows: &[Observation]) -> Result<Self, HmmError> {
        if rows.is_empty() {
            return Err(HmmError::EmptyObservations);
        }
        let (mean, std) = column_stats(rows);
        for (column, s) in std.iter().enumerate() {
            if !s.is_finite() || *s <= 0.0 {
                return Err(HmmError::DegenerateFeature { column });
            }
        }
        Ok(Self { mean, std })
    }

    pub fn apply(&self, row: &Observation) -> Observation {
        let mut out = [0.0; OBS_DIM];
        for d in 0..OBS_DIM {
            out[d] = (row[d] - self.mean[d]) / self.std[d];
        }
        out
    }

    pub fn invert(&self, row: &Observation) -> Observation {
        let mut out = [0.0; OBS_DIM];
        for d in 0..OBS_DIM {
            out[d] = row[d] * self.std[d] + self.mean[d];
        }
        out
    }

    pub fn apply_all(&self, rows: &[Observation]) -> Vec<Observation> {
        rows.iter().map(|r| self.apply(r)).collect()
    }
}
