//! Bivariate Gaussian emission with full covariance.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::HmmError;
use crate::domain::{Observation, OBS_DIM};

/// 2x2 covariance matrix, row-major.
pub type Covariance = [[f64; OBS_DIM]; OBS_DIM];

/// Serialized form: mean and covariance only; the inverse and log-determinant
/// are recomputed on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianParams {
    pub mean: Observation,
    pub covariance: Covariance,
}

/// Full-covariance bivariate normal with cached inverse and log-determinant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GaussianParams", into = "GaussianParams")]
pub struct Gaussian2 {
    mean: Observation,
    covariance: Covariance,
    precision: Covariance,
    log_det: f64,
}

impl Gaussian2 {
    /// Fails unless the covariance is symmetric positive definite.
    pub fn new(mean: Observation, covariance: Covariance) -> Result<Self, HmmError> {
        let [[a, b], [c, d]] = covariance;
        if (b - c).abs() > 1e-9 * (1.0 + b.abs().max(c.abs())) {
            return Err(HmmError::InvalidParameters(format!(
                "covariance not symmetric: {b} vs {c}"
            )));
        }
        let det = a * d - b * c;
        if !(det.is_finite() && det > 0.0 && a > 0.0) {
            return Err(HmmError::NotPositiveDefinite { det });
        }
        let precision = [[d / det, -b / det], [-c / det, a / det]];
        Ok(Self {
            mean,
            covariance,
            precision,
            log_det: det.ln(),
        })
    }

    pub fn mean(&self) -> &Observation {
        &self.mean
    }

    pub fn covariance(&self) -> &Covariance {
        &self.covariance
    }

    /// Log density at `x`.
    pub fn log_pdf(&self, x: &Observation) -> f64 {
        let dx = [x[0] - self.mean[0], x[1] - self.mean[1]];
        let p = &self.precision;
        let quad = dx[0] * (p[0][0] * dx[0] + p[0][1] * dx[1])
            + dx[1] * (p[1][0] * dx[0] + p[1][1] * dx[1]);
        -0.5 * (OBS_DIM as f64 * (2.0 * PI).ln() + self.log_det + quad)
    }

    /// Weighted maximum-likelihood estimate with a diagonal ridge.
    ///
    /// Returns `None` when the total weight is negligible.
    pub fn weighted_estimate(
        rows: &[Observation],
        weights: impl Iterator<Item = f64> + Clone,
        min_covar: f64,
    ) -> Option<Result<Self, HmmError>> {
        let total: f64 = weights.clone().sum();
        if total.is_nan() || total <= 1e-10 {
            return None;
        }

        let mut mean = [0.0; OBS_DIM];
        for (row, w) in rows.iter().zip(weights.clone()) {
            for d in 0..OBS_DIM {
                mean[d] += w * row[d];
            }
        }
        for m in &mut mean {
            *m /= total;
        }

        let mut cov = [[0.0; OBS_DIM]; OBS_DIM];
        for (row, w) in rows.iter().zip(weights) {
            let dx = [row[0] - mean[0], row[1] - mean[1]];
            for i in 0..OBS_DIM {
                for j in 0..OBS_DIM {
                    cov[i][j] += w * dx[i] * dx[j];
                }
            }
        }
        for (i, cov_row) in cov.iter_mut().enumerate() {
            for v in cov_row.iter_mut() {
                *v /= total;
            }
            cov_row[i] += min_covar;
        }
        // Enforce exact symmetry lost to rounding.
        let off = 0.5 * (cov[0][1] + cov[1][0]);
        cov[0][1] = off;
        cov[1][0] = off;

        Some(Self::new(mean, cov))
    }
}

impl TryFrom<GaussianParams> for Gaussian2 {
    type Error = HmmError;

    fn try_from(p: GaussianParams) -> Result<Self, Self::Error> {
        Gaussian2::new(p.mean, p.covariance)
    }
}

impl From<Gaussian2> for GaussianParams {
    fn from(g: Gaussian2) -> Self {
        GaussianParams {
            mean: g.mean,
            covariance: g.covariance,
        }
    }
}

/// Sample covariance (ddof = 1) of a set of observations.
pub fn sample_covariance(rows: &[Observation]) -> Covariance {
    let n = rows.len();
    let mut cov = [[0.0; OBS_DIM]; OBS_DIM];
    if n < 2 {
        return cov;
    }
    let mut mean = [0.0; OBS_DIM];
    for row in rows {
        for d in 0..OBS_DIM {
            mean[d] += row[d];
        }
    }
    for m in &mut mean {
        *m /= n as f64;
    }
    for row in rows {
        for i in 0..OBS_DIM {
            for j in 0..OBS_DIM {
                cov[i][j] += (row[i] - mean[i]) * (row[j] - mean[j]);
            }
        }
    }
    for r in &mut cov {
        for v in r.iter_mut() {
            *v /= (n - 1) as f64;
        }
    }
    cov
}
