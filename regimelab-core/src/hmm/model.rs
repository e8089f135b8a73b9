//! Gaussian HMM fitting (Baum-Welch) and decoding.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::algorithms::{self, emission_log_table};
use super::gaussian::{sample_covariance, Gaussian2};
use super::init::kmeans;
use super::normalize::Normalization;
use super::HmmError;
use crate::domain::Observation;

/// EM settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub n_states: usize,
    pub max_iterations: usize,
    pub seed: u64,
    /// Stop once the log-likelihood gain falls below this.
    pub tol: f64,
    /// Ridge added to covariance diagonals.
    pub min_covar: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            n_states: 2,
            max_iterations: 100,
            seed: 42,
            tol: 1e-2,
            min_covar: 1e-3,
        }
    }
}

impl FitOptions {
    pub fn new(n_states: usize, max_iterations: usize, seed: u64) -> Self {
        Self {
            n_states,
            max_iterations,
            seed,
            ..Self::default()
        }
    }
}

/// Outcome of an EM run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub iterations: usize,
    pub converged: bool,
    pub log_likelihood: f64,
    /// Log-likelihood after each E-step.
    pub history: Vec<f64>,
}

/// Serialized form of [`GaussianHmm`]; parsing goes through
/// [`GaussianHmm::from_parts`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HmmParams {
    pub start: Array1<f64>,
    pub transition: Array2<f64>,
    pub emissions: Vec<Gaussian2>,
    pub normalization: Normalization,
}

/// Fitted K-state Gaussian HMM with its normalization constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HmmParams", into = "HmmParams")]
pub struct GaussianHmm {
    start: Array1<f64>,
    transition: Array2<f64>,
    emissions: Vec<Gaussian2>,
    normalization: Normalization,
}

impl TryFrom<HmmParams> for GaussianHmm {
    type Error = HmmError;

    fn try_from(p: HmmParams) -> Result<Self, Self::Error> {
        Self::from_parts(p.start, p.transition, p.emissions, p.normalization)
    }
}

impl From<GaussianHmm> for HmmParams {
    fn from(m: GaussianHmm) -> Self {
        Self {
            start: m.start,
            transition: m.transition,
            emissions: m.emissions,
            normalization: m.normalization,
        }
    }
}

impl GaussianHmm {
    /// Assemble a model from explicit parameters (emissions in normalized units).
    pub fn from_parts(
        start: Array1<f64>,
        transition: Array2<f64>,
        emissions: Vec<Gaussian2>,
        normalization: Normalization,
    ) -> Result<Self, HmmError> {
        let k = start.len();
        if k == 0 {
            return Err(HmmError::InvalidStateCount(0));
        }
        if transition.dim() != (k, k) || emissions.len() != k {
            let (rows, cols) = transition.dim();
            return Err(HmmError::InvalidParameters(format!(
                "{k} start probabilities but a {rows}x{cols} transition matrix and {} emissions",
                emissions.len()
            )));
        }
        check_distribution("start", start.view())?;
        for (i, row) in transition.rows().into_iter().enumerate() {
            check_distribution(&format!("transition row {i}"), row)?;
        }
        Ok(Self {
            start,
            transition,
            emissions,
            normalization,
        })
    }

    /// Normalize `observations` and fit by Baum-Welch.
    pub fn fit(observations: &[Observation], opts: &FitOptions) -> Result<(Self, FitReport), HmmError> {
        let k = opts.n_states;
        if k == 0 {
            return Err(HmmError::InvalidStateCount(0));
        }
        if opts.max_iterations == 0 {
            return Err(HmmError::InvalidParameters(
                "max_iterations must be at least 1".into(),
            ));
        }
        if observations.is_empty() {
            return Err(HmmError::EmptyObservations);
        }
        check_finite(observations)?;
        if observations.len() < k.max(2) {
            return Err(HmmError::InsufficientObservations {
                required: k.max(2),
                got: observations.len(),
            });
        }

        let normalization = Normalization::fit(observations)?;
        let z = normalization.apply_all(observations);

        let mut model = Self::initial_guess(&z, opts, normalization)?;
        info!(
            n_obs = z.len(),
            n_states = k,
            max_iterations = opts.max_iterations,
            seed = opts.seed,
            "fitting gaussian hmm"
        );

        let mut history = Vec::new();
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..opts.max_iterations {
            let log_b = emission_log_table(&z, &model.emissions);
            let post = algorithms::forward_backward(&model.start, &model.transition, &log_b);
            let ll = post.log_likelihood;
            if !ll.is_finite() {
                return Err(HmmError::InvalidParameters(format!(
                    "log-likelihood became {ll} at iteration {iter}"
                )));
            }
            debug!(iteration = iter, log_likelihood = ll, "em step");

            let gain = history.last().map(|prev| ll - prev);
            history.push(ll);
            iterations = iter + 1;
            if matches!(gain, Some(g) if g < opts.tol) {
                converged = true;
                break;
            }

            model.maximize(&z, &post, opts.min_covar)?;
        }

        let log_likelihood = history.last().copied().unwrap_or_default();
        if converged {
            info!(iterations, log_likelihood, "hmm converged");
        } else {
            warn!(
                iterations,
                log_likelihood, "hmm did not converge within the iteration cap"
            );
        }

        Ok((
            model,
            FitReport {
                iterations,
                converged,
                log_likelihood,
                history,
            },
        ))
    }

    fn initial_guess(
        z: &[Observation],
        opts: &FitOptions,
        normalization: Normalization,
    ) -> Result<Self, HmmError> {
        let k = opts.n_states;
        let centers = kmeans(z, k, opts.seed);
        let mut cov = sample_covariance(z);
        for (d, row) in cov.iter_mut().enumerate() {
            row[d] += opts.min_covar;
        }
        let emissions = centers
            .into_iter()
            .map(|c| Gaussian2::new(c, cov))
            .collect::<Result<Vec<_>, _>>()?;
        let uniform = 1.0 / k as f64;
        Ok(Self {
            start: Array1::from_elem(k, uniform),
            transition: Array2::from_elem((k, k), uniform),
            emissions,
            normalization,
        })
    }

    fn maximize(
        &mut self,
        z: &[Observation],
        post: &algorithms::Posteriors,
        min_covar: f64,
    ) -> Result<(), HmmError> {
        let k = self.n_states();

        let first = post.gamma.row(0);
        self.start = &first / first.sum();

        for (i, row) in post.xi_sum.rows().into_iter().enumerate() {
            let total = row.sum();
            // A state never left keeps its previous row.
            if total > 0.0 {
                self.transition.row_mut(i).assign(&(&row / total));
            }
        }

        for s in 0..k {
            let column = post.gamma.column(s);
            let estimate = Gaussian2::weighted_estimate(z, column.iter().copied(), min_covar);
            if let Some(updated) = estimate {
                self.emissions[s] = updated?;
            }
        }
        Ok(())
    }

    pub fn n_states(&self) -> usize {
        self.start.len()
    }

    pub fn start(&self) -> &Array1<f64> {
        &self.start
    }

    pub fn transition(&self) -> &Array2<f64> {
        &self.transition
    }

    pub fn emissions(&self) -> &[Gaussian2] {
        &self.emissions
    }

    pub fn normalization(&self) -> &Normalization {
        &self.normalization
    }

    /// Per-state means in raw (unnormalized) feature units.
    pub fn means(&self) -> Vec<Observation> {
        self.emissions
            .iter()
            .map(|g| self.normalization.invert(g.mean()))
            .collect()
    }

    /// Per-state mean return in raw units.
    pub fn mean_returns(&self) -> Vec<f64> {
        self.means().iter().map(|m| m[0]).collect()
    }

    fn prepare(&self, observations: &[Observation]) -> Result<Array2<f64>, HmmError> {
        if observations.is_empty() {
            return Err(HmmError::EmptyObservations);
        }
        check_finite(observations)?;
        let z = self.normalization.apply_all(observations);
        Ok(emission_log_table(&z, &self.emissions))
    }

    /// Most likely state path over the full history given.
    pub fn infer(&self, observations: &[Observation]) -> Result<Vec<usize>, HmmError> {
        let log_b = self.prepare(observations)?;
        Ok(algorithms::viterbi(&self.start, &self.transition, &log_b))
    }

    /// State assigned to the last observation after decoding the whole history.
    pub fn current_state(&self, observations: &[Observation]) -> Result<usize, HmmError> {
        let path = self.infer(observations)?;
        path.last().copied().ok_or(HmmError::EmptyObservations)
    }

    /// Log-likelihood of the normalized observations.
    pub fn log_likelihood(&self, observations: &[Observation]) -> Result<f64, HmmError> {
        let log_b = self.prepare(observations)?;
        Ok(algorithms::log_likelihood(&self.start, &self.transition, &log_b))
    }

    /// Per-time-step posterior state probabilities.
    pub fn posteriors(&self, observations: &[Observation]) -> Result<Array2<f64>, HmmError> {
        let log_b = self.prepare(observations)?;
        Ok(algorithms::forward_backward(&self.start, &self.transition, &log_b).gamma)
    }
}

fn check_finite(observations: &[Observation]) -> Result<(), HmmError> {
    match observations
        .iter()
        .position(|row| row.iter().any(|v| !v.is_finite()))
    {
        Some(index) => Err(HmmError::NonFiniteObservation { index }),
        None => Ok(()),
    }
}

fn check_distribution(what: &str, probs: ArrayView1<'_, f64>) -> Result<(), HmmError> {
    if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(HmmError::InvalidParameters(format!(
            "{what} contains a negative or non-finite probability"
        )));
    }
    let sum = probs.sum();
    if (sum - 1.0).abs() > 1e-6 {
        return Err(HmmError::InvalidParameters(format!(
            "{what} sums to {sum}, expected 1"
        )));
    }
    Ok(())
}
