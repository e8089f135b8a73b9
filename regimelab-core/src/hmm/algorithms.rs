//! Forward-backward, Baum-Welch sufficient statistics, and Viterbi.
//!
//! Forward-backward runs in the scaled (Rabiner) form over emission
//! likelihoods shifted by the per-row maximum log density, so the scale
//! factors absorb the shift and the log-likelihood stays exact.

use ndarray::{Array1, Array2, ArrayViewMut1, Axis};
use rayon::prelude::*;

use super::gaussian::Gaussian2;
use crate::domain::Observation;

/// Rows at or above this length compute emissions in parallel.
const PARALLEL_THRESHOLD: usize = 2_048;

/// `table[[t, k]]` = log density of observation `t` under state `k`.
pub fn emission_log_table(obs: &[Observation], emissions: &[Gaussian2]) -> Array2<f64> {
    let mut table = Array2::<f64>::zeros((obs.len(), emissions.len()));
    if obs.len() >= PARALLEL_THRESHOLD {
        table
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(obs.par_iter())
            .for_each(|(row, x)| fill_log_densities(row, x, emissions));
    } else {
        table
            .axis_iter_mut(Axis(0))
            .zip(obs)
            .for_each(|(row, x)| fill_log_densities(row, x, emissions));
    }
    table
}

fn fill_log_densities(
    mut row: ArrayViewMut1<'_, f64>,
    x: &Observation,
    emissions: &[Gaussian2],
) {
    for (v, g) in row.iter_mut().zip(emissions) {
        *v = g.log_pdf(x);
    }
}

/// Posterior quantities from one forward-backward pass.
#[derive(Debug, Clone)]
pub struct Posteriors {
    /// `gamma[[t, k]]` = P(state_t = k | all observations).
    pub gamma: Array2<f64>,
    /// Expected transition counts summed over time.
    pub xi_sum: Array2<f64>,
    pub log_likelihood: f64,
}

/// Scaled forward-backward over a precomputed emission log table.
pub fn forward_backward(
    start: &Array1<f64>,
    transition: &Array2<f64>,
    log_b: &Array2<f64>,
) -> Posteriors {
    let (n, k) = log_b.dim();
    if n == 0 {
        return Posteriors {
            gamma: Array2::zeros((0, k)),
            xi_sum: Array2::zeros((k, k)),
            log_likelihood: 0.0,
        };
    }
    let (b, shifts) = shifted_likelihoods(log_b);

    let mut alpha = Array2::<f64>::zeros((n, k));
    let mut scale = Array1::<f64>::zeros(n);
    alpha.row_mut(0).assign(&(start * &b.row(0)));
    scale[0] = normalize_row(alpha.row_mut(0));
    for t in 1..n {
        let next = alpha.row(t - 1).dot(transition) * &b.row(t);
        alpha.row_mut(t).assign(&next);
        scale[t] = normalize_row(alpha.row_mut(t));
    }

    let mut beta = Array2::<f64>::ones((n, k));
    for t in (0..n - 1).rev() {
        let weighted = &b.row(t + 1) * &beta.row(t + 1);
        let next = transition.dot(&weighted) / scale[t + 1];
        beta.row_mut(t).assign(&next);
    }

    let mut gamma = &alpha * &beta;
    for row in gamma.rows_mut() {
        normalize_row(row);
    }

    let mut xi_sum = Array2::<f64>::zeros((k, k));
    for t in 0..n - 1 {
        let weighted = &b.row(t + 1) * &beta.row(t + 1);
        let denom = scale[t + 1];
        for i in 0..k {
            for j in 0..k {
                xi_sum[[i, j]] += alpha[[t, i]] * transition[[i, j]] * weighted[j] / denom;
            }
        }
    }

    let log_likelihood = scale
        .iter()
        .zip(&shifts)
        .map(|(c, m)| c.ln() + m)
        .sum();

    Posteriors {
        gamma,
        xi_sum,
        log_likelihood,
    }
}

/// Log-likelihood only (forward pass).
pub fn log_likelihood(start: &Array1<f64>, transition: &Array2<f64>, log_b: &Array2<f64>) -> f64 {
    let mut total = 0.0;
    let mut alpha = Array1::<f64>::zeros(start.len());
    for (t, row) in log_b.rows().into_iter().enumerate() {
        let m = row_max(row.iter());
        let prior = if t == 0 {
            start.clone()
        } else {
            alpha.dot(transition)
        };
        let mut next = prior * &row.mapv(|v| (v - m).exp());
        total += normalize_row(next.view_mut()).ln() + m;
        alpha = next;
    }
    total
}

/// Most likely state path. Ties resolve to the lowest state index.
pub fn viterbi(start: &Array1<f64>, transition: &Array2<f64>, log_b: &Array2<f64>) -> Vec<usize> {
    let (n, k) = log_b.dim();
    if n == 0 {
        return Vec::new();
    }
    let log_trans = transition.mapv(f64::ln);

    let mut delta = start.mapv(f64::ln) + &log_b.row(0);
    let mut back = Array2::<usize>::zeros((n, k));

    for t in 1..n {
        let mut next = Array1::from_elem(k, f64::NEG_INFINITY);
        for j in 0..k {
            let (best_i, best_v) =
                argmax(delta.iter().zip(log_trans.column(j)).map(|(d, a)| d + a));
            back[[t, j]] = best_i;
            next[j] = best_v + log_b[[t, j]];
        }
        delta = next;
    }

    let mut path = vec![0usize; n];
    path[n - 1] = argmax(delta.iter().copied()).0;
    for t in (1..n).rev() {
        path[t - 1] = back[[t, path[t]]];
    }
    path
}

/// Emission likelihoods shifted by each row's maximum log density.
fn shifted_likelihoods(log_b: &Array2<f64>) -> (Array2<f64>, Vec<f64>) {
    let shifts: Vec<f64> = log_b.rows().into_iter().map(|row| row_max(row.iter())).collect();
    let mut b = log_b.clone();
    for (mut row, &m) in b.rows_mut().into_iter().zip(&shifts) {
        row.mapv_inplace(|v| (v - m).exp());
    }
    (b, shifts)
}

fn row_max<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.copied().fold(f64::NEG_INFINITY, f64::max)
}

/// First index of the maximum; NaN never wins.
fn argmax(values: impl Iterator<Item = f64>) -> (usize, f64) {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, v) in values.enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best
}

/// Scale a row to sum 1 and return the pre-normalization sum.
fn normalize_row(mut row: ArrayViewMut1<'_, f64>) -> f64 {
    let sum = row.sum();
    if sum > 0.0 {
        row /= sum;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array};

    fn two_state() -> (Array1<f64>, Array2<f64>, Vec<Gaussian2>) {
        let start = array![0.5, 0.5];
        let trans = array![[0.9, 0.1], [0.2, 0.8]];
        let ems = vec![
            Gaussian2::new([-1.0, 0.0], [[0.25, 0.0], [0.0, 1.0]]).unwrap(),
            Gaussian2::new([1.0, 0.0], [[0.25, 0.0], [0.0, 1.0]]).unwrap(),
        ];
        (start, trans, ems)
    }

    /// Brute-force likelihood by enumerating every path.
    fn brute_force_ll(start: &Array1<f64>, trans: &Array2<f64>, log_b: &Array2<f64>) -> f64 {
        let (n, k) = log_b.dim();
        let mut total = 0.0;
        for code in 0..k.pow(n as u32) {
            let mut path = Vec::with_capacity(n);
            let mut c = code;
            for _ in 0..n {
                path.push(c % k);
                c /= k;
            }
            let mut p = start[path[0]] * log_b[[0, path[0]]].exp();
            for t in 1..n {
                p *= trans[[path[t - 1], path[t]]] * log_b[[t, path[t]]].exp();
            }
            total += p;
        }
        total.ln()
    }

    #[test]
    fn forward_matches_path_enumeration() {
        let (start, trans, ems) = two_state();
        let obs = vec![[-1.2, 0.1], [-0.8, -0.3], [0.9, 0.2], [1.1, 0.0], [-0.2, 0.5]];
        let log_b = emission_log_table(&obs, &ems);
        let expected = brute_force_ll(&start, &trans, &log_b);
        let post = forward_backward(&start, &trans, &log_b);
        assert!((post.log_likelihood - expected).abs() < 1e-9);
        assert!((log_likelihood(&start, &trans, &log_b) - expected).abs() < 1e-9);
    }

    #[test]
    fn posteriors_are_distributions() {
        let (start, trans, ems) = two_state();
        let obs = vec![[-1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [-1.0, 0.0]];
        let log_b = emission_log_table(&obs, &ems);
        let post = forward_backward(&start, &trans, &log_b);
        assert_eq!(post.gamma.dim(), (4, 2));
        for row in post.gamma.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!((post.xi_sum.sum() - (obs.len() - 1) as f64).abs() < 1e-9);
    }

    #[test]
    fn viterbi_follows_clear_signal() {
        let (start, trans, ems) = two_state();
        let obs = vec![[-1.0, 0.0], [-1.1, 0.0], [1.0, 0.0], [0.9, 0.0], [1.2, 0.0]];
        let log_b = emission_log_table(&obs, &ems);
        assert_eq!(viterbi(&start, &trans, &log_b), vec![0, 0, 1, 1, 1]);
    }

    #[test]
    fn viterbi_sticky_transitions_smooth_outlier() {
        let start = array![0.5, 0.5];
        let trans = array![[0.99, 0.01], [0.01, 0.99]];
        let (_, _, ems) = two_state();
        let obs = vec![[-1.0, 0.0], [-1.0, 0.0], [0.1, 0.0], [-1.0, 0.0], [-1.0, 0.0]];
        let log_b = emission_log_table(&obs, &ems);
        assert_eq!(viterbi(&start, &trans, &log_b), vec![0; 5]);
    }

    #[test]
    fn viterbi_ties_pick_lowest_state() {
        let start = array![0.5, 0.5];
        let trans = Array::from_elem((2, 2), 0.5);
        let log_b = Array2::zeros((3, 2));
        assert_eq!(viterbi(&start, &trans, &log_b), vec![0, 0, 0]);
    }

    #[test]
    fn empty_sequence_decodes_to_empty_path() {
        let (start, trans, _) = two_state();
        assert!(viterbi(&start, &trans, &Array2::zeros((0, 2))).is_empty());
        let post = forward_backward(&start, &trans, &Array2::zeros((0, 2)));
        assert_eq!(post.gamma.nrows(), 0);
    }

    #[test]
    fn parallel_table_matches_sequential() {
        let (_, _, ems) = two_state();
        let obs: Vec<Observation> = (0..PARALLEL_THRESHOLD + 10)
            .map(|i| [(i as f64 * 0.37).sin(), (i as f64 * 0.11).cos()])
            .collect();
        let table = emission_log_table(&obs, &ems);
        assert_eq!(table.dim(), (obs.len(), 2));
        for (x, row) in obs.iter().zip(table.rows()) {
            assert_eq!(row[0], ems[0].log_pdf(x));
            assert_eq!(row[1], ems[1].log_pdf(x));
        }
    }
}
