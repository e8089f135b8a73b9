//! Seeded k-means initialization for emission means.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Observation, OBS_DIM};

/// Lloyd iterations after k-means++ seeding.
pub const LLOYD_ITERATIONS: usize = 10;

fn sq_dist(a: &Observation, b: &Observation) -> f64 {
    (0..OBS_DIM).map(|d| (a[d] - b[d]).powi(2)).sum()
}

fn nearest(x: &Observation, centers: &[Observation]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centers.iter().enumerate() {
        let d = sq_dist(x, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// k-means++ seeding followed by Lloyd refinement.
///
/// Deterministic for a given `seed`. Requires `rows.len() >= k >= 1`.
pub fn kmeans(rows: &[Observation], k: usize, seed: u64) -> Vec<Observation> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers = Vec::with_capacity(k);
    centers.push(rows[rng.gen_range(0..rows.len())]);

    while centers.len() < k {
        let d2: Vec<f64> = rows.iter().map(|x| nearest(x, &centers).1).collect();
        let total: f64 = d2.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut pick = rows.len() - 1;
            for (i, d) in d2.iter().enumerate() {
                if target < *d {
                    pick = i;
                    break;
                }
                target -= d;
            }
            pick
        } else {
            rng.gen_range(0..rows.len())
        };
        centers.push(rows[next]);
    }

    for _ in 0..LLOYD_ITERATIONS {
        let mut sums = vec![[0.0; OBS_DIM]; k];
        let mut counts = vec![0usize; k];
        for x in rows {
            let (c, _) = nearest(x, &centers);
            counts[c] += 1;
            for d in 0..OBS_DIM {
                sums[c][d] += x[d];
            }
        }
        let mut moved = false;
        for c in 0..k {
            // Empty clusters keep their previous center.
            if counts[c] == 0 {
                continue;
            }
            let mut updated = [0.0; OBS_DIM];
            for d in 0..OBS_DIM {
                updated[d] = sums[c][d] / counts[c] as f64;
            }
            if updated != centers[c] {
                moved = true;
                centers[c] = updated;
            }
        }
        if !moved {
            break;
        }
    }
    centers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Observation> {
        let mut rows = Vec::new();
        for i in 0..20 {
            let e = (i as f64) * 0.01;
            rows.push([-5.0 + e, -5.0 - e]);
            rows.push([5.0 - e, 5.0 + e]);
        }
        rows
    }

    #[test]
    fn separates_well_spaced_blobs() {
        let mut centers = kmeans(&two_blobs(), 2, 42);
        centers.sort_by(|a, b| a[0].total_cmp(&b[0]));
        assert!((centers[0][0] + 4.905).abs() < 1e-9);
        assert!((centers[1][0] - 4.905).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_centers() {
        let rows = two_blobs();
        assert_eq!(kmeans(&rows, 3, 7), kmeans(&rows, 3, 7));
    }

    #[test]
    fn identical_points_still_yield_k_centers() {
        let rows = vec![[1.0, 1.0]; 5];
        let centers = kmeans(&rows, 3, 0);
        assert_eq!(centers.len(), 3);
        assert!(centers.iter().all(|c| *c == [1.0, 1.0]));
    }
}
