//! Deterministic regime-switching series for unit tests.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regimelab_core::domain::DailyBar;

/// Alternating 50-day blocks of calm gains and volatile losses.
pub(crate) fn regime_series(n: usize, seed: u64) -> Vec<DailyBar> {
    let base = NaiveDate::from_ymd_opt(2000, 1, 3).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut noise = move || rng.gen::<f64>() - 0.5;

    let mut price = 100.0;
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let calm = (i / 50) % 2 == 0;
        let r = if calm {
            0.001 + 0.004 * noise()
        } else {
            -0.002 + 0.05 * noise()
        };
        let daily_return = if i == 0 { f64::NAN } else { r };
        if i > 0 {
            price *= 1.0 + r;
        }
        bars.push(DailyBar::new(base + Duration::days(i as i64), price, daily_return));
    }
    bars
}
