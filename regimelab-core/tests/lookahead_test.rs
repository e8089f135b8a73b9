//! Look-ahead contamination tests for the feature and decoding path.
//!
//! Invariant: nothing computed for day t may depend on returns from day t+1
//! or later.
//!
//! Method: compute on a truncated series (days 0..150) and on the full series
//! (days 0..300). Assert the overlapping values are identical. Any difference
//! means future data leaked into past values.

use chrono::NaiveDate;
use proptest::prelude::*;
use regimelab_core::domain::DailyBar;
use regimelab_core::features::{ObservationMatrix, WaveletFeaturizer};
use regimelab_core::hmm::{FitOptions, GaussianHmm};

/// Generate N days of synthetic returns with realistic variation.
fn make_test_bars(n: usize) -> Vec<DailyBar> {
    let base_date = NaiveDate::from_ymd_opt(2006, 1, 2).unwrap();
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0;

    for i in 0..n {
        // Deterministic pseudo-random walk using a simple LCG
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        let ret = ((seed >> 40) % 400) as f64 / 10_000.0 - 0.02; // -2% to +2%
        let daily_return = if i == 0 { f64::NAN } else { ret };
        if i > 0 {
            price *= 1.0 + ret;
        }
        bars.push(DailyBar::new(
            base_date + chrono::Duration::days(i as i64),
            price,
            daily_return,
        ));
    }
    bars
}

fn assert_same(truncated: &[f64], full: &[f64], what: &str) {
    for (i, (t, f)) in truncated.iter().zip(full).enumerate() {
        if t.is_nan() && f.is_nan() {
            continue;
        }
        assert!(
            !t.is_nan() && !f.is_nan(),
            "{what}: NaN mismatch at day {i} (truncated={t}, full={f})"
        );
        assert_eq!(t, f, "{what}: look-ahead at day {i}");
    }
}

#[test]
fn wavelet_energy_has_no_lookahead() {
    let bars = make_test_bars(300);
    let returns: Vec<f64> = bars.iter().map(|b| b.daily_return).collect();
    for (window, scale) in [(5, 5.0), (10, 5.0), (20, 2.0), (3, 1.0)] {
        let f = WaveletFeaturizer::new(window, scale).unwrap();
        let full = f.compute(&returns);
        let truncated = f.compute(&returns[..150]);
        assert_eq!(truncated.len(), 150);
        assert_same(&truncated, &full[..150], f.name());
    }
}

#[test]
fn observation_prefix_matches_truncated_build() {
    let bars = make_test_bars(300);
    let f = WaveletFeaturizer::new(5, 5.0).unwrap();
    let full = ObservationMatrix::build(&bars, &f);
    let truncated = ObservationMatrix::build(&bars[..150], &f);
    assert_eq!(full.prefix_through(149), truncated.rows());
}

#[test]
fn decoded_state_uses_only_the_prefix() {
    let bars = make_test_bars(300);
    let f = WaveletFeaturizer::new(5, 5.0).unwrap();
    let obs = ObservationMatrix::build(&bars, &f);
    let (model, _) = GaussianHmm::fit(&obs.rows()[..200], &FitOptions::default()).unwrap();

    // Appending future observations must not change what was decoded "as of" t.
    let as_of = obs.prefix_through(220);
    let state_then = model.current_state(as_of).unwrap();
    let state_again = model.current_state(obs.prefix_through(220)).unwrap();
    assert_eq!(state_then, state_again);

    let extended = obs.prefix_through(299);
    assert!(extended.len() > as_of.len());
    assert_eq!(&extended[..as_of.len()], as_of);
}

proptest! {
    /// Changing any future return leaves every earlier energy untouched.
    #[test]
    fn perturbing_the_future_leaves_the_past(
        cut in 20usize..120,
        bump in -0.05..0.05_f64,
        window in 2usize..12,
    ) {
        let bars = make_test_bars(150);
        let mut returns: Vec<f64> = bars.iter().map(|b| b.daily_return).collect();
        let f = WaveletFeaturizer::new(window, 5.0).unwrap();
        let before = f.compute(&returns);
        for r in returns.iter_mut().skip(cut) {
            *r += bump;
        }
        let after = f.compute(&returns);
        for t in 0..cut {
            prop_assert!(
                before[t] == after[t] || (before[t].is_nan() && after[t].is_nan()),
                "day {} changed", t
            );
        }
    }
}
