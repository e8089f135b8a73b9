//! Complex Morlet mother wavelet and its integrated, scale-resampled filter.
//!
//! Follows the usual integrated-wavelet CWT convention: the mother wavelet is
//! sampled on `2^10` points over `[-8, 8]`, integrated with a cumulative sum,
//! then resampled at the requested scale and convolved with the signal.

use num_complex::Complex64;
use std::f64::consts::PI;

/// Sampling precision exponent: the wavelet table has `2^PRECISION` points.
pub const PRECISION: u32 = 10;

/// Support of the sampled wavelet.
pub const LOWER_BOUND: f64 = -8.0;
pub const UPPER_BOUND: f64 = 8.0;

/// Complex Morlet wavelet `cmorB-C`.
///
/// `psi(x) = (pi * B)^(-1/2) * exp(-x^2 / B) * exp(2 pi i C x)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexMorlet {
    /// Bandwidth `B`.
    pub bandwidth: f64,
    /// Center frequency `C`.
    pub center_frequency: f64,
}

impl ComplexMorlet {
    pub fn new(bandwidth: f64, center_frequency: f64) -> Self {
        Self {
            bandwidth,
            center_frequency,
        }
    }

    /// `cmor1.5-1.0`, the wavelet used for the energy feature.
    pub fn standard() -> Self {
        Self::new(1.5, 1.0)
    }

    pub fn name(&self) -> String {
        format!("cmor{}-{}", self.bandwidth, self.center_frequency)
    }

    /// Evaluate the mother wavelet at `x`.
    pub fn psi(&self, x: f64) -> Complex64 {
        let envelope = (PI * self.bandwidth).sqrt().recip() * (-(x * x) / self.bandwidth).exp();
        let phase = 2.0 * PI * self.center_frequency * x;
        Complex64::new(envelope * phase.cos(), envelope * phase.sin())
    }

    /// Sample the wavelet on the standard grid and integrate it.
    pub fn integrate(&self) -> IntegratedWavelet {
        let n = 1usize << PRECISION;
        let grid = linspace(LOWER_BOUND, UPPER_BOUND, n);
        let step = grid[1] - grid[0];

        let mut acc = Complex64::new(0.0, 0.0);
        let values = grid
            .iter()
            .map(|&x| {
                acc += self.psi(x);
                acc * step
            })
            .collect();

        IntegratedWavelet {
            values,
            step,
            span: grid[n - 1] - grid[0],
        }
    }
}

/// Cumulative integral of a sampled mother wavelet.
#[derive(Debug, Clone)]
pub struct IntegratedWavelet {
    values: Vec<Complex64>,
    step: f64,
    span: f64,
}

impl IntegratedWavelet {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Convolution filter for one scale: the integrated wavelet resampled at
    /// `k / (scale * step)`, conjugated and reversed.
    pub fn filter(&self, scale: f64) -> Vec<Complex64> {
        // Same element count as a float `arange(scale * span + 1)`.
        let count = (scale * self.span + 1.0).ceil().max(0.0) as usize;
        let denom = scale * self.step;

        let mut taps: Vec<Complex64> = (0..count)
            .map(|k| (k as f64 / denom) as usize)
            .take_while(|&j| j < self.values.len())
            .map(|j| self.values[j].conj())
            .collect();
        taps.reverse();
        taps
    }
}

/// `n` evenly spaced points from `start` to `stop` inclusive, last point exact.
fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![start];
    }
    let delta = (stop - start) / (n - 1) as f64;
    let mut out: Vec<f64> = (0..n).map(|i| i as f64 * delta + start).collect();
    out[n - 1] = stop;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_endpoints_are_exact() {
        let g = linspace(-8.0, 8.0, 1024);
        assert_eq!(g.len(), 1024);
        assert_eq!(g[0], -8.0);
        assert_eq!(g[1023], 8.0);
    }

    #[test]
    fn psi_peaks_at_origin() {
        let w = ComplexMorlet::standard();
        let at_zero = w.psi(0.0).norm();
        assert!(at_zero > w.psi(1.0).norm());
        assert!((at_zero - (PI * 1.5).sqrt().recip()).abs() < 1e-12);
    }

    #[test]
    fn integrated_table_has_full_precision() {
        let table = ComplexMorlet::standard().integrate();
        assert_eq!(table.len(), 1024);
        assert!((table.step() - 16.0 / 1023.0).abs() < 1e-12);
    }

    #[test]
    fn integral_of_admissible_wavelet_vanishes() {
        // A Morlet with C=1 has (numerically) zero mean, so the full integral is ~0.
        let table = ComplexMorlet::standard().integrate();
        let last = table.values[table.len() - 1];
        assert!(last.norm() < 1e-5, "integral = {last}");
    }

    #[test]
    fn filter_length_scales_with_scale() {
        let table = ComplexMorlet::standard().integrate();
        assert_eq!(table.filter(5.0).len(), 81);
        assert_eq!(table.filter(1.0).len(), 17);
    }

    #[test]
    fn name_formats_parameters() {
        assert_eq!(ComplexMorlet::standard().name(), "cmor1.5-1");
    }
}
