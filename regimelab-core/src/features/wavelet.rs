//! Causal rolling wavelet-energy feature.
//!
//! For each day t the transform sees only the window `[t - W + 1, t]`, and the
//! feature is `|W_t|^2` of the right-most CWT coefficient. No value at day t
//! may depend on returns after day t.

use num_complex::Complex64;
use thiserror::Error;

use super::morlet::ComplexMorlet;

/// Invalid featurizer parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("wavelet window must be >= 1, got {0}")]
    InvalidWindow(usize),

    #[error("wavelet scale must be finite and > 0, got {0}")]
    InvalidScale(f64),

    #[error("wavelet scale {0} too small: filter has fewer than 2 taps")]
    ScaleTooSmall(f64),
}

/// Rolling right-edge complex Morlet energy.
#[derive(Debug, Clone)]
pub struct WaveletFeaturizer {
    window: usize,
    scale: f64,
    wavelet: ComplexMorlet,
    filter: Vec<Complex64>,
    name: String,
}

impl WaveletFeaturizer {
    /// Featurizer with the standard `cmor1.5-1.0` wavelet.
    pub fn new(window: usize, scale: f64) -> Result<Self, FeatureError> {
        Self::with_wavelet(window, scale, ComplexMorlet::standard())
    }

    pub fn with_wavelet(
        window: usize,
        scale: f64,
        wavelet: ComplexMorlet,
    ) -> Result<Self, FeatureError> {
        if window == 0 {
            return Err(FeatureError::InvalidWindow(window));
        }
        if !scale.is_finite() || scale <= 0.0 {
            return Err(FeatureError::InvalidScale(scale));
        }
        let filter = wavelet.integrate().filter(scale);
        if filter.len() < 2 {
            return Err(FeatureError::ScaleTooSmall(scale));
        }
        Ok(Self {
            window,
            scale,
            wavelet,
            filter,
            name: format!("wavelet_energy_{window}_{scale}"),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn wavelet(&self) -> ComplexMorlet {
        self.wavelet
    }

    /// Days needed before the first defined value.
    pub fn lookback(&self) -> usize {
        self.window - 1
    }

    /// Energy series aligned with `returns`. The first `window - 1` values and
    /// every value whose window contains a non-finite return are NaN.
    pub fn compute(&self, returns: &[f64]) -> Vec<f64> {
        let n = returns.len();
        let mut out = vec![f64::NAN; n];
        if n < self.window {
            return out;
        }

        for t in (self.window - 1)..n {
            let chunk = &returns[t + 1 - self.window..=t];
            if chunk.iter().any(|r| !r.is_finite()) {
                continue;
            }
            out[t] = self.energy_at_right_edge(chunk);
        }
        out
    }

    /// `|W|^2` of the right-edge coefficient of the chunk's CWT at this scale.
    ///
    /// Only the two convolution terms feeding the right-edge difference are
    /// evaluated; the full coefficient vector is never materialised.
    pub fn energy_at_right_edge(&self, chunk: &[f64]) -> f64 {
        let n = chunk.len();
        if n == 0 {
            return f64::NAN;
        }
        let m = self.filter.len();

        // Full convolution has n + m - 1 terms, its first difference n + m - 2.
        // Centre-trimming to n keeps diff[floor(d)..len - ceil(d)], d = (m - 2) / 2.
        let diff_len = n + m - 2;
        let right = diff_len - (m - 1) / 2 - 1;

        let coef = -(self.scale.sqrt()) * (self.conv_at(chunk, right + 1) - self.conv_at(chunk, right));
        coef.norm_sqr()
    }

    /// Term `k` of the full convolution `chunk * filter`.
    fn conv_at(&self, chunk: &[f64], k: usize) -> Complex64 {
        let m = self.filter.len();
        let lo = (k + 1).saturating_sub(m);
        let hi = k.min(chunk.len() - 1);
        let mut acc = Complex64::new(0.0, 0.0);
        if lo > hi {
            return acc;
        }
        for (i, &x) in chunk.iter().enumerate().take(hi + 1).skip(lo) {
            acc += self.filter[k - i] * x;
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Full CWT at one scale: convolve, differentiate, scale, centre-trim.
    fn reference_coefficients(f: &WaveletFeaturizer, data: &[f64]) -> Vec<Complex64> {
        let n = data.len();
        let m = f.filter.len();
        let mut conv = vec![Complex64::new(0.0, 0.0); n + m - 1];
        for (i, &x) in data.iter().enumerate() {
            for (j, &h) in f.filter.iter().enumerate() {
                conv[i + j] += h * x;
            }
        }
        let coef: Vec<Complex64> = conv
            .windows(2)
            .map(|w| -(f.scale.sqrt()) * (w[1] - w[0]))
            .collect();
        let d = (coef.len() as f64 - n as f64) / 2.0;
        if d > 0.0 {
            let start = d.floor() as usize;
            let end = coef.len() - d.ceil() as usize;
            coef[start..end].to_vec()
        } else {
            coef
        }
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(
            WaveletFeaturizer::new(0, 5.0).unwrap_err(),
            FeatureError::InvalidWindow(0)
        );
        assert!(matches!(
            WaveletFeaturizer::new(5, 0.0),
            Err(FeatureError::InvalidScale(_))
        ));
        assert!(matches!(
            WaveletFeaturizer::new(5, f64::NAN),
            Err(FeatureError::InvalidScale(_))
        ));
    }

    #[test]
    fn right_edge_matches_full_transform() {
        let f = WaveletFeaturizer::new(20, 5.0).unwrap();
        let data: Vec<f64> = (0..20).map(|i| ((i * 7 % 11) as f64 - 5.0) * 0.003).collect();
        let coeffs = reference_coefficients(&f, &data);
        assert_eq!(coeffs.len(), data.len());
        let expected = coeffs.last().unwrap().norm_sqr();
        let got = f.energy_at_right_edge(&data);
        assert!((got - expected).abs() <= 1e-15 + 1e-9 * expected.abs());
    }

    #[test]
    fn right_edge_matches_full_transform_small_scale() {
        let f = WaveletFeaturizer::new(6, 1.0).unwrap();
        let data = [0.01, -0.02, 0.015, 0.0, -0.005, 0.02];
        let expected = reference_coefficients(&f, &data).last().unwrap().norm_sqr();
        assert!((f.energy_at_right_edge(&data) - expected).abs() <= 1e-15 + 1e-9 * expected);
    }

    #[test]
    fn warmup_is_undefined() {
        let f = WaveletFeaturizer::new(5, 5.0).unwrap();
        let returns = vec![0.01; 10];
        let e = f.compute(&returns);
        assert_eq!(e.len(), 10);
        assert!(e[..4].iter().all(|v| v.is_nan()));
        assert!(e[4..].iter().all(|v| v.is_finite()));
        assert_eq!(f.lookback(), 4);
    }

    #[test]
    fn constant_windows_give_equal_energy() {
        // Six days of constant return: defined from index 4 on, identical values.
        let f = WaveletFeaturizer::new(5, 5.0).unwrap();
        let e = f.compute(&[0.001; 6]);
        assert!(e[4].is_finite() && e[4] >= 0.0);
        assert_eq!(e[4], e[5]);
    }

    #[test]
    fn short_series_is_all_undefined() {
        let f = WaveletFeaturizer::new(5, 5.0).unwrap();
        assert!(f.compute(&[0.01, 0.02, 0.03]).iter().all(|v| v.is_nan()));
        assert!(f.compute(&[]).is_empty());
    }

    #[test]
    fn nan_only_poisons_windows_containing_it() {
        let f = WaveletFeaturizer::new(3, 5.0).unwrap();
        let mut returns = vec![0.01, -0.01, 0.02, -0.02, 0.01, 0.0, 0.005, -0.003];
        returns[3] = f64::NAN;
        let e = f.compute(&returns);
        // Windows ending at 3, 4, 5 contain index 3.
        assert!(e[2].is_finite());
        assert!(e[3].is_nan() && e[4].is_nan() && e[5].is_nan());
        assert!(e[6].is_finite() && e[7].is_finite());
    }

    #[test]
    fn energy_is_non_negative() {
        let f = WaveletFeaturizer::new(10, 3.0).unwrap();
        let returns: Vec<f64> = (0..50).map(|i| ((i as f64) * 0.7).sin() * 0.02).collect();
        assert!(f.compute(&returns).iter().skip(9).all(|&v| v >= 0.0));
    }
}
