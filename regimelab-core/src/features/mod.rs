//! Feature construction: causal wavelet energy and the HMM observation matrix.

pub mod morlet;
pub mod observation;
pub mod wavelet;

pub use morlet::{ComplexMorlet, IntegratedWavelet};
pub use observation::ObservationMatrix;
pub use wavelet::{FeatureError, WaveletFeaturizer};
