//! Observation matrix: `[return, energy]` rows where both are defined.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::wavelet::WaveletFeaturizer;
use crate::domain::{DailyBar, Observation};

/// Ordered `[return, energy]` observations with their dates.
///
/// Rows are kept only where both components are finite, so the first
/// `window - 1` days of any series never appear. `source_index` maps each row
/// back to its position in the bar slice it was built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationMatrix {
    dates: Vec<NaiveDate>,
    source_index: Vec<usize>,
    rows: Vec<Observation>,
}

impl ObservationMatrix {
    /// Build from bars: compute energies over the bars' returns, then keep
    /// rows where return and energy are both defined.
    pub fn build(bars: &[DailyBar], featurizer: &WaveletFeaturizer) -> Self {
        let returns: Vec<f64> = bars.iter().map(|b| b.daily_return).collect();
        let energies = featurizer.compute(&returns);
        Self::from_columns(bars, &energies)
    }

    /// Combine bars with a precomputed energy column of the same length.
    pub fn from_columns(bars: &[DailyBar], energies: &[f64]) -> Self {
        debug_assert_eq!(bars.len(), energies.len());
        let mut matrix = Self::default();
        for (i, (bar, &energy)) in bars.iter().zip(energies).enumerate() {
            if bar.daily_return.is_finite() && energy.is_finite() {
                matrix.dates.push(bar.date);
                matrix.source_index.push(i);
                matrix.rows.push([bar.daily_return, energy]);
            }
        }
        matrix
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn source_indices(&self) -> &[usize] {
        &self.source_index
    }

    /// Observations whose source bar index is `<= bar_index`.
    pub fn prefix_through(&self, bar_index: usize) -> &[Observation] {
        let end = self.source_index.partition_point(|&i| i <= bar_index);
        &self.rows[..end]
    }

    /// Per-column mean and population standard deviation.
    pub fn column_stats(&self) -> ([f64; 2], [f64; 2]) {
        column_stats(&self.rows)
    }
}

/// Per-column mean and population (ddof = 0) standard deviation.
pub fn column_stats(rows: &[Observation]) -> ([f64; 2], [f64; 2]) {
    let n = rows.len() as f64;
    if rows.is_empty() {
        return ([f64::NAN; 2], [f64::NAN; 2]);
    }
    let mut mean = [0.0; 2];
    for row in rows {
        for d in 0..2 {
            mean[d] += row[d];
        }
    }
    for m in &mut mean {
        *m /= n;
    }
    let mut var = [0.0; 2];
    for row in rows {
        for d in 0..2 {
            var[d] += (row[d] - mean[d]).powi(2);
        }
    }
    (mean, [(var[0] / n).sqrt(), (var[1] / n).sqrt()])
}
