use crate::transit::OrbitalSummary;

use ndarray::{Array1, Array2, s};

/// Predictions for one fit segment on its own time grid
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SegmentPrediction {
    /// Noise-model posterior mean plus deterministic model
    pub gp: Array1<f64>,
    /// Deterministic transit model alone
    pub model: Array1<f64>,
}

/// Derived quantities recorded next to every posterior evaluation
///
/// The default value is the sentinel of a rejected evaluation: no orbit, zero cadences, no
/// predictions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Blob {
    pub orbit: Option<OrbitalSummary>,
    /// Cadences of the other segments showing a transit
    pub ncadence: usize,
    pub predictions: Vec<SegmentPrediction>,
}

impl Blob {
    /// Predictions of all fit segments concatenated into a `(2, cadences)` array, the first row
    /// holds `gp` and the second row holds `model`
    pub fn concatenated_predictions(&self) -> Option<Array2<f64>> {
        if self.predictions.is_empty() {
            return None;
        }
        let ncadences = self.predictions.iter().map(|p| p.model.len()).sum();
        let mut rows = Array2::zeros((2, ncadences));
        let mut offset = 0;
        for prediction in &self.predictions {
            let end = offset + prediction.model.len();
            rows.slice_mut(s![0, offset..end]).assign(&prediction.gp);
            rows.slice_mut(s![1, offset..end]).assign(&prediction.model);
            offset = end;
        }
        Some(rows)
    }
}
