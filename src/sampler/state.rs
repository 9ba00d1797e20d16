use ndarray::{Array1, Array2};

/// Positions, log-probabilities and blobs of all walkers at one step
#[derive(Clone, Debug, PartialEq)]
pub struct EnsembleState<B> {
    /// `(nwalkers, ndim)` walker positions
    pub positions: Array2<f64>,
    pub ln_probs: Array1<f64>,
    pub blobs: Vec<B>,
}

impl<B> EnsembleState<B> {
    pub fn nwalkers(&self) -> usize {
        self.positions.nrows()
    }

    pub fn ndim(&self) -> usize {
        self.positions.ncols()
    }
}
