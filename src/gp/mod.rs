//! Gaussian-process noise model of a single light-curve segment

mod kernel;
pub use kernel::Matern32Kernel;

use crate::error::InvalidParameter;

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use ndarray::{Array1, ArrayView1};
use std::f64::consts::PI;

/// Names of the hyperparameters in vector order
pub const GP_PARAMETERS: [&str; 3] = ["ln_amplitude", "ln_metric", "ln_white_noise"];

#[derive(Clone, Debug)]
struct Factor {
    cholesky: Cholesky<f64, Dyn>,
    ln_det: f64,
}

#[derive(Clone, Debug)]
enum FactorCache {
    Stale,
    Singular,
    Ready(Factor),
}

/// Gaussian process with a Matérn-3/2 kernel and a fitted white-noise term
///
/// The covariance of a computed segment is `K_ij = k(t_i − t_j) + δ_ij (σ_i² + exp(ln_white_noise))`.
/// Its Cholesky factor is computed lazily on the first likelihood or prediction call and cached
/// until the hyperparameters change. Cloning never copies the factor.
#[derive(Debug)]
pub struct GaussianProcess {
    kernel: Matern32Kernel,
    ln_white_noise: f64,
    time: Array1<f64>,
    yerr2: Array1<f64>,
    factor: FactorCache,
    likelihood_calls: usize,
}

impl Clone for GaussianProcess {
    fn clone(&self) -> Self {
        Self {
            kernel: self.kernel,
            ln_white_noise: self.ln_white_noise,
            time: self.time.clone(),
            yerr2: self.yerr2.clone(),
            factor: FactorCache::Stale,
            likelihood_calls: self.likelihood_calls,
        }
    }
}

impl GaussianProcess {
    pub fn new(kernel: Matern32Kernel, ln_white_noise: f64) -> Self {
        Self {
            kernel,
            ln_white_noise,
            time: Array1::zeros(0),
            yerr2: Array1::zeros(0),
            factor: FactorCache::Stale,
            likelihood_calls: 0,
        }
    }

    /// Bind the process to the time grid and flux errors of a segment
    pub fn compute(&mut self, time: ArrayView1<f64>, yerr: ArrayView1<f64>) {
        assert_eq!(
            time.len(),
            yerr.len(),
            "time and yerr should have the same size"
        );
        self.time = time.to_owned();
        self.yerr2 = yerr.mapv(|e| e * e);
        self.factor = FactorCache::Stale;
    }

    pub fn kernel(&self) -> &Matern32Kernel {
        &self.kernel
    }

    pub fn ln_white_noise(&self) -> f64 {
        self.ln_white_noise
    }

    /// Number of hyperparameters
    pub fn len(&self) -> usize {
        GP_PARAMETERS.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn parameter_names(&self) -> Vec<String> {
        GP_PARAMETERS.iter().map(|name| name.to_string()).collect()
    }

    pub fn get_vector(&self) -> Vec<f64> {
        vec![
            self.kernel.amplitude.ln(),
            self.kernel.metric.ln(),
            self.ln_white_noise,
        ]
    }

    /// Replace the hyperparameters, all-or-nothing
    pub fn set_vector(&mut self, vector: &[f64]) -> Result<(), InvalidParameter> {
        if vector.len() != GP_PARAMETERS.len() {
            return Err(InvalidParameter::WrongLength {
                actual: vector.len(),
                expected: GP_PARAMETERS.len(),
            });
        }
        if let Some((name, &value)) = GP_PARAMETERS
            .iter()
            .zip(vector)
            .find(|(_, x)| !x.is_finite())
        {
            return Err(InvalidParameter::NonFinite {
                name: name.to_string(),
                value,
            });
        }
        self.kernel = Matern32Kernel::new(vector[0].exp(), vector[1].exp());
        self.ln_white_noise = vector[2];
        self.factor = FactorCache::Stale;
        Ok(())
    }

    /// Number of [GaussianProcess::ln_likelihood] calls since construction
    pub fn likelihood_calls(&self) -> usize {
        self.likelihood_calls
    }

    fn covariance(&self, with_noise: bool) -> DMatrix<f64> {
        let n = self.time.len();
        let white_noise = self.ln_white_noise.exp();
        DMatrix::from_fn(n, n, |i, j| {
            let k = self.kernel.value(self.time[i] - self.time[j]);
            if with_noise && i == j {
                k + self.yerr2[i] + white_noise
            } else {
                k
            }
        })
    }

    fn factor(&mut self) -> Option<&Factor> {
        if let FactorCache::Stale = self.factor {
            self.factor = match self.covariance(true).cholesky() {
                Some(cholesky) => {
                    let ln_det = 2.0 * cholesky.l_dirty().diagonal().map(f64::ln).sum();
                    if ln_det.is_finite() {
                        FactorCache::Ready(Factor { cholesky, ln_det })
                    } else {
                        FactorCache::Singular
                    }
                }
                None => FactorCache::Singular,
            };
        }
        match &self.factor {
            FactorCache::Ready(factor) => Some(factor),
            _ => None,
        }
    }

    fn alpha(&mut self, residual: ArrayView1<f64>) -> Option<(DVector<f64>, f64)> {
        assert_eq!(
            residual.len(),
            self.time.len(),
            "residual must be aligned to the computed time grid"
        );
        let r = DVector::from_iterator(residual.len(), residual.iter().copied());
        let factor = self.factor()?;
        Some((factor.cholesky.solve(&r), factor.ln_det))
    }

    /// Marginal log-likelihood of the residual, `−∞` if the covariance is not positive definite
    pub fn ln_likelihood(&mut self, residual: ArrayView1<f64>) -> f64 {
        self.likelihood_calls += 1;
        let n = residual.len() as f64;
        match self.alpha(residual) {
            Some((alpha, ln_det)) => {
                let quadratic: f64 = residual.iter().zip(alpha.iter()).map(|(r, a)| r * a).sum();
                -0.5 * (quadratic + ln_det + n * (2.0 * PI).ln())
            }
            None => f64::NEG_INFINITY,
        }
    }

    /// Posterior mean of the noise-free process conditioned on the residual, evaluated on the
    /// computed time grid
    pub fn predict(&mut self, residual: ArrayView1<f64>) -> Option<Array1<f64>> {
        let (alpha, _) = self.alpha(residual)?;
        let mean = self.covariance(false) * alpha;
        Some(Array1::from_iter(mean.iter().copied()))
    }
}
