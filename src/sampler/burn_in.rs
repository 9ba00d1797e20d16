use crate::error::SamplerError;
use crate::posterior::LogPosterior;
use crate::sampler::{EnsembleSampler, EnsembleState, gaussian_ball};

use log::info;
use ndarray::{Array1, Array2, ArrayView1};

/// Iterated burn-in
///
/// Every iteration scatters the ensemble in a small Gaussian ball around a centre and runs
/// `steps` steps storing the chain. The centre of the next iteration is the best sample stored
/// so far. The final ensemble state is the starting point of production.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BurnIn {
    /// Number of iterations, zero is treated as one
    pub iterations: usize,
    pub steps: usize,
    /// Standard deviation of the ball
    pub scatter: f64,
}

impl Default for BurnIn {
    fn default() -> Self {
        Self {
            iterations: 3,
            steps: 300,
            scatter: 1e-4,
        }
    }
}

/// Centre and starting positions of one burn-in iteration
#[derive(Clone, Debug, PartialEq)]
pub struct BurnInIteration {
    pub center: Array1<f64>,
    pub start: Array2<f64>,
}

#[derive(Clone, Debug)]
pub struct BurnInReport<B> {
    pub state: EnsembleState<B>,
    pub iterations: Vec<BurnInIteration>,
}

impl BurnIn {
    pub fn run<P: LogPosterior>(
        &self,
        sampler: &mut EnsembleSampler<P>,
        center: ArrayView1<f64>,
    ) -> Result<BurnInReport<P::Blob>, SamplerError> {
        let iterations = self.iterations.max(1);
        let mut report = Vec::with_capacity(iterations);
        let mut center = center.to_owned();
        let mut state = self.iterate(sampler, center.clone(), 0, iterations, &mut report)?;
        for i in 1..iterations {
            if let Some((best, _)) = sampler.best_sample() {
                center = best;
            }
            state = self.iterate(sampler, center.clone(), i, iterations, &mut report)?;
        }
        Ok(BurnInReport {
            state,
            iterations: report,
        })
    }

    fn iterate<P: LogPosterior>(
        &self,
        sampler: &mut EnsembleSampler<P>,
        center: Array1<f64>,
        i: usize,
        iterations: usize,
        report: &mut Vec<BurnInIteration>,
    ) -> Result<EnsembleState<P::Blob>, SamplerError> {
        info!("burn-in iteration {} of {}", i + 1, iterations);
        let nwalkers = sampler.nwalkers();
        let start = gaussian_ball(sampler.rng_mut(), center.view(), self.scatter, nwalkers);
        let initial = sampler.initial_state(start.clone())?;
        let state = sampler.run_mcmc(initial, self.steps);
        report.push(BurnInIteration { center, start });
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::executor::Executor;

    /// Narrow Gaussian centred at 3 with a marker blob
    #[derive(Clone, Debug)]
    struct Narrow;

    impl LogPosterior for Narrow {
        type Blob = u8;

        fn ln_posterior(&mut self, vector: &[f64]) -> (f64, u8) {
            let ln_prob = vector
                .iter()
                .map(|x| -0.5 * ((x - 3.0) / 0.01).powi(2))
                .sum();
            (ln_prob, 1)
        }
    }

    fn sampler() -> EnsembleSampler<Narrow> {
        EnsembleSampler::new(Narrow, 8, 2, Executor::sequential(), Some(7)).unwrap()
    }

    #[test]
    fn zero_iterations_run_once() {
        let mut sampler = sampler();
        let burn_in = BurnIn {
            iterations: 0,
            steps: 5,
            scatter: 1e-4,
        };
        let report = burn_in.run(&mut sampler, Array1::zeros(2).view()).unwrap();
        assert_eq!(report.iterations.len(), 1);
        assert_eq!(sampler.iterations(), 5);
        assert_eq!(report.state.blobs, vec![1; 8]);
    }

    #[test]
    fn centres_move_to_the_best_sample() {
        let mut sampler = sampler();
        let burn_in = BurnIn {
            iterations: 3,
            steps: 20,
            scatter: 1e-4,
        };
        let start = Array1::from_elem(2, 2.999);
        let report = burn_in.run(&mut sampler, start.view()).unwrap();
        assert_eq!(report.iterations.len(), 3);
        assert_eq!(report.iterations[0].center, start);
        // Chain is accumulated over all iterations
        assert_eq!(sampler.flat_chain().nrows(), 3 * 20 * 8);

        let mut best_so_far = f64::NEG_INFINITY;
        for (i, iteration) in report.iterations.iter().enumerate() {
            for row in iteration.start.outer_iter() {
                for (x, c) in row.iter().zip(iteration.center.iter()) {
                    assert!((x - c).abs() < 1e-4 * 8.0);
                }
            }
            if i == 0 {
                continue;
            }
            let (ln_prob, _) = Narrow.ln_posterior(iteration.center.as_slice().unwrap());
            assert!(ln_prob >= best_so_far);
            best_so_far = ln_prob;
        }
    }
}
