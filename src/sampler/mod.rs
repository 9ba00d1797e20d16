//! Affine-invariant ensemble MCMC

mod burn_in;
pub use burn_in::{BurnIn, BurnInIteration, BurnInReport};

mod state;
pub use state::EnsembleState;

mod stretch;
pub use stretch::StretchMove;

use crate::error::SamplerError;
use crate::executor::Executor;
use crate::posterior::LogPosterior;

use log::debug;
use ndarray::{Array1, Array2, ArrayView1, s};
use ndarray_stats::QuantileExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::convert::Infallible;
use std::ops::Range;

/// Ensemble sampler with red-blue stretch-move updates
///
/// The ensemble is split into two halves, walkers `0..n/2` and `n/2..n`. Each half is updated
/// against the other one, proposals of a half are evaluated through the [Executor], one
/// posterior clone per worker. Rejected walkers keep their position, log-probability and blob.
#[derive(Clone, Debug)]
pub struct EnsembleSampler<P: LogPosterior> {
    posterior: P,
    nwalkers: usize,
    ndim: usize,
    executor: Executor,
    stretch: StretchMove,
    rng: StdRng,
    chain: Vec<Array2<f64>>,
    ln_prob_chain: Vec<Array1<f64>>,
    accepted: Array1<usize>,
    iterations: usize,
}

impl<P: LogPosterior> EnsembleSampler<P> {
    /// `seed` makes the run reproducible, otherwise the generator is seeded from the OS
    pub fn new(
        posterior: P,
        nwalkers: usize,
        ndim: usize,
        executor: Executor,
        seed: Option<u64>,
    ) -> Result<Self, SamplerError> {
        if nwalkers < 2 || nwalkers % 2 != 0 {
            return Err(SamplerError::WalkerCount(nwalkers));
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            posterior,
            nwalkers,
            ndim,
            executor,
            stretch: StretchMove::default(),
            rng,
            chain: vec![],
            ln_prob_chain: vec![],
            accepted: Array1::zeros(nwalkers),
            iterations: 0,
        })
    }

    pub fn with_stretch(mut self, stretch: StretchMove) -> Self {
        self.stretch = stretch;
        self
    }

    pub fn nwalkers(&self) -> usize {
        self.nwalkers
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn posterior(&self) -> &P {
        &self.posterior
    }

    /// Steps taken since construction or the last [EnsembleSampler::reset]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    fn evaluate(&self, points: Vec<Array1<f64>>) -> Vec<(f64, P::Blob)> {
        let posterior = &self.posterior;
        self.executor.map_init(
            points,
            || posterior.clone(),
            |posterior, point| match point.as_slice() {
                Some(slice) => posterior.ln_posterior(slice),
                None => posterior.ln_posterior(&point.to_vec()),
            },
        )
    }

    /// Evaluate the posterior at the given `(nwalkers, ndim)` positions
    pub fn initial_state(
        &self,
        positions: Array2<f64>,
    ) -> Result<EnsembleState<P::Blob>, SamplerError> {
        if positions.dim() != (self.nwalkers, self.ndim) {
            return Err(SamplerError::PositionShape {
                rows: positions.nrows(),
                cols: positions.ncols(),
                nwalkers: self.nwalkers,
                ndim: self.ndim,
            });
        }
        let (ln_probs, blobs): (Vec<_>, Vec<_>) = self
            .evaluate(positions.outer_iter().map(|row| row.to_owned()).collect())
            .into_iter()
            .unzip();
        Ok(EnsembleState {
            positions,
            ln_probs: ln_probs.into(),
            blobs,
        })
    }

    fn update_half(
        &mut self,
        state: &mut EnsembleState<P::Blob>,
        active: Range<usize>,
        complementary: Range<usize>,
    ) {
        let proposals: Vec<(Array1<f64>, f64)> = {
            let others = state.positions.slice(s![complementary, ..]);
            active
                .clone()
                .map(|i| {
                    self.stretch
                        .propose(&mut self.rng, state.positions.row(i), others)
                })
                .collect()
        };
        let (points, zs): (Vec<_>, Vec<_>) = proposals.into_iter().unzip();
        let results = self.evaluate(points.clone());

        for (((i, point), z), (ln_prob, blob)) in active.zip(points).zip(zs).zip(results) {
            let ln_q = self
                .stretch
                .ln_acceptance(z, self.ndim, state.ln_probs[i], ln_prob);
            let u: f64 = self.rng.random();
            if ln_q > u.ln() {
                state.positions.row_mut(i).assign(&point);
                state.ln_probs[i] = ln_prob;
                state.blobs[i] = blob;
                self.accepted[i] += 1;
            }
        }
    }

    /// Advance the ensemble by one step, first half first
    pub fn step(&mut self, mut state: EnsembleState<P::Blob>) -> EnsembleState<P::Blob> {
        let half = self.nwalkers / 2;
        self.update_half(&mut state, 0..half, half..self.nwalkers);
        self.update_half(&mut state, half..self.nwalkers, 0..half);
        self.iterations += 1;
        state
    }

    /// Run `iterations` steps, passing every state to `on_step` before the next step starts
    ///
    /// With `store_chain` positions and log-probabilities are kept for
    /// [EnsembleSampler::flat_chain] and [EnsembleSampler::best_sample]. The first error returned
    /// by `on_step` stops sampling.
    pub fn sample<F, E>(
        &mut self,
        mut state: EnsembleState<P::Blob>,
        iterations: usize,
        store_chain: bool,
        mut on_step: F,
    ) -> Result<EnsembleState<P::Blob>, E>
    where
        F: FnMut(usize, &EnsembleState<P::Blob>) -> Result<(), E>,
    {
        for i in 0..iterations {
            state = self.step(state);
            if store_chain {
                self.chain.push(state.positions.clone());
                self.ln_prob_chain.push(state.ln_probs.clone());
            }
            on_step(i, &state)?;
        }
        debug!(
            "{} steps done, mean acceptance fraction {:.3}",
            iterations,
            self.acceptance_fraction().mean().unwrap_or(f64::NAN)
        );
        Ok(state)
    }

    /// Run `iterations` steps storing the chain
    pub fn run_mcmc(
        &mut self,
        state: EnsembleState<P::Blob>,
        iterations: usize,
    ) -> EnsembleState<P::Blob> {
        match self.sample(state, iterations, true, |_, _| Ok::<(), Infallible>(())) {
            Ok(state) => state,
            Err(never) => match never {},
        }
    }

    /// Drop the stored chain and acceptance counters
    pub fn reset(&mut self) {
        self.chain.clear();
        self.ln_prob_chain.clear();
        self.accepted.fill(0);
        self.iterations = 0;
    }

    /// Stored positions as a `(steps × nwalkers, ndim)` array, step-major
    pub fn flat_chain(&self) -> Array2<f64> {
        let nwalkers = self.nwalkers;
        Array2::from_shape_fn((self.chain.len() * nwalkers, self.ndim), |(i, j)| {
            self.chain[i / nwalkers][(i % nwalkers, j)]
        })
    }

    pub fn flat_ln_probability(&self) -> Array1<f64> {
        self.ln_prob_chain.iter().flatten().copied().collect()
    }

    /// Stored sample with the largest log-probability
    pub fn best_sample(&self) -> Option<(Array1<f64>, f64)> {
        let ln_probs = self.flat_ln_probability();
        let index = ln_probs.argmax_skipnan().ok()?;
        let step = &self.chain[index / self.nwalkers];
        Some((step.row(index % self.nwalkers).to_owned(), ln_probs[index]))
    }

    /// Fraction of accepted proposals per walker
    pub fn acceptance_fraction(&self) -> Array1<f64> {
        if self.iterations == 0 {
            return Array1::zeros(self.nwalkers);
        }
        self.accepted.mapv(|n| n as f64 / self.iterations as f64)
    }
}

/// Gaussian ball of `nwalkers` points around `center`
pub fn gaussian_ball<R: Rng + ?Sized>(
    rng: &mut R,
    center: ArrayView1<f64>,
    scatter: f64,
    nwalkers: usize,
) -> Array2<f64> {
    Array2::from_shape_fn((nwalkers, center.len()), |(_, j)| {
        center[j] + scatter * rng.sample::<f64, _>(rand_distr::StandardNormal)
    })
}
