use crate::catalog::StellarCatalog;
use crate::data::LightCurveSegment;
use crate::error::FitError;
use crate::executor::Executor;
use crate::fit::config::FitConfig;
use crate::fit::init::{CandidateGroup, TargetInit};
use crate::gp::{GaussianProcess, Matern32Kernel};
use crate::posterior::{Blob, PosteriorModel};
use crate::sampler::{BurnIn, EnsembleSampler, EnsembleState, StretchMove};
use crate::source::{LightCurveMeta, LightCurveSource, LoadOptions};
use crate::store::{CHAIN_FILE_NAME, ChainWriter, DataRecord, StoreSchema};
use crate::transit::TransitSystem;
use crate::types::TargetId;

use log::{debug, info, warn};
use ndarray::Array1;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Squared length scale of the initial noise kernel, days²
pub const INITIAL_GP_METRIC: f64 = 4.0;

/// Result of a finished fit
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FitSummary {
    pub kicid: TargetId,
    pub chain_path: PathBuf,
    pub parameter_names: Vec<String>,
    pub nwalkers: usize,
    pub nsteps: usize,
    pub fit_segments: usize,
    pub other_segments: usize,
    /// Mean acceptance fraction of production
    pub acceptance_fraction: f64,
    /// Largest log-posterior of the final ensemble
    pub best_ln_prob: f64,
    pub best_parameters: Vec<f64>,
}

/// Fits targets with a stellar catalog and a light-curve source
///
/// Every fit writes `<output_dir>/<target>/chain.bin`. Setting the cancel flag stops running fits
/// between production steps, leaving their chain files at the last committed step.
pub struct Fitter<C, S> {
    pub(super) catalog: C,
    pub(super) source: S,
    pub(super) config: FitConfig,
    walker_executor: Executor,
    pub(super) cancel: Arc<AtomicBool>,
}

/// Even number of walkers, at least twice the dimension
pub fn walker_count(requested: usize, ndim: usize) -> usize {
    let nwalkers = requested.max(2 * ndim);
    nwalkers + nwalkers % 2
}

/// Split segments into those the model dips in and the rest
pub fn partition_segments(
    system: &TransitSystem,
    segments: Vec<LightCurveSegment>,
) -> (Vec<LightCurveSegment>, Vec<LightCurveSegment>) {
    segments.into_iter().partition(|lc| {
        system
            .light_curve(lc.time(), lc.texp())
            .iter()
            .any(|&flux| flux < 1.0)
    })
}

/// Noise model started from the flux scatter and mean error of a segment
pub fn initial_gp(lc: &LightCurveSegment) -> GaussianProcess {
    GaussianProcess::new(
        Matern32Kernel::new(lc.flux_variance(), INITIAL_GP_METRIC),
        2.0 * lc.mean_flux_err().ln(),
    )
}

fn data_records(segments: &[LightCurveSegment]) -> Vec<DataRecord> {
    segments
        .iter()
        .enumerate()
        .flat_map(|(chunk, lc)| {
            lc.time()
                .into_iter()
                .zip(lc.flux())
                .map(move |(&time, &flux)| DataRecord {
                    chunk: chunk as i64,
                    time,
                    flux,
                })
        })
        .collect()
}

impl<C, S> Fitter<C, S>
where
    C: StellarCatalog,
    S: LightCurveSource,
{
    pub fn new(catalog: C, source: S, config: FitConfig) -> Self {
        Self {
            catalog,
            source,
            config,
            walker_executor: Executor::Sequential,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Executor evaluating the walkers of one fit
    pub fn with_walker_executor(mut self, executor: Executor) -> Self {
        self.walker_executor = executor;
        self
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Flag stopping all fits of this fitter
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn target_dir(&self, kicid: TargetId) -> PathBuf {
        self.config.output_dir.join(kicid.to_string())
    }

    pub fn chain_path(&self, kicid: TargetId) -> PathBuf {
        self.target_dir(kicid).join(CHAIN_FILE_NAME)
    }

    /// Look the star up and fit the candidate group
    pub fn fit_group(&self, group: &CandidateGroup) -> Result<FitSummary, FitError> {
        let star = self.catalog.star(group.kicid)?;
        let init = TargetInit::new(group, &star)?;
        self.fit_target(&init)
    }

    pub fn fit_target(&self, init: &TargetInit) -> Result<FitSummary, FitError> {
        let kicid = init.kicid;
        let settings = &self.config.sampler;
        let system = init.system(settings.supersample)?;

        let (segments, meta) = self.source.load(
            kicid,
            LoadOptions {
                remove_known_transits: self.config.remove_known_transits,
                delete_temporary: self.config.delete_temporary,
            },
        )?;
        let LightCurveMeta {
            removed_cadences,
            removed_segments,
            ..
        } = meta;
        debug!(
            "{kicid}: {} segments loaded, {removed_cadences} cadences and {removed_segments} segments removed as known transits",
            segments.len()
        );
        let data = data_records(&segments);
        let (fit, other) = partition_segments(&system, segments);
        if fit.is_empty() {
            return Err(FitError::NoTransitSegments(kicid));
        }
        let (nfit, nother) = (fit.len(), other.len());
        info!("{kicid}: fitting {nfit} segments, {nother} other segments");

        let gps = fit.iter().map(initial_gp).collect();
        let posterior = PosteriorModel::new(system, gps, init.prior(), fit, other);
        let center = Array1::from(posterior.initial_vector());
        let names = posterior.parameter_names().to_vec();
        let ndim = names.len();
        let ncadences = posterior.fit_cadences();

        let stretch = StretchMove::new(settings.stretch_scale)?;
        let nwalkers = walker_count(settings.nwalkers, ndim);
        if nwalkers != settings.nwalkers {
            warn!(
                "{kicid}: {} walkers requested for {ndim} parameters, using {nwalkers}",
                settings.nwalkers
            );
        }

        let target_dir = self.target_dir(kicid);
        fs::create_dir_all(&target_dir).map_err(FitError::io(&target_dir))?;
        let schema = StoreSchema::new(
            settings.nsteps,
            nwalkers,
            names.clone(),
            ncadences,
            data.len(),
        );
        let mut writer = ChainWriter::create(self.chain_path(kicid), schema, &data)?;

        let seed = settings.seed.map(|seed| seed ^ kicid);
        let mut sampler =
            EnsembleSampler::new(posterior, nwalkers, ndim, self.walker_executor.clone(), seed)?
                .with_stretch(stretch);
        let burn_in = BurnIn {
            iterations: settings.burniter,
            steps: settings.nburn,
            scatter: settings.scatter,
        };
        let report = burn_in.run(&mut sampler, center.view())?;

        info!("{kicid}: production of {} steps", settings.nsteps);
        sampler.reset();
        let nsteps = settings.nsteps;
        let on_step = |i: usize, state: &EnsembleState<Blob>| -> Result<(), FitError> {
            writer.append_step(i, state.positions.view(), state.ln_probs.view(), &state.blobs)?;
            if i + 1 < nsteps && self.cancel.load(Ordering::Relaxed) {
                return Err(FitError::Cancelled {
                    target: kicid,
                    steps: i + 1,
                });
            }
            Ok(())
        };
        let state = sampler.sample(report.state, nsteps, false, on_step)?;

        let acceptance_fraction = sampler.acceptance_fraction().mean().unwrap_or(f64::NAN);
        let (best_ln_prob, best_parameters) = state
            .ln_probs
            .iter()
            .zip(state.positions.rows())
            .max_by(|(a, _), (b, _)| a.total_cmp(b))
            .map_or((f64::NEG_INFINITY, vec![]), |(&ln_prob, row)| {
                (ln_prob, row.to_vec())
            });
        info!(
            "{kicid}: done, acceptance fraction {acceptance_fraction:.3}, best ln posterior {best_ln_prob:.3}"
        );
        Ok(FitSummary {
            kicid,
            chain_path: writer.path().to_path_buf(),
            parameter_names: names,
            nwalkers,
            nsteps,
            fit_segments: nfit,
            other_segments: nother,
            acceptance_fraction,
            best_ln_prob,
            best_parameters,
        })
    }
}
