use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{info, warn};
use std::path::PathBuf;
use transit_fit::catalog::read_candidates;
use transit_fit::fit::{config_schema, load_config, select_targets};
use transit_fit::source::read_known_transits;
use transit_fit::{
    CsvLightCurveSource, CsvStellarCatalog, Executor, FitConfig, Fitter, TargetId, TargetOutcome,
};

#[derive(Parser)]
#[command(
    name = "transit-fit",
    about = "Fit transit candidates with an ensemble MCMC sampler and Gaussian-process noise",
    version
)]
struct Cli {
    /// Targets to fit, all selected candidates if empty
    targets: Vec<TargetId>,

    /// Candidate transits CSV
    #[arg(long, required_unless_present = "config_schema")]
    candidates: Option<PathBuf>,

    /// Stellar catalog CSV
    #[arg(long, required_unless_present = "config_schema")]
    stars: Option<PathBuf>,

    /// Directory with one `<target>.csv` light curve per target
    #[arg(long, required_unless_present = "config_schema")]
    light_curves: Option<PathBuf>,

    /// Cataloged planets CSV, their transits are masked before fitting
    #[arg(long)]
    known_transits: Option<PathBuf>,

    /// Fit targets in parallel with this many threads, 0 for one per CPU
    #[arg(short, long)]
    parallel: Option<usize>,

    /// Log failed targets to the error log and continue
    #[arg(short, long)]
    quiet: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Remove temporary files of the light-curve source
    #[arg(short, long)]
    clean: bool,

    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Keep transits of cataloged planets in the light curves
    #[arg(long)]
    no_remove_kois: bool,

    /// Ignore candidate accept flags
    #[arg(long)]
    fit_all: bool,

    /// Largest centroid offset signal-to-noise ratio
    #[arg(long)]
    max_offset: Option<f64>,

    #[arg(long)]
    nburn: Option<usize>,

    #[arg(long)]
    burniter: Option<usize>,

    #[arg(long)]
    nsteps: Option<usize>,

    #[arg(long)]
    nwalkers: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// JSON configuration, flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the JSON schema of the configuration and exit
    #[arg(long)]
    config_schema: bool,
}

impl Cli {
    fn fit_config(&self) -> Result<FitConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => FitConfig::default(),
        };
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        config.quiet |= self.quiet;
        config.delete_temporary |= self.clean;
        config.fit_all |= self.fit_all;
        if self.no_remove_kois {
            config.remove_known_transits = false;
        }
        config.max_offset = self.max_offset.unwrap_or(config.max_offset);
        let sampler = &mut config.sampler;
        sampler.nburn = self.nburn.unwrap_or(sampler.nburn);
        sampler.burniter = self.burniter.unwrap_or(sampler.burniter);
        sampler.nsteps = self.nsteps.unwrap_or(sampler.nsteps);
        sampler.nwalkers = self.nwalkers.unwrap_or(sampler.nwalkers);
        sampler.seed = self.seed.or(sampler.seed);
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if cli.config_schema {
        println!("{}", serde_json::to_string_pretty(&config_schema())?);
        return Ok(());
    }
    let config = cli.fit_config()?;
    let (Some(candidates), Some(stars), Some(light_curves)) =
        (&cli.candidates, &cli.stars, &cli.light_curves)
    else {
        anyhow::bail!("--candidates, --stars and --light-curves are required");
    };

    let candidates = read_candidates(candidates)?;
    let groups = select_targets(&candidates, &cli.targets, config.fit_all, config.max_offset);
    if groups.is_empty() {
        warn!("no target passes the selection");
        return Ok(());
    }
    info!(
        "{} targets selected: {}",
        groups.len(),
        groups.iter().map(|group| group.kicid).join(", ")
    );

    let catalog = CsvStellarCatalog::from_path(stars)?;
    let mut source = CsvLightCurveSource::new(light_curves);
    if let Some(path) = &cli.known_transits {
        source = source.with_known_transits(read_known_transits(path)?);
    }
    let target_executor = match cli.parallel {
        Some(threads) => Executor::thread_pool(threads)?,
        None => Executor::sequential(),
    };
    let walker_executor = match config.sampler.walker_threads {
        0 => Executor::sequential(),
        threads => Executor::thread_pool(threads)?,
    };

    let fitter = Fitter::new(catalog, source, config).with_walker_executor(walker_executor);
    let outcomes = fitter
        .run_batch(&groups, &target_executor)
        .context("batch fit stopped")?;
    let failed = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, TargetOutcome::Failed { .. }))
        .count();
    let completed = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, TargetOutcome::Completed(_)))
        .count();
    info!(
        "{completed} fits completed, {} skipped, {failed} failed",
        outcomes.len() - completed - failed
    );
    Ok(())
}
