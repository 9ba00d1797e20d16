use crate::error::ConfigError;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Ensemble and schedule of one fit
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct SamplerSettings {
    /// Number of walkers, raised to an even number of at least twice the dimension
    pub nwalkers: usize,
    /// Steps of every burn-in iteration
    pub nburn: usize,
    /// Burn-in iterations, zero is treated as one
    pub burniter: usize,
    /// Production steps written to the chain file
    pub nsteps: usize,
    /// Standard deviation of the Gaussian ball walkers start from
    pub scatter: f64,
    /// Scale `a` of the stretch move, must be larger than unity
    pub stretch_scale: f64,
    /// Sub-exposures per cadence for exposure-time integration
    pub supersample: usize,
    /// Worker threads evaluating walkers of one fit, zero evaluates them sequentially
    pub walker_threads: usize,
    /// Seed of the random generator, combined with the target id
    pub seed: Option<u64>,
}

impl SamplerSettings {
    #[inline]
    pub fn default_nwalkers() -> usize {
        42
    }

    #[inline]
    pub fn default_nburn() -> usize {
        300
    }

    #[inline]
    pub fn default_burniter() -> usize {
        3
    }

    #[inline]
    pub fn default_nsteps() -> usize {
        5000
    }

    #[inline]
    pub fn default_scatter() -> f64 {
        1e-4
    }

    #[inline]
    pub fn default_stretch_scale() -> f64 {
        2.0
    }

    #[inline]
    pub fn default_supersample() -> usize {
        7
    }
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            nwalkers: Self::default_nwalkers(),
            nburn: Self::default_nburn(),
            burniter: Self::default_burniter(),
            nsteps: Self::default_nsteps(),
            scatter: Self::default_scatter(),
            stretch_scale: Self::default_stretch_scale(),
            supersample: Self::default_supersample(),
            walker_threads: 0,
            seed: None,
        }
    }
}

/// Batch fit configuration
///
/// Loaded from JSON, missing fields take their defaults. Command-line flags override it.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct FitConfig {
    /// Root of per-target output directories, lock files and the error log
    pub output_dir: PathBuf,
    /// Mask transits of already cataloged planets before fitting
    pub remove_known_transits: bool,
    /// Ask the light-curve source to remove its temporary files
    pub delete_temporary: bool,
    /// Fit candidates regardless of their accept flags
    pub fit_all: bool,
    /// Largest centroid-offset signal-to-noise ratio of a fitted target
    pub max_offset: f64,
    /// Record failures in the error log instead of stopping the batch
    pub quiet: bool,
    pub sampler: SamplerSettings,
}

impl FitConfig {
    #[inline]
    pub fn default_output_dir() -> PathBuf {
        PathBuf::from("output")
    }

    #[inline]
    pub fn default_max_offset() -> f64 {
        10.0
    }
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            output_dir: Self::default_output_dir(),
            remove_known_transits: true,
            delete_temporary: false,
            fit_all: false,
            max_offset: Self::default_max_offset(),
            quiet: false,
            sampler: SamplerSettings::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<FitConfig, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// JSON schema of [FitConfig]
pub fn config_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(FitConfig)
}
