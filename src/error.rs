use crate::types::TargetId;

use std::path::PathBuf;

/// Rejection of a parameter vector by [crate::TransitSystem] or [crate::GaussianProcess]
///
/// The object that returned this error keeps its previous state.
#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum InvalidParameter {
    #[error("parameter vector has length {actual}, but {expected} free parameters are defined")]
    WrongLength { actual: usize, expected: usize },

    #[error("parameter {name} has non-finite value {value}")]
    NonFinite { name: String, value: f64 },

    #[error("parameter {name} = {value} is outside of {domain}")]
    OutOfDomain {
        name: String,
        value: f64,
        domain: &'static str,
    },

    #[error("orbit of body {body} is unphysical: {reason}")]
    Geometry { body: usize, reason: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum LightCurveError {
    #[error(
        "segment arrays have different lengths: time {time}, flux {flux}, flux_err {flux_err}"
    )]
    LengthMismatch {
        time: usize,
        flux: usize,
        flux_err: usize,
    },

    #[error("light-curve segment is empty")]
    Empty,

    #[error("exposure time must be positive and finite, got {0}")]
    ExposureTime(f64),

    #[error("no light curve found for target {0}")]
    NotFound(TargetId),

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("target {0} is not in the stellar catalog")]
    NotFound(TargetId),

    #[error("catalog record of target {target} is unusable: {reason}")]
    InvalidRecord {
        target: TargetId,
        reason: &'static str,
    },

    #[error("failed to read {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("chain file header is malformed")]
    Header(#[from] serde_json::Error),

    #[error("file is not a chain file: wrong magic bytes")]
    BadMagic,

    #[error("chain file header of {len} bytes does not fit in the remaining {available} bytes")]
    HeaderLength { len: u64, available: u64 },

    #[error("chain file format version {0} is not supported")]
    UnsupportedVersion(u32),

    #[error("step {step} is outside of the allocated {nsteps} steps")]
    StepOutOfRange { step: usize, nsteps: usize },

    #[error("step {step} cannot be written, the next writable step is {next}")]
    StepNotWritable { step: usize, next: usize },

    #[error("table {table} expects {expected} entries, got {actual}")]
    ShapeMismatch {
        table: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SamplerError {
    #[error("ensemble needs an even number of at least two walkers, got {0}")]
    WalkerCount(usize),

    #[error("walker positions have shape ({rows}, {cols}), ({nwalkers}, {ndim}) is expected")]
    PositionShape {
        rows: usize,
        cols: usize,
        nwalkers: usize,
        ndim: usize,
    },

    #[error("stretch-move scale must be larger than unity")]
    StretchScale,

    #[error("failed to build a thread pool: {0}")]
    ThreadPool(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Fault of a single target fit
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error(transparent)]
    LightCurve(#[from] LightCurveError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error("initial parameters are rejected by the transit model")]
    InitialParameters(#[from] InvalidParameter),

    #[error("no light-curve segment of target {0} covers the candidate transit")]
    NoTransitSegments(TargetId),

    #[error("fit of target {target} was cancelled after {steps} production steps")]
    Cancelled { target: TargetId, steps: usize },

    #[error("fit of target {target} panicked: {message}")]
    Panic { target: TargetId, message: String },

    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FitError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
