#![doc = include_str!("../README.md")]

pub mod catalog;
pub use catalog::{Candidate, CsvStellarCatalog, StarRecord, StellarCatalog};

mod data;
pub use data::LightCurveSegment;

pub mod error;
pub use error::{
    CatalogError, ConfigError, FitError, InvalidParameter, LightCurveError, SamplerError,
    StoreError,
};

mod executor;
pub use executor::Executor;

pub mod fit;
pub use fit::{FitConfig, Fitter, SamplerSettings, TargetOutcome};

pub mod gp;
pub use gp::{GaussianProcess, Matern32Kernel};

pub mod posterior;
pub use posterior::{Blob, LogPosterior, ParameterLayout, PosteriorModel, SegmentPrediction};

pub mod prior;
pub use prior::{LnPrior1D, StellarPrior};

pub mod sampler;
pub use sampler::{BurnIn, EnsembleSampler, EnsembleState, StretchMove};

pub mod source;
pub use source::{CsvLightCurveSource, LightCurveSource, LoadOptions};

pub mod store;
pub use store::{ChainReader, ChainWriter, StoreSchema};

pub mod transit;
pub use transit::{Body, Central, OrbitalSummary, TransitSystem};

mod types;
pub use types::TargetId;

pub use ndarray;
