//! Batch fitting of candidate transits

mod batch;
pub use batch::{SkipReason, TargetOutcome};

mod config;
pub use config::{FitConfig, SamplerSettings, config_schema, load_config};

mod driver;
pub use driver::{
    FitSummary, Fitter, INITIAL_GP_METRIC, initial_gp, partition_segments, walker_count,
};

mod init;
pub use init::{CandidateGroup, SINGLE_TRANSIT_PERIOD, TargetInit, select_targets};

mod lock;
pub use lock::{ErrorLog, TargetLock};
