pub use fixtures::{
    CandidateRow, Error, StarRow, write_candidates, write_light_curve, write_stars,
};
pub use synthetic::{
    Injection, SyntheticLightCurve, injected_posterior, injected_system, posterior_from_segments,
};

mod fixtures;
mod synthetic;
