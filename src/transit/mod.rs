//! Keplerian transit model of a star with orbiting bodies

mod occultation;
pub use occultation::{Occultation, QuadraticLimbDarkening};

mod orbit;
pub use orbit::{G_RSUN3_PER_MSUN_DAY2, semi_major_axis};

mod system;
pub use system::{
    BODY_PARAMETERS, Body, CENTRAL_PARAMETERS, Central, OrbitalSummary, TransitSystem,
};
