mod ln_prior_1d;
pub use ln_prior_1d::{BetaLnPrior1D, LnPrior1D, LnPrior1DTrait, NormalLnPrior1D};

mod stellar;
pub use stellar::{ECCENTRICITY_BETA_SHAPE, StellarPrior};
