use crate::prior::ln_prior_1d::{LnPrior1D, LnPrior1DTrait};
use crate::transit::{Body, Central};

use serde::{Deserialize, Serialize};

/// Shape parameters of the empirical eccentricity distribution of a reference planet population
pub const ECCENTRICITY_BETA_SHAPE: (f64, f64) = (1.12, 3.09);

/// Prior of a transit system given catalog stellar parameters
///
/// Gaussian penalties on the central body mass and radius plus a Beta prior on the eccentricity
/// of the first orbiting body. It does not depend on the noise model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StellarPrior {
    mass: LnPrior1D,
    radius: LnPrior1D,
    eccentricity: LnPrior1D,
}

impl StellarPrior {
    /// Masses are in M☉ and radii in R☉, errors must be positive
    pub fn new(mass: f64, mass_err: f64, radius: f64, radius_err: f64) -> Self {
        let (alpha, beta) = ECCENTRICITY_BETA_SHAPE;
        Self {
            mass: LnPrior1D::normal(mass, mass_err),
            radius: LnPrior1D::normal(radius, radius_err),
            eccentricity: LnPrior1D::beta(alpha, beta),
        }
    }

    pub fn ln_prior(&self, central: &Central, bodies: &[Body]) -> f64 {
        let star = self.mass.ln_prior_1d(central.mass) + self.radius.ln_prior_1d(central.radius);
        match bodies.first() {
            Some(body) => star + self.eccentricity.ln_prior_1d(body.e),
            None => star,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn central(mass: f64, radius: f64) -> Central {
        Central {
            flux: 1.0,
            radius,
            mass,
            q1: 0.5,
            q2: 0.5,
        }
    }

    fn body(e: f64) -> Body {
        Body {
            radius: 0.1,
            period: 100.0,
            t0: 0.0,
            b: 0.0,
            e,
            omega: 0.0,
            mass: 0.0,
        }
    }

    #[test]
    fn catalog_values_maximise_stellar_terms() {
        let prior = StellarPrior::new(1.0, 0.1, 0.9, 0.05);
        assert_eq!(prior.ln_prior(&central(1.0, 0.9), &[]), 0.0);
        assert_relative_eq!(
            prior.ln_prior(&central(1.1, 1.0), &[]),
            -0.5 * (1.0 + 4.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn eccentricity_term_uses_first_body() {
        let prior = StellarPrior::new(1.0, 0.1, 1.0, 0.1);
        let star = central(1.0, 1.0);
        let low = prior.ln_prior(&star, &[body(0.05), body(0.9)]);
        let high = prior.ln_prior(&star, &[body(0.9), body(0.05)]);
        assert!(low > high);
        assert_eq!(prior.ln_prior(&star, &[body(1.0)]), f64::NEG_INFINITY);
    }
}
