use itertools::Itertools;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use transit_fit::fit::{initial_gp, partition_segments};
use transit_fit::{
    Body, Central, LightCurveSegment, PosteriorModel, StellarPrior, TransitSystem,
};

/// Sun-like star with a hot-Jupiter-sized planet on a ten-day orbit
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Injection {
    pub central: Central,
    pub body: Body,
}

impl Default for Injection {
    fn default() -> Self {
        Self {
            central: Central {
                flux: 1.0,
                radius: 1.0,
                mass: 1.0,
                q1: 0.5,
                q2: 0.5,
            },
            body: Body {
                radius: 0.05,
                period: 10.0,
                t0: 5.0,
                b: 0.3,
                e: 0.01,
                omega: 0.0,
                mass: 0.0,
            },
        }
    }
}

/// System with the injected parameters, all free but the body mass
pub fn injected_system(injection: &Injection) -> TransitSystem {
    let mut system = TransitSystem::new(injection.central).unwrap();
    system.add_body(injection.body).unwrap();
    system.freeze_parameter("bodies*:mass");
    system
}

/// Regularly sampled segments separated by gaps
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticLightCurve {
    pub start: f64,
    pub nsegments: usize,
    pub ncadences: usize,
    pub cadence: f64,
    /// Time between the end of a segment and the start of the next one
    pub gap: f64,
    pub texp: f64,
    /// Standard deviation of the added white noise
    pub noise: f64,
    /// Reported flux error
    pub flux_err: f64,
    pub seed: u64,
}

impl Default for SyntheticLightCurve {
    /// Two segments of Kepler long cadence, the first covers the transit at `t = 5`
    fn default() -> Self {
        Self {
            start: 4.0,
            nsegments: 2,
            ncadences: 100,
            cadence: 0.0204,
            gap: 5.0,
            texp: 0.0204,
            noise: 1e-4,
            flux_err: 1e-4,
            seed: 0,
        }
    }
}

impl SyntheticLightCurve {
    /// Segments three periods of the default injection apart, each covering a transit
    pub fn every_transit() -> Self {
        let default = Self::default();
        Self {
            nsegments: 3,
            gap: 10.0 - default.ncadences as f64 * default.cadence,
            ..default
        }
    }

    pub fn noiseless(self) -> Self {
        Self { noise: 0.0, ..self }
    }

    pub fn segments(&self, system: &TransitSystem) -> Vec<LightCurveSegment> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let normal = Normal::new(0.0, self.noise).unwrap();
        let span = self.ncadences as f64 * self.cadence + self.gap;
        (0..self.nsegments)
            .map(|i| {
                let start = self.start + i as f64 * span;
                let time = (0..self.ncadences)
                    .map(|j| start + j as f64 * self.cadence)
                    .collect_vec();
                let model = system.light_curve(time.as_slice().into(), self.texp);
                let flux = model
                    .iter()
                    .map(|&flux| flux + normal.sample(&mut rng))
                    .collect_vec();
                let flux_err = vec![self.flux_err; self.ncadences];
                LightCurveSegment::new(time, flux, flux_err, self.texp).unwrap()
            })
            .collect()
    }
}

/// Posterior as a fit would build it from segments, with the injected system as the start
pub fn posterior_from_segments(
    system: TransitSystem,
    segments: Vec<LightCurveSegment>,
) -> PosteriorModel {
    let central = *system.central();
    let prior = StellarPrior::new(central.mass, 0.1, central.radius, 0.1);
    let (fit, other) = partition_segments(&system, segments);
    let gps = fit.iter().map(initial_gp).collect();
    PosteriorModel::new(system, gps, prior, fit, other)
}

/// Posterior of the default injection observed with `light_curve`
pub fn injected_posterior(light_curve: &SyntheticLightCurve) -> PosteriorModel {
    let system = injected_system(&Injection::default());
    let segments = light_curve.segments(&system);
    posterior_from_segments(system, segments)
}
