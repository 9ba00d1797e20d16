use crate::error::InvalidParameter;
use crate::transit::occultation::{Occultation, QuadraticLimbDarkening};
use crate::transit::orbit::{ProjectedOrbit, semi_major_axis};

use itertools::Itertools;
use ndarray::{Array1, ArrayView1};

/// Names of the central body parameters in vector order
pub const CENTRAL_PARAMETERS: [&str; 5] = ["ln_flux", "ln_radius", "ln_mass", "q1", "q2"];

/// Names of an orbiting body parameters in vector order
pub const BODY_PARAMETERS: [&str; 7] = ["ln_radius", "ln_period", "t0", "b", "e", "omega", "mass"];

/// Default number of sub-exposures used to integrate the flux over an exposure
const DEFAULT_SUPERSAMPLE: usize = 7;

/// Central body: flux normalisation, radius (R☉), mass (M☉) and limb darkening
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Central {
    pub flux: f64,
    pub radius: f64,
    pub mass: f64,
    pub q1: f64,
    pub q2: f64,
}

impl Central {
    fn to_parameters(self) -> [f64; CENTRAL_PARAMETERS.len()] {
        [
            self.flux.ln(),
            self.radius.ln(),
            self.mass.ln(),
            self.q1,
            self.q2,
        ]
    }

    fn from_parameters(p: &[f64]) -> Self {
        Self {
            flux: p[0].exp(),
            radius: p[1].exp(),
            mass: p[2].exp(),
            q1: p[3],
            q2: p[4],
        }
    }
}

/// Orbiting body
///
/// `radius` is in R☉, `period` and `t0` (mid-transit epoch) in days, `b` is the impact
/// parameter in units of the central radius, `omega` is the argument of periapsis in radians and
/// `mass` is in M☉.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    pub radius: f64,
    pub period: f64,
    pub t0: f64,
    pub b: f64,
    pub e: f64,
    pub omega: f64,
    pub mass: f64,
}

impl Body {
    fn to_parameters(self) -> [f64; BODY_PARAMETERS.len()] {
        [
            self.radius.ln(),
            self.period.ln(),
            self.t0,
            self.b,
            self.e,
            self.omega,
            self.mass,
        ]
    }

    fn from_parameters(p: &[f64]) -> Self {
        Self {
            radius: p[0].exp(),
            period: p[1].exp(),
            t0: p[2],
            b: p[3],
            e: p[4],
            omega: p[5],
            mass: p[6],
        }
    }
}

/// Period, eccentricity and impact parameter of the first orbiting body
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitalSummary {
    pub period: f64,
    pub eccentricity: f64,
    pub impact: f64,
}

/// Everything derived from a validated parameter set
#[derive(Clone, Debug, PartialEq)]
struct Geometry {
    central: Central,
    bodies: Vec<Body>,
    orbits: Vec<ProjectedOrbit>,
    occultation: Occultation,
}

impl Geometry {
    fn derive(values: &[f64], names: &[String]) -> Result<Self, InvalidParameter> {
        if let Some((name, &value)) = names.iter().zip(values).find(|(_, v)| !v.is_finite()) {
            return Err(InvalidParameter::NonFinite {
                name: name.clone(),
                value,
            });
        }

        let (central_values, body_values) = values.split_at(CENTRAL_PARAMETERS.len());
        let central = Central::from_parameters(central_values);
        for (i, q) in [central.q1, central.q2].into_iter().enumerate() {
            if !(0.0..=1.0).contains(&q) {
                return Err(InvalidParameter::OutOfDomain {
                    name: names[3 + i].clone(),
                    value: q,
                    domain: "[0, 1]",
                });
            }
        }

        let mut bodies = Vec::with_capacity(body_values.len() / BODY_PARAMETERS.len());
        let mut orbits = Vec::with_capacity(bodies.capacity());
        for (i, chunk) in body_values.chunks(BODY_PARAMETERS.len()).enumerate() {
            let body = Body::from_parameters(chunk);
            let offset = CENTRAL_PARAMETERS.len() + i * BODY_PARAMETERS.len();
            let out_of_domain = |j: usize, value: f64, domain| InvalidParameter::OutOfDomain {
                name: names[offset + j].clone(),
                value,
                domain,
            };
            if !(0.0..1.0).contains(&body.e) {
                return Err(out_of_domain(4, body.e, "[0, 1)"));
            }
            if body.b < 0.0 {
                return Err(out_of_domain(3, body.b, "[0, ∞)"));
            }
            if body.mass < 0.0 {
                return Err(out_of_domain(6, body.mass, "[0, ∞)"));
            }

            let a = semi_major_axis(body.period, central.mass + body.mass) / central.radius;
            if a * (1.0 - body.e) <= 1.0 + body.radius / central.radius {
                return Err(InvalidParameter::Geometry {
                    body: i,
                    reason: "periastron is inside the central body",
                });
            }
            let orbit = ProjectedOrbit::new(body.period, body.t0, a, body.b, body.e, body.omega)
                .ok_or(InvalidParameter::Geometry {
                    body: i,
                    reason: "impact parameter is larger than the orbit allows",
                })?;
            bodies.push(body);
            orbits.push(orbit);
        }

        Ok(Self {
            occultation: Occultation::new(QuadraticLimbDarkening::from_q(central.q1, central.q2)),
            central,
            bodies,
            orbits,
        })
    }
}

/// Shell-style pattern matching supporting `*` and `?`
fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut p, mut n) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some(&c) if c == '?' || c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((bp, bn)) => {
                    p = bp + 1;
                    n = bn + 1;
                    backtrack = Some((bp, bn + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

/// Star with zero or more transiting bodies
///
/// The system owns the full parameter set and a frozen flag per parameter. The free parameters
/// form the flat vector exchanged with the sampler: central body first, then bodies in insertion
/// order, each in [CENTRAL_PARAMETERS] / [BODY_PARAMETERS] order. Positive quantities are
/// sampled in natural logarithm.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitSystem {
    names: Vec<String>,
    values: Vec<f64>,
    frozen: Vec<bool>,
    geometry: Geometry,
    supersample: usize,
}

impl TransitSystem {
    pub fn new(central: Central) -> Result<Self, InvalidParameter> {
        let names = CENTRAL_PARAMETERS
            .iter()
            .map(|name| format!("central:{name}"))
            .collect_vec();
        let values = central.to_parameters().to_vec();
        let geometry = Geometry::derive(&values, &names)?;
        Ok(Self {
            frozen: vec![false; values.len()],
            names,
            values,
            geometry,
            supersample: DEFAULT_SUPERSAMPLE,
        })
    }

    /// Set the number of sub-exposures used by [TransitSystem::light_curve]
    pub fn with_supersample(mut self, supersample: usize) -> Self {
        self.supersample = supersample.max(1);
        self
    }

    pub fn add_body(&mut self, body: Body) -> Result<(), InvalidParameter> {
        let index = self.geometry.bodies.len();
        let mut names = self.names.clone();
        names.extend(
            BODY_PARAMETERS
                .iter()
                .map(|name| format!("bodies[{index}]:{name}")),
        );
        let mut values = self.values.clone();
        values.extend(body.to_parameters());
        self.geometry = Geometry::derive(&values, &names)?;
        self.frozen.extend([false; BODY_PARAMETERS.len()]);
        self.names = names;
        self.values = values;
        Ok(())
    }

    /// Freeze every parameter whose full name matches the pattern, returns the number of matches
    pub fn freeze_parameter(&mut self, pattern: &str) -> usize {
        self.set_frozen(pattern, true)
    }

    /// Thaw every parameter whose full name matches the pattern, returns the number of matches
    pub fn thaw_parameter(&mut self, pattern: &str) -> usize {
        self.set_frozen(pattern, false)
    }

    fn set_frozen(&mut self, pattern: &str, frozen: bool) -> usize {
        let mut count = 0;
        for (name, flag) in self.names.iter().zip(self.frozen.iter_mut()) {
            if glob_match(pattern, name) {
                *flag = frozen;
                count += 1;
            }
        }
        count
    }

    fn free_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.frozen
            .iter()
            .enumerate()
            .filter(|(_, frozen)| !**frozen)
            .map(|(i, _)| i)
    }

    /// Number of free parameters
    pub fn len(&self) -> usize {
        self.frozen.iter().filter(|frozen| !**frozen).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.free_indices().map(|i| self.names[i].clone()).collect()
    }

    pub fn get_vector(&self) -> Vec<f64> {
        self.free_indices().map(|i| self.values[i]).collect()
    }

    /// Value of any parameter, free or frozen, by its full name
    pub fn get_parameter(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    /// Replace the free parameters
    ///
    /// The update is all-or-nothing: on error the system keeps its previous state.
    pub fn set_vector(&mut self, vector: &[f64]) -> Result<(), InvalidParameter> {
        let expected = self.len();
        if vector.len() != expected {
            return Err(InvalidParameter::WrongLength {
                actual: vector.len(),
                expected,
            });
        }
        let mut values = self.values.clone();
        for (i, &x) in self.free_indices().zip(vector) {
            values[i] = x;
        }
        self.geometry = Geometry::derive(&values, &self.names)?;
        self.values = values;
        Ok(())
    }

    pub fn central(&self) -> &Central {
        &self.geometry.central
    }

    pub fn bodies(&self) -> &[Body] {
        &self.geometry.bodies
    }

    pub fn orbital_summary(&self) -> Option<OrbitalSummary> {
        self.geometry.bodies.first().map(|body| OrbitalSummary {
            period: body.period,
            eccentricity: body.e,
            impact: body.b,
        })
    }

    fn blocked_fraction(&self, t: f64) -> f64 {
        let central_radius = self.geometry.central.radius;
        self.geometry
            .bodies
            .iter()
            .zip(&self.geometry.orbits)
            .map(|(body, orbit)| match orbit.separation(t) {
                (z, true) => self
                    .geometry
                    .occultation
                    .blocked_fraction(body.radius / central_radius, z),
                (_, false) => 0.0,
            })
            .sum()
    }

    /// Flux at the given instants
    pub fn light_curve_instantaneous(&self, t: ArrayView1<f64>) -> Array1<f64> {
        let flux = self.geometry.central.flux;
        t.mapv(|t| flux * (1.0 - self.blocked_fraction(t)))
    }

    /// Flux averaged over exposures of length `texp` centred at the given times
    pub fn light_curve(&self, t: ArrayView1<f64>, texp: f64) -> Array1<f64> {
        if self.supersample == 1 || texp <= 0.0 {
            return self.light_curve_instantaneous(t);
        }
        let flux = self.geometry.central.flux;
        let n = self.supersample as f64;
        let offsets = (0..self.supersample)
            .map(|k| texp * ((k as f64 + 0.5) / n - 0.5))
            .collect_vec();
        t.mapv(|t| {
            let blocked: f64 = offsets
                .iter()
                .map(|dt| self.blocked_fraction(t + dt))
                .sum();
            flux * (1.0 - blocked / n)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use ndarray::Array1;

    fn sun() -> Central {
        Central {
            flux: 1.0,
            radius: 1.0,
            mass: 1.0,
            q1: 0.5,
            q2: 0.5,
        }
    }

    fn jupiter() -> Body {
        Body {
            radius: 0.1,
            period: 100.0,
            t0: 10.0,
            b: 0.3,
            e: 0.01,
            omega: 0.0,
            mass: 0.0,
        }
    }

    fn system() -> TransitSystem {
        let mut system = TransitSystem::new(sun()).unwrap();
        system.add_body(jupiter()).unwrap();
        system.thaw_parameter("*");
        system.freeze_parameter("bodies*:mass");
        system
    }

    #[test]
    fn glob() {
        assert!(glob_match("*", "central:q1"));
        assert!(glob_match("bodies*:mass", "bodies[0]:mass"));
        assert!(!glob_match("bodies*:mass", "bodies[0]:ln_radius"));
        assert!(glob_match("central:q?", "central:q2"));
        assert!(!glob_match("central", "central:q2"));
    }

    #[test]
    fn free_parameters() {
        let system = system();
        assert_eq!(system.len(), 11);
        let names = system.parameter_names();
        assert_eq!(names[0], "central:ln_flux");
        assert_eq!(names[5], "bodies[0]:ln_radius");
        assert!(!names.iter().any(|name| name.ends_with(":mass")));
        assert_eq!(system.get_parameter("bodies[0]:mass"), Some(0.0));
    }

    #[test]
    fn vector_round_trip() {
        let mut system = system();
        let mut v = system.get_vector();
        v[6] = f64::ln(200.0);
        system.set_vector(&v).unwrap();
        assert_relative_eq!(system.bodies()[0].period, 200.0, epsilon = 1e-9);
        assert_eq!(system.get_vector(), v);
    }

    #[test]
    fn rejection_keeps_state() {
        let mut system = system();
        let before = system.clone();

        let mut v = system.get_vector();
        v[9] = 1.2; // e
        v[6] = f64::ln(50.0); // period, must not be applied
        assert!(matches!(
            system.set_vector(&v),
            Err(InvalidParameter::OutOfDomain { .. })
        ));
        assert_eq!(system, before);

        assert!(matches!(
            system.set_vector(&v[..5]),
            Err(InvalidParameter::WrongLength {
                actual: 5,
                expected: 11
            })
        ));
        assert_eq!(system, before);

        let mut v = system.get_vector();
        v[8] = 1e6; // b
        assert!(matches!(
            system.set_vector(&v),
            Err(InvalidParameter::Geometry { body: 0, .. })
        ));
        assert_eq!(system, before);

        let mut v = system.get_vector();
        v[3] = f64::NAN;
        assert!(matches!(
            system.set_vector(&v),
            Err(InvalidParameter::NonFinite { .. })
        ));
        assert_eq!(system, before);
    }

    #[test]
    fn transit_shape() {
        let system = system();
        let t = Array1::from(vec![10.0, 10.05, 12.0, 60.0]);
        let flux = system.light_curve_instantaneous(t.view());
        assert!(flux[0] < 0.99);
        assert!(flux[1] < 0.99);
        assert_eq!(flux[2], 1.0);
        assert_eq!(flux[3], 1.0);

        let periodic = system.light_curve_instantaneous(Array1::from(vec![110.0]).view());
        assert_relative_eq!(periodic[0], flux[0], epsilon = 1e-9);
    }

    #[test]
    fn exposure_smooths_ingress() {
        let system = system();
        let t = Array1::from(vec![10.0]);
        let instantaneous = system.light_curve_instantaneous(t.view());
        let averaged = system.light_curve(t.view(), 0.02);
        assert!(averaged[0] < 1.0);
        assert_relative_eq!(averaged[0], instantaneous[0], max_relative = 1e-3);
        let flat = system.light_curve(Array1::from(vec![30.0]).view(), 0.02);
        assert_eq!(flat[0], 1.0);
    }
}
