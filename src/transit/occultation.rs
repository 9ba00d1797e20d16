use std::f64::consts::PI;

/// Number of annuli the stellar disk is split into
const DEFAULT_ANNULI: usize = 100;

/// Quadratic limb-darkening law in the Kipping (2013) `q1`, `q2` parametrisation
///
/// `I(μ) / I(1) = 1 - u1 (1 - μ) - u2 (1 - μ)²` with `u1 = 2 √q1 q2`, `u2 = √q1 (1 - 2 q2)`.
/// Any `q1, q2 ∈ [0, 1]` gives a positive, monotonically decreasing profile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadraticLimbDarkening {
    pub u1: f64,
    pub u2: f64,
}

impl QuadraticLimbDarkening {
    pub fn from_q(q1: f64, q2: f64) -> Self {
        let sqrt_q1 = q1.sqrt();
        Self {
            u1: 2.0 * sqrt_q1 * q2,
            u2: sqrt_q1 * (1.0 - 2.0 * q2),
        }
    }

    /// Relative intensity at radius `r` of the unit disk
    pub fn intensity(&self, r: f64) -> f64 {
        let one_minus_mu = 1.0 - (1.0 - r * r).max(0.0).sqrt();
        1.0 - self.u1 * one_minus_mu - self.u2 * one_minus_mu * one_minus_mu
    }
}

/// Area of the intersection of a disk of radius `r` centred at the origin with a disk of
/// radius `p` centred at distance `z`
fn overlap_area(r: f64, p: f64, z: f64) -> f64 {
    if r <= 0.0 || p <= 0.0 || z >= r + p {
        return 0.0;
    }
    if z <= (r - p).abs() {
        let smaller = r.min(p);
        return PI * smaller * smaller;
    }
    let r2 = r * r;
    let p2 = p * p;
    let z2 = z * z;
    let kappa_r = ((z2 + r2 - p2) / (2.0 * z * r)).clamp(-1.0, 1.0).acos();
    let kappa_p = ((z2 + p2 - r2) / (2.0 * z * p)).clamp(-1.0, 1.0).acos();
    let lens = ((-z + r + p) * (z + r - p) * (z - r + p) * (z + r + p)).max(0.0);
    r2 * kappa_r + p2 * kappa_p - 0.5 * lens.sqrt()
}

/// Fraction of the limb-darkened stellar flux blocked by an opaque disk
///
/// The stellar disk is split into concentric annuli of constant intensity; the blocked area of
/// every annulus is computed exactly, so the only approximation is the piecewise-constant
/// intensity profile.
#[derive(Clone, Debug, PartialEq)]
pub struct Occultation {
    edges: Vec<f64>,
    weights: Vec<f64>,
}

impl Occultation {
    pub fn new(limb_darkening: QuadraticLimbDarkening) -> Self {
        Self::with_annuli(limb_darkening, DEFAULT_ANNULI)
    }

    pub fn with_annuli(limb_darkening: QuadraticLimbDarkening, annuli: usize) -> Self {
        assert!(annuli > 0, "at least one annulus is required");
        let edges: Vec<f64> = (0..=annuli).map(|i| i as f64 / annuli as f64).collect();
        let intensities: Vec<f64> = edges
            .windows(2)
            .map(|w| limb_darkening.intensity(0.5 * (w[0] + w[1])))
            .collect();
        let total: f64 = edges
            .windows(2)
            .zip(&intensities)
            .map(|(w, &i)| i * PI * (w[1] * w[1] - w[0] * w[0]))
            .sum();
        let weights = intensities.into_iter().map(|i| i / total).collect();
        Self { edges, weights }
    }

    /// Blocked flux fraction for a disk of radius `p` at projected distance `z`, both in units of
    /// the stellar radius
    pub fn blocked_fraction(&self, p: f64, z: f64) -> f64 {
        if p <= 0.0 || z >= 1.0 + p {
            return 0.0;
        }
        let mut previous = 0.0;
        let mut blocked = 0.0;
        for (&edge, &weight) in self.edges[1..].iter().zip(&self.weights) {
            let area = overlap_area(edge, p, z);
            blocked += weight * (area - previous);
            previous = area;
        }
        blocked
    }
}
