use std::f64::consts::{PI, TAU};

/// Newton's gravitational constant in R☉³ M☉⁻¹ day⁻²
pub const G_RSUN3_PER_MSUN_DAY2: f64 = 2945.4625385377644;

const KEPLER_MAX_ITERATIONS: usize = 50;
const KEPLER_TOLERANCE: f64 = 1e-12;

/// Semi-major axis in R☉ from Kepler's third law
///
/// `period` is in days, `total_mass` in M☉.
pub fn semi_major_axis(period: f64, total_mass: f64) -> f64 {
    (G_RSUN3_PER_MSUN_DAY2 * period.powi(2) * total_mass / (4.0 * PI * PI)).cbrt()
}

/// Eccentric anomaly solving `M = E - e sin E` with Newton iterations
pub(crate) fn eccentric_anomaly(mean_anomaly: f64, e: f64) -> f64 {
    let m = (mean_anomaly + PI).rem_euclid(TAU) - PI;
    if e == 0.0 {
        return m;
    }
    let mut ecc = if e < 0.8 { m + e * m.sin() } else { PI.copysign(m) };
    for _ in 0..KEPLER_MAX_ITERATIONS {
        let f = ecc - e * ecc.sin() - m;
        let step = f / (1.0 - e * ecc.cos());
        ecc -= step;
        if step.abs() < KEPLER_TOLERANCE {
            break;
        }
    }
    ecc
}

pub(crate) fn true_anomaly(eccentric_anomaly: f64, e: f64) -> f64 {
    let half = 0.5 * eccentric_anomaly;
    2.0 * f64::atan2((1.0 + e).sqrt() * half.sin(), (1.0 - e).sqrt() * half.cos())
}

fn mean_anomaly_from_true(true_anomaly: f64, e: f64) -> f64 {
    let half = 0.5 * true_anomaly;
    let ecc = 2.0 * f64::atan2((1.0 - e).sqrt() * half.sin(), (1.0 + e).sqrt() * half.cos());
    ecc - e * ecc.sin()
}

/// Sky-projected Keplerian orbit of a body in units of the central body radius
///
/// The observer looks along the positive line-of-sight axis, mid-transit happens when the
/// argument of latitude `omega + f` equals π/2.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ProjectedOrbit {
    period: f64,
    t_periastron: f64,
    e: f64,
    omega: f64,
    a: f64,
    cos_i: f64,
    sin_i: f64,
}

impl ProjectedOrbit {
    /// `a` is the semi-major axis in central radii, `b` the impact parameter at mid-transit
    ///
    /// Returns `None` if no inclination produces the requested impact parameter.
    pub(crate) fn new(period: f64, t0: f64, a: f64, b: f64, e: f64, omega: f64) -> Option<Self> {
        let cos_i = b * (1.0 + e * omega.sin()) / (a * (1.0 - e * e));
        if !(0.0..=1.0).contains(&cos_i) {
            return None;
        }
        let f_transit = 0.5 * PI - omega;
        let t_periastron = t0 - period * mean_anomaly_from_true(f_transit, e) / TAU;
        Some(Self {
            period,
            t_periastron,
            e,
            omega,
            a,
            cos_i,
            sin_i: (1.0 - cos_i * cos_i).sqrt(),
        })
    }

    /// Projected separation from the centre of the central body and a flag telling whether the
    /// body is in front of it
    pub(crate) fn separation(&self, t: f64) -> (f64, bool) {
        let mean_anomaly = TAU * (t - self.t_periastron) / self.period;
        let ecc = eccentric_anomaly(mean_anomaly, self.e);
        let f = true_anomaly(ecc, self.e);
        let r = self.a * (1.0 - self.e * ecc.cos());
        let (sin_u, cos_u) = (self.omega + f).sin_cos();
        let x = r * cos_u;
        let y = r * sin_u * self.cos_i;
        let z = r * sin_u * self.sin_i;
        (x.hypot(y), z > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn earth_semi_major_axis() {
        // 1 au is 215.03 R☉
        assert_relative_eq!(
            semi_major_axis(365.25, 1.0),
            215.03,
            max_relative = 1e-3
        );
    }

    #[test]
    fn kepler_equation_is_solved() {
        for &e in &[0.0, 0.1, 0.5, 0.9, 0.99] {
            for i in 0..32 {
                let m = -PI + TAU * (i as f64) / 32.0;
                let ecc = eccentric_anomaly(m, e);
                assert_relative_eq!(ecc - e * ecc.sin(), m, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn true_anomaly_round_trip() {
        for &e in &[0.0, 0.3, 0.8] {
            let f = 1.2;
            let m = mean_anomaly_from_true(f, e);
            let ecc = eccentric_anomaly(m, e);
            assert_relative_eq!(true_anomaly(ecc, e), f, epsilon = 1e-10);
        }
    }

    #[test]
    fn impact_parameter_at_mid_transit() {
        for &(e, omega) in &[(0.0, 0.0), (0.3, 0.7), (0.6, -2.0)] {
            let orbit = ProjectedOrbit::new(10.0, 3.0, 20.0, 0.4, e, omega).unwrap();
            let (sep, in_front) = orbit.separation(3.0);
            assert!(in_front);
            assert_relative_eq!(sep, 0.4, epsilon = 1e-9);
        }
    }

    #[test]
    fn behind_the_star_half_a_period_later() {
        let orbit = ProjectedOrbit::new(10.0, 3.0, 20.0, 0.0, 0.0, 0.0).unwrap();
        let (sep, in_front) = orbit.separation(8.0);
        assert!(!in_front);
        assert!(sep < 1e-9);
    }

    #[test]
    fn grazing_orbit_is_rejected() {
        assert!(ProjectedOrbit::new(10.0, 0.0, 2.0, 2.5, 0.0, 0.0).is_none());
    }
}
