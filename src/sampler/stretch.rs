use crate::error::SamplerError;

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::Rng;

/// Affine-invariant stretch move of Goodman & Weare (2010)
///
/// The proposal for walker `x` given a complementary walker `c` is `c + z (x − c)` where `z` is
/// drawn from `g(z) ∝ 1 / √z` on `[1/a, a]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StretchMove {
    a: f64,
}

impl Default for StretchMove {
    fn default() -> Self {
        Self { a: 2.0 }
    }
}

impl StretchMove {
    pub fn new(a: f64) -> Result<Self, SamplerError> {
        if a > 1.0 {
            Ok(Self { a })
        } else {
            Err(SamplerError::StretchScale)
        }
    }

    pub fn scale(&self) -> f64 {
        self.a
    }

    pub fn sample_z<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.random();
        ((self.a - 1.0) * u + 1.0).powi(2) / self.a
    }

    /// Proposal and stretch factor for `current` against a random row of `complementary`
    pub fn propose<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        current: ArrayView1<f64>,
        complementary: ArrayView2<f64>,
    ) -> (Array1<f64>, f64) {
        let z = self.sample_z(rng);
        let c = complementary.row(rng.random_range(0..complementary.nrows()));
        (&c + &((&current - &c) * z), z)
    }

    /// Natural logarithm of the acceptance ratio
    pub fn ln_acceptance(&self, z: f64, ndim: usize, ln_prob_old: f64, ln_prob_new: f64) -> f64 {
        (ndim as f64 - 1.0) * z.ln() + ln_prob_new - ln_prob_old
    }
}
