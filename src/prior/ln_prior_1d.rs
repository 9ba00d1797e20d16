use enum_dispatch::enum_dispatch;
use ordered_float::NotNan;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

#[enum_dispatch]
pub trait LnPrior1DTrait:
    Clone + Debug + Serialize + DeserializeOwned + PartialEq + Eq + Hash
{
    /// Evaluate the natural logarithm of the prior at x
    fn ln_prior_1d(&self, x: f64) -> f64;
}

/// Natural logarithm of prior for a single model parameter
#[enum_dispatch(LnPrior1DTrait)]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum LnPrior1D {
    Normal(NormalLnPrior1D),
    Beta(BetaLnPrior1D),
}

impl LnPrior1D {
    pub fn normal(mu: f64, std: f64) -> Self {
        NormalLnPrior1D::new(mu, std).into()
    }

    pub fn beta(alpha: f64, beta: f64) -> Self {
        BetaLnPrior1D::new(alpha, beta).into()
    }
}

/// Gaussian penalty `−½ ((x − μ) / σ)²`
///
/// The normalisation constant is omitted, it does not depend on `x`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(into = "NormalLnPrior1DParameters", from = "NormalLnPrior1DParameters")]
pub struct NormalLnPrior1D {
    mu: NotNan<f64>,
    inv_std2: NotNan<f64>,
}

impl NormalLnPrior1D {
    pub fn new(mu: f64, std: f64) -> Self {
        assert!(std > 0.0, "std must be positive");
        Self {
            mu: NotNan::new(mu).expect("mu must be not NaN"),
            inv_std2: NotNan::new(std.powi(-2)).expect("std must be positive and finite"),
        }
    }

    fn mu(&self) -> f64 {
        self.mu.into_inner()
    }

    fn inv_std2(&self) -> f64 {
        self.inv_std2.into_inner()
    }
}

impl LnPrior1DTrait for NormalLnPrior1D {
    fn ln_prior_1d(&self, x: f64) -> f64 {
        let diff = self.mu() - x;
        -0.5 * diff.powi(2) * self.inv_std2()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename = "NormalLnPrior1D")]
struct NormalLnPrior1DParameters {
    mu: f64,
    std: f64,
}

impl From<NormalLnPrior1D> for NormalLnPrior1DParameters {
    fn from(f: NormalLnPrior1D) -> Self {
        Self {
            mu: f.mu(),
            std: f.inv_std2().recip().sqrt(),
        }
    }
}

impl From<NormalLnPrior1DParameters> for NormalLnPrior1D {
    fn from(f: NormalLnPrior1DParameters) -> Self {
        Self::new(f.mu, f.std)
    }
}

/// Beta distribution log-density on [0, 1]
///
/// Values outside the support give `−∞`, as do the end points whenever the density vanishes
/// there.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(into = "BetaLnPrior1DParameters", from = "BetaLnPrior1DParameters")]
pub struct BetaLnPrior1D {
    alpha: NotNan<f64>,
    beta: NotNan<f64>,
    ln_prob_coeff: NotNan<f64>,
}

impl BetaLnPrior1D {
    pub fn new(alpha: f64, beta: f64) -> Self {
        assert!(
            alpha > 0.0 && beta > 0.0,
            "shape parameters must be positive"
        );
        Self {
            alpha: NotNan::new(alpha).expect("alpha must be not NaN"),
            beta: NotNan::new(beta).expect("beta must be not NaN"),
            ln_prob_coeff: NotNan::new(
                libm::lgamma(alpha + beta) - libm::lgamma(alpha) - libm::lgamma(beta),
            )
            .expect("shape parameters must be finite"),
        }
    }

    fn alpha(&self) -> f64 {
        self.alpha.into_inner()
    }

    fn beta(&self) -> f64 {
        self.beta.into_inner()
    }

    fn ln_prob_coeff(&self) -> f64 {
        self.ln_prob_coeff.into_inner()
    }
}

impl LnPrior1DTrait for BetaLnPrior1D {
    fn ln_prior_1d(&self, x: f64) -> f64 {
        if !(0.0..=1.0).contains(&x) {
            return f64::NEG_INFINITY;
        }
        self.ln_prob_coeff() + xlogy(self.alpha() - 1.0, x) + xlogy(self.beta() - 1.0, 1.0 - x)
    }
}

/// `a ln x` with `0 ln 0 = 0`
fn xlogy(a: f64, x: f64) -> f64 {
    if a == 0.0 { 0.0 } else { a * f64::ln(x) }
}

#[derive(Serialize, Deserialize)]
#[serde(rename = "BetaLnPrior1D")]
struct BetaLnPrior1DParameters {
    alpha: f64,
    beta: f64,
}

impl From<BetaLnPrior1D> for BetaLnPrior1DParameters {
    fn from(f: BetaLnPrior1D) -> Self {
        Self {
            alpha: f.alpha(),
            beta: f.beta(),
        }
    }
}

impl From<BetaLnPrior1DParameters> for BetaLnPrior1D {
    fn from(f: BetaLnPrior1DParameters) -> Self {
        Self::new(f.alpha, f.beta)
    }
}
