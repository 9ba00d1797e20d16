//! Log-posterior of a transit system with per-segment Gaussian-process noise

mod blob;
pub use blob::{Blob, SegmentPrediction};

mod layout;
pub use layout::ParameterLayout;

use crate::data::LightCurveSegment;
use crate::gp::GaussianProcess;
use crate::prior::StellarPrior;
use crate::transit::TransitSystem;

use log::{debug, trace};
use std::sync::Arc;

/// Log-probability density sampled by [EnsembleSampler](crate::EnsembleSampler)
///
/// Evaluation takes `&mut self` because implementations may cache intermediate results. Every
/// parallel worker owns its own clone.
pub trait LogPosterior: Clone + Send + Sync {
    /// Auxiliary data returned with every evaluation, the default value marks a rejected point
    type Blob: Clone + Default + Send + Sync;

    /// Evaluate the natural logarithm of the posterior, `−∞` for points outside the support
    fn ln_posterior(&mut self, vector: &[f64]) -> (f64, Self::Blob);
}

/// Posterior of one target
///
/// Combines the transit system, one noise model per fit segment and the stellar prior. Fit
/// segments enter the likelihood, other segments are only used to count transit cadences.
/// Light curves are shared between clones.
#[derive(Clone, Debug)]
pub struct PosteriorModel {
    system: TransitSystem,
    gps: Vec<GaussianProcess>,
    prior: StellarPrior,
    fit: Arc<[LightCurveSegment]>,
    other: Arc<[LightCurveSegment]>,
    layout: ParameterLayout,
}

impl PosteriorModel {
    /// `gps` must contain one noise model per fit segment, they are bound to the segment grids
    /// here
    pub fn new(
        system: TransitSystem,
        mut gps: Vec<GaussianProcess>,
        prior: StellarPrior,
        fit: Vec<LightCurveSegment>,
        other: Vec<LightCurveSegment>,
    ) -> Self {
        assert_eq!(
            gps.len(),
            fit.len(),
            "one noise model per fit segment is required"
        );
        for (gp, lc) in gps.iter_mut().zip(&fit) {
            gp.compute(lc.time(), lc.flux_err());
        }
        let layout = ParameterLayout::new(&system, &gps);
        debug!(
            "posterior with {} parameters, {} fit segments and {} other segments",
            layout.len(),
            fit.len(),
            other.len()
        );
        Self {
            system,
            gps,
            prior,
            fit: fit.into(),
            other: other.into(),
            layout,
        }
    }

    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    pub fn parameter_names(&self) -> &[String] {
        self.layout.names()
    }

    /// Current parameter vector
    pub fn initial_vector(&self) -> Vec<f64> {
        let mut vector = self.system.get_vector();
        for gp in &self.gps {
            vector.extend(gp.get_vector());
        }
        vector
    }

    pub fn system(&self) -> &TransitSystem {
        &self.system
    }

    pub fn gps(&self) -> &[GaussianProcess] {
        &self.gps
    }

    pub fn fit_segments(&self) -> &[LightCurveSegment] {
        &self.fit
    }

    pub fn other_segments(&self) -> &[LightCurveSegment] {
        &self.other
    }

    /// Total number of cadences of the fit segments
    pub fn fit_cadences(&self) -> usize {
        self.fit.iter().map(LightCurveSegment::len).sum()
    }

    /// Log-prior at the current state
    pub fn ln_prior(&self) -> f64 {
        self.prior
            .ln_prior(self.system.central(), self.system.bodies())
    }

    /// Log-likelihood at the current state
    pub fn ln_likelihood(&mut self) -> f64 {
        self.likelihood(false)
            .map_or(f64::NEG_INFINITY, |(ln_like, _)| ln_like)
    }

    /// Sum of segment log-likelihoods, `None` as soon as one of them is not finite
    fn likelihood(&mut self, predict: bool) -> Option<(f64, Vec<SegmentPrediction>)> {
        let mut ln_like = 0.0;
        let mut residuals = Vec::with_capacity(self.fit.len());
        for (gp, lc) in self.gps.iter_mut().zip(self.fit.iter()) {
            let model = self.system.light_curve(lc.time(), lc.texp());
            let residual = lc.residual(model.view());
            ln_like += gp.ln_likelihood(residual.view());
            if !ln_like.is_finite() {
                return None;
            }
            residuals.push((residual, model));
        }
        if !predict {
            return Some((ln_like, vec![]));
        }
        let predictions = self
            .gps
            .iter_mut()
            .zip(residuals)
            .map(|(gp, (residual, model))| {
                let mean = gp.predict(residual.view())?;
                Some(SegmentPrediction {
                    gp: mean + &model,
                    model,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some((ln_like, predictions))
    }

    /// Cadences of the other segments where the model at native times is below the central flux
    fn transit_cadences(&self) -> usize {
        let flux = self.system.central().flux;
        self.other
            .iter()
            .map(|lc| {
                self.system
                    .light_curve_instantaneous(lc.time())
                    .iter()
                    .filter(|&&f| f < flux)
                    .count()
            })
            .sum()
    }

    /// Log-posterior and blob at the given vector
    ///
    /// Invalid vectors give `−∞` with a partially filled blob and never panic. The result
    /// depends on the vector only.
    pub fn evaluate(&mut self, vector: &[f64]) -> (f64, Blob) {
        if vector.len() != self.layout.len() {
            trace!(
                "vector of length {} instead of {}",
                vector.len(),
                self.layout.len()
            );
            return (f64::NEG_INFINITY, Blob::default());
        }
        if let Err(err) = self.system.set_vector(&vector[self.layout.system()]) {
            trace!("system rejected the vector: {err}");
            return (f64::NEG_INFINITY, Blob::default());
        }
        let mut blob = Blob {
            orbit: self.system.orbital_summary(),
            ..Blob::default()
        };

        for (i, gp) in self.gps.iter_mut().enumerate() {
            if let Err(err) = gp.set_vector(&vector[self.layout.gp(i)]) {
                trace!("noise model {i} rejected the vector: {err}");
                return (f64::NEG_INFINITY, blob);
            }
        }

        let ln_prior = self.ln_prior();
        if !ln_prior.is_finite() {
            return (f64::NEG_INFINITY, blob);
        }

        let Some((ln_like, predictions)) = self.likelihood(true) else {
            return (f64::NEG_INFINITY, blob);
        };
        blob.predictions = predictions;
        blob.ncadence = self.transit_cadences();

        (ln_prior + ln_like, blob)
    }
}

impl LogPosterior for PosteriorModel {
    type Blob = Blob;

    fn ln_posterior(&mut self, vector: &[f64]) -> (f64, Blob) {
        self.evaluate(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::gp::Matern32Kernel;
    use crate::transit::{Body, Central};

    use ndarray::Array1;

    fn system() -> TransitSystem {
        let mut system = TransitSystem::new(Central {
            flux: 1.0,
            radius: 1.0,
            mass: 1.0,
            q1: 0.5,
            q2: 0.5,
        })
        .unwrap();
        system
            .add_body(Body {
                radius: 0.1,
                period: 50.0,
                t0: 5.0,
                b: 0.2,
                e: 0.01,
                omega: 0.0,
                mass: 0.0,
            })
            .unwrap();
        system.freeze_parameter("bodies*:mass");
        system
    }

    fn model() -> PosteriorModel {
        let system = system();
        let time = Array1::linspace(4.5, 5.5, 40);
        let flux = system.light_curve(time.view(), 0.02);
        let fit = LightCurveSegment::new(time, flux, Array1::from_elem(40, 1e-3), 0.02).unwrap();
        let other_time = Array1::linspace(54.5, 55.5, 40);
        let other = LightCurveSegment::new(
            other_time,
            Array1::ones(40),
            Array1::from_elem(40, 1e-3),
            0.02,
        )
        .unwrap();
        let gp = GaussianProcess::new(Matern32Kernel::new(1e-8, 4.0), f64::ln(1e-8));
        PosteriorModel::new(
            system,
            vec![gp],
            StellarPrior::new(1.0, 0.1, 1.0, 0.1),
            vec![fit],
            vec![other],
        )
    }

    #[test]
    fn layout_concatenates_blocks() {
        let model = model();
        assert_eq!(model.layout().len(), 14);
        assert_eq!(model.layout().system(), 0..11);
        assert_eq!(model.layout().gp(0), 11..14);
        assert_eq!(model.parameter_names()[12], "gp[0]:ln_metric");
        assert_eq!(model.initial_vector().len(), 14);
    }

    #[test]
    fn blob_of_a_valid_point() {
        let mut model = model();
        let v = model.initial_vector();
        let (lnp, blob) = model.evaluate(&v);
        assert!(lnp.is_finite());
        let orbit = blob.orbit.unwrap();
        assert_eq!(orbit.period, model.system().bodies()[0].period);
        assert_eq!(blob.predictions.len(), 1);
        assert_eq!(blob.predictions[0].model.len(), 40);
        // Second transit falls into the other segment
        assert!(blob.ncadence > 0);
    }

    #[test]
    fn terms_add_up() {
        let mut model = model();
        let v = model.initial_vector();
        let (lnp, _) = model.evaluate(&v);
        let expected = model.ln_prior() + model.ln_likelihood();
        assert_eq!(lnp, expected);
    }

    #[test]
    fn bad_gp_block_keeps_orbit() {
        let mut model = model();
        let mut v = model.initial_vector();
        v[12] = f64::NAN;
        let (lnp, blob) = model.evaluate(&v);
        assert_eq!(lnp, f64::NEG_INFINITY);
        assert!(blob.orbit.is_some());
        assert!(blob.predictions.is_empty());
        assert_eq!(blob.ncadence, 0);
    }
}
