use crate::error::LightCurveError;

use itertools::{Itertools, izip};
use ndarray::{Array1, ArrayView1, Zip};

/// One contiguous chunk of observations
///
/// Arrays are immutable after construction. `texp` is the exposure time of every cadence in the
/// same units as `time` (days).
#[derive(Clone, Debug, PartialEq)]
pub struct LightCurveSegment {
    time: Array1<f64>,
    flux: Array1<f64>,
    flux_err: Array1<f64>,
    texp: f64,
}

impl LightCurveSegment {
    /// Construct a segment from time, flux, flux error and exposure time
    ///
    /// All arrays must have the same non-zero length and `texp` must be positive.
    pub fn new(
        time: impl Into<Array1<f64>>,
        flux: impl Into<Array1<f64>>,
        flux_err: impl Into<Array1<f64>>,
        texp: f64,
    ) -> Result<Self, LightCurveError> {
        let time = time.into();
        let flux = flux.into();
        let flux_err = flux_err.into();
        if time.len() != flux.len() || time.len() != flux_err.len() {
            return Err(LightCurveError::LengthMismatch {
                time: time.len(),
                flux: flux.len(),
                flux_err: flux_err.len(),
            });
        }
        if time.is_empty() {
            return Err(LightCurveError::Empty);
        }
        if !(texp.is_finite() && texp > 0.0) {
            return Err(LightCurveError::ExposureTime(texp));
        }
        Ok(Self {
            time,
            flux,
            flux_err,
            texp,
        })
    }

    #[inline]
    pub fn time(&self) -> ArrayView1<'_, f64> {
        self.time.view()
    }

    #[inline]
    pub fn flux(&self) -> ArrayView1<'_, f64> {
        self.flux.view()
    }

    #[inline]
    pub fn flux_err(&self) -> ArrayView1<'_, f64> {
        self.flux_err.view()
    }

    #[inline]
    pub fn texp(&self) -> f64 {
        self.texp
    }

    /// Number of cadences
    #[inline]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Always `false`, empty segments cannot be constructed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Population variance of the flux
    pub fn flux_variance(&self) -> f64 {
        self.flux.var(0.0)
    }

    pub fn mean_flux_err(&self) -> f64 {
        self.flux_err.mean().unwrap_or(f64::NAN)
    }

    /// Residual of the observed flux against a model evaluated on the same time grid
    pub fn residual(&self, model: ArrayView1<f64>) -> Array1<f64> {
        assert_eq!(model.len(), self.len(), "model must be aligned to the segment");
        Zip::from(&self.flux)
            .and(&model)
            .map_collect(|&flux, &model| flux - model)
    }

    /// Keep cadences for which `keep` returns `true`
    ///
    /// Returns `None` if no cadence is left.
    pub fn retain(&self, keep: impl Fn(f64) -> bool) -> Option<Self> {
        let (time, flux, flux_err): (Vec<_>, Vec<_>, Vec<_>) =
            izip!(&self.time, &self.flux, &self.flux_err)
                .filter(|(t, _, _)| keep(**t))
                .map(|(&t, &f, &e)| (t, f, e))
                .multiunzip();
        Self::new(time, flux, flux_err, self.texp).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn segment() -> LightCurveSegment {
        LightCurveSegment::new(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![1.0, 0.5, 1.5, 1.0],
            vec![0.1, 0.2, 0.3, 0.2],
            0.02,
        )
        .unwrap()
    }

    #[test]
    fn length_mismatch() {
        let err = LightCurveSegment::new(vec![0.0, 1.0], vec![1.0], vec![0.1, 0.1], 0.02);
        assert!(matches!(
            err,
            Err(LightCurveError::LengthMismatch {
                time: 2,
                flux: 1,
                flux_err: 2
            })
        ));
    }

    #[test]
    fn empty_and_bad_exposure() {
        let nothing = Vec::<f64>::new();
        let empty = LightCurveSegment::new(nothing.clone(), nothing.clone(), nothing, 0.02);
        assert!(matches!(empty, Err(LightCurveError::Empty)));
        let texp = LightCurveSegment::new(vec![0.0], vec![1.0], vec![0.1], 0.0);
        assert!(matches!(texp, Err(LightCurveError::ExposureTime(_))));
    }

    #[test]
    fn statistics() {
        let lc = segment();
        // np.var([1.0, 0.5, 1.5, 1.0])
        assert_relative_eq!(lc.flux_variance(), 0.125, epsilon = 1e-12);
        assert_relative_eq!(lc.mean_flux_err(), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn retain_drops_cadences() {
        let lc = segment();
        let kept = lc.retain(|t| t != 1.0).unwrap();
        assert_eq!(kept.len(), 3);
        assert_eq!(kept.flux().to_vec(), vec![1.0, 1.5, 1.0]);
        assert!(lc.retain(|_| false).is_none());
    }

    #[test]
    fn residual() {
        let lc = segment();
        let model = Array1::from_elem(4, 1.0);
        assert_eq!(lc.residual(model.view()).to_vec(), vec![0.0, -0.5, 0.5, 0.0]);
    }
}
