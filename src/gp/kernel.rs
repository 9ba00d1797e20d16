/// Matérn-3/2 covariance function
///
/// `k(τ) = amplitude (1 + √(3 r²)) exp(−√(3 r²))` with `r² = τ² / metric`, so `metric` is the
/// squared length scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matern32Kernel {
    pub amplitude: f64,
    pub metric: f64,
}

impl Matern32Kernel {
    pub fn new(amplitude: f64, metric: f64) -> Self {
        Self { amplitude, metric }
    }

    pub fn value(&self, tau: f64) -> f64 {
        let x = (3.0 * tau * tau / self.metric).sqrt();
        self.amplitude * (1.0 + x) * (-x).exp()
    }
}
