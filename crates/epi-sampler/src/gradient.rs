//! Finite-difference gradient evaluation.
//!
//! The model density is a black box, so gradients are central differences:
//! two density evaluations per coordinate with a step scaled to the
//! coordinate magnitude. Accurate enough for leapfrog integration at the
//! parameter counts this model reaches; a non-finite stencil point zeroes
//! that coordinate instead of poisoning the whole gradient, and the
//! resulting energy error is caught by the divergence check.

use crate::LogDensity;

/// Wraps a [`LogDensity`] with gradient evaluation and scratch buffers.
pub struct GradientTarget<'a, T: LogDensity + ?Sized> {
    target: &'a T,
    scratch: Vec<f64>,
    base_step: f64,
}

impl<'a, T: LogDensity + ?Sized> GradientTarget<'a, T> {
    pub fn new(target: &'a T) -> Self {
        let dim = target.dim();
        Self {
            target,
            scratch: vec![0.0; dim],
            base_step: f64::EPSILON.sqrt(),
        }
    }

    pub fn dim(&self) -> usize {
        self.target.dim()
    }

    /// Density at `position`.
    pub fn logp(&self, position: &[f64]) -> f64 {
        self.target.logp(position)
    }

    /// Density and gradient at `position`. `grad` must have length `dim`.
    ///
    /// Returns the log-density at the center point.
    pub fn logp_and_grad(&mut self, position: &[f64], grad: &mut [f64]) -> f64 {
        debug_assert_eq!(position.len(), self.target.dim());
        debug_assert_eq!(grad.len(), self.target.dim());

        let center = self.target.logp(position);
        self.scratch.copy_from_slice(position);

        for i in 0..position.len() {
            let h = self.base_step * position[i].abs().max(1.0);
            let x = position[i];

            self.scratch[i] = x + h;
            let plus = self.target.logp(&self.scratch);
            self.scratch[i] = x - h;
            let minus = self.target.logp(&self.scratch);
            self.scratch[i] = x;

            let d = (plus - minus) / (2.0 * h);
            grad[i] = if d.is_finite() { d } else { 0.0 };
        }

        center
    }
}
