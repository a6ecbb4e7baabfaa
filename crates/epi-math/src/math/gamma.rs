//! Gamma-distribution helpers for delay kernels.
//!
//! # Parameterization
//!
//! Rate parameterization throughout: `Gamma(alpha, beta)` with shape
//! `alpha > 0` and rate `beta > 0`, density
//! `f(t) = beta^alpha / Gamma(alpha) * t^(alpha-1) * e^(-beta t)`.
//!
//! The model works with mean/dispersion pairs `(mu, theta)` and converts
//! via `alpha = mu^2 / theta^2`, `beta = mu / theta^2` before discretizing
//! onto a daily lag grid.

use super::stable::log_gamma;

/// Log of the Gamma PDF at t (rate parameterization).
pub fn gamma_log_pdf(t: f64, alpha: f64, beta: f64) -> f64 {
    if t.is_nan() || alpha.is_nan() || beta.is_nan() {
        return f64::NAN;
    }
    if alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    if t < 0.0 {
        return f64::NEG_INFINITY;
    }
    if t == 0.0 {
        return match alpha {
            a if a < 1.0 => f64::INFINITY,
            a if a == 1.0 => beta.ln(),
            _ => f64::NEG_INFINITY,
        };
    }
    alpha * beta.ln() - log_gamma(alpha) + (alpha - 1.0) * t.ln() - beta * t
}

/// Gamma PDF at t.
pub fn gamma_pdf(t: f64, alpha: f64, beta: f64) -> f64 {
    let lp = gamma_log_pdf(t, alpha, beta);
    if lp.is_nan() {
        return f64::NAN;
    }
    if lp == f64::NEG_INFINITY {
        return 0.0;
    }
    lp.exp()
}

/// Discretize a Gamma(mean, dispersion) onto `len` daily lags.
///
/// Entry `tau` is the density at the bin midpoint `tau + 0.5`; the result
/// is normalized to sum to 1. Returns all-NaN when the parameters are
/// invalid or the mass underflows, so the caller's density turns NaN
/// instead of silently flattening the kernel.
pub fn discretized_kernel(mean: f64, dispersion: f64, len: usize) -> Vec<f64> {
    if mean <= 0.0 || dispersion <= 0.0 || len == 0 {
        return vec![f64::NAN; len];
    }
    let alpha = mean * mean / (dispersion * dispersion);
    let beta = mean / (dispersion * dispersion);
    let mut kernel: Vec<f64> = (0..len)
        .map(|tau| gamma_pdf(tau as f64 + 0.5, alpha, beta))
        .collect();
    let total: f64 = kernel.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return vec![f64::NAN; len];
    }
    for k in &mut kernel {
        *k /= total;
    }
    kernel
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    #[test]
    fn gamma_log_pdf_exponential_case() {
        // alpha = 1 is Exponential(beta): f(t) = beta * exp(-beta t)
        let lp = gamma_log_pdf(2.0, 1.0, 0.5);
        assert!(approx_eq(lp, 0.5f64.ln() - 1.0, 1e-12));
    }

    #[test]
    fn gamma_log_pdf_boundaries() {
        assert_eq!(gamma_log_pdf(-1.0, 2.0, 1.0), f64::NEG_INFINITY);
        assert_eq!(gamma_log_pdf(0.0, 2.0, 1.0), f64::NEG_INFINITY);
        assert_eq!(gamma_log_pdf(0.0, 0.5, 1.0), f64::INFINITY);
        assert!(gamma_log_pdf(1.0, 0.0, 1.0).is_nan());
    }

    #[test]
    fn kernel_normalizes() {
        let k = discretized_kernel(4.0, 1.0, 12);
        let total: f64 = k.iter().sum();
        assert!(approx_eq(total, 1.0, 1e-12));
        assert!(k.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn kernel_mode_near_mean() {
        let k = discretized_kernel(4.0, 1.0, 16);
        let argmax = k
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        // Midpoint grid: mean 4 days peaks at lag 3 or 4.
        assert!((3..=4).contains(&argmax), "peak at {argmax}");
    }

    #[test]
    fn kernel_invalid_params_are_nan() {
        assert!(discretized_kernel(0.0, 1.0, 5).iter().all(|v| v.is_nan()));
        assert!(discretized_kernel(4.0, -1.0, 5).iter().all(|v| v.is_nan()));
    }
}
