//! Log-densities of the univariate distributions used by the model priors
//! and likelihood.
//!
//! All functions return `log f(x | ...)`, propagate NaN inputs, and return
//! NaN for invalid parameters (non-positive scales, non-positive degrees of
//! freedom) rather than panicking. Out-of-support points return
//! NEG_INFINITY.

use super::stable::{log_bessel_i0, log_gamma, LOG_SQRT_2PI};
use std::f64::consts::PI;

/// Normal log-density.
pub fn normal_log_pdf(x: f64, loc: f64, scale: f64) -> f64 {
    if x.is_nan() || loc.is_nan() || scale.is_nan() {
        return f64::NAN;
    }
    if scale <= 0.0 {
        return f64::NAN;
    }
    let z = (x - loc) / scale;
    -0.5 * z * z - scale.ln() - LOG_SQRT_2PI
}

/// Log-normal log-density: x > 0, ln x ~ Normal(loc, scale).
pub fn log_normal_log_pdf(x: f64, loc: f64, scale: f64) -> f64 {
    if x.is_nan() || loc.is_nan() || scale.is_nan() {
        return f64::NAN;
    }
    if scale <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return f64::NEG_INFINITY;
    }
    normal_log_pdf(x.ln(), loc, scale) - x.ln()
}

/// Half-normal log-density on x >= 0 with the given scale.
pub fn half_normal_log_pdf(x: f64, scale: f64) -> f64 {
    if x.is_nan() || scale.is_nan() {
        return f64::NAN;
    }
    if scale <= 0.0 {
        return f64::NAN;
    }
    if x < 0.0 {
        return f64::NEG_INFINITY;
    }
    // Twice the normal density folded onto the positive half-line.
    2.0f64.ln() + normal_log_pdf(x, 0.0, scale)
}

/// Half-Cauchy log-density on x >= 0 with the given scale.
pub fn half_cauchy_log_pdf(x: f64, scale: f64) -> f64 {
    if x.is_nan() || scale.is_nan() {
        return f64::NAN;
    }
    if scale <= 0.0 {
        return f64::NAN;
    }
    if x < 0.0 {
        return f64::NEG_INFINITY;
    }
    let z = x / scale;
    2.0f64.ln() - PI.ln() - scale.ln() - (1.0 + z * z).ln()
}

/// Student-t log-density with `df` degrees of freedom, location and scale.
pub fn student_t_log_pdf(x: f64, df: f64, loc: f64, scale: f64) -> f64 {
    if x.is_nan() || df.is_nan() || loc.is_nan() || scale.is_nan() {
        return f64::NAN;
    }
    if df <= 0.0 || scale <= 0.0 {
        return f64::NAN;
    }
    let z = (x - loc) / scale;
    log_gamma(0.5 * (df + 1.0))
        - log_gamma(0.5 * df)
        - 0.5 * (df * PI).ln()
        - scale.ln()
        - 0.5 * (df + 1.0) * (z * z / df).ln_1p()
}

/// Von Mises log-density on angles, concentration kappa >= 0.
pub fn von_mises_log_pdf(x: f64, loc: f64, kappa: f64) -> f64 {
    if x.is_nan() || loc.is_nan() || kappa.is_nan() {
        return f64::NAN;
    }
    if kappa < 0.0 {
        return f64::NAN;
    }
    kappa * (x - loc).cos() - (2.0 * PI).ln() - log_bessel_i0(kappa)
}
