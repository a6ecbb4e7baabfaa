//! Numerically stable primitives shared by every density in the crate.

use std::f64::consts::PI;

pub const LOG_SQRT_2PI: f64 = 0.918_938_533_204_672_8; // 0.5 * ln(2*pi)

const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)] // Published numerical constants
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the Gamma function (log |Gamma(z)|).
///
/// Lanczos approximation with reflection for z < 0.5. Non-positive
/// integers return NaN (poles).
pub fn log_gamma(z: f64) -> f64 {
    if z.is_nan() || z == f64::NEG_INFINITY {
        return f64::NAN;
    }
    if z == f64::INFINITY {
        return f64::INFINITY;
    }
    if z <= 0.0 && (z - z.round()).abs() < 1e-15 {
        return f64::NAN;
    }
    if z < 0.5 {
        let sin_pi = (PI * z).sin();
        if sin_pi == 0.0 {
            return f64::NAN;
        }
        return PI.ln() - sin_pi.abs().ln() - log_gamma(1.0 - z);
    }

    let z_minus = z - 1.0;
    let mut x = LANCZOS_COEFFS[0];
    for (i, coeff) in LANCZOS_COEFFS.iter().enumerate().skip(1) {
        x += coeff / (z_minus + i as f64);
    }
    let t = z_minus + LANCZOS_G + 0.5;
    LOG_SQRT_2PI + (z_minus + 0.5) * t.ln() - t + x.ln()
}

/// Stable log(sum(exp(values))).
///
/// NEG_INFINITY for empty or all-(-inf) input; NaN propagates.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Stable log(exp(a) + exp(b)).
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    m + (-(a - b).abs()).exp().ln_1p()
}

/// Softplus: ln(1 + exp(x)), stable for large |x|.
pub fn softplus(x: f64) -> f64 {
    if x > 30.0 {
        x
    } else if x < -30.0 {
        x.exp()
    } else {
        x.exp().ln_1p()
    }
}

/// Logistic sigmoid 1 / (1 + exp(-x)), stable for large |x|.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// ln(sigmoid(x)) without overflow: -softplus(-x).
pub fn log_sigmoid(x: f64) -> f64 {
    -softplus(-x)
}

/// Inverse of the sigmoid. p must lie in (0, 1).
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Inverse of softplus: x such that softplus(x) = v, for v > 0.
pub fn inv_softplus(v: f64) -> f64 {
    if v > 30.0 {
        v
    } else {
        v + (-(-v).exp()).ln_1p()
    }
}

/// Log of the modified Bessel function I_0(x), x >= 0.
///
/// Polynomial fits from Abramowitz & Stegun 9.8.1/9.8.2; the large-x
/// branch works in the log domain so the result never overflows.
pub fn log_bessel_i0(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let ax = x.abs();
    if ax < 3.75 {
        let t = (ax / 3.75) * (ax / 3.75);
        let poly = 1.0
            + t * (3.515_622_9
                + t * (3.089_942_4
                    + t * (1.206_749_2
                        + t * (0.265_973_2 + t * (0.036_076_8 + t * 0.004_581_3)))));
        poly.ln()
    } else {
        let t = 3.75 / ax;
        let poly = 0.398_942_28
            + t * (0.013_285_92
                + t * (0.002_253_19
                    + t * (-0.001_575_65
                        + t * (0.009_162_81
                            + t * (-0.020_577_06
                                + t * (0.026_355_37
                                    + t * (-0.016_476_33 + t * 0.003_923_77)))))));
        ax - 0.5 * ax.ln() + poly.ln()
    }
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
    fn log_gamma_known_values() {
        assert!(approx_eq(log_gamma(1.0), 0.0, 1e-12));
        assert!(approx_eq(log_gamma(0.5), 0.5 * PI.ln(), 1e-10));
        assert!(approx_eq(log_gamma(5.0), 24.0f64.ln(), 1e-10));
    }

    #[test]
    fn log_gamma_pole_is_nan() {
        assert!(log_gamma(0.0).is_nan());
        assert!(log_gamma(-3.0).is_nan());
    }

    #[test]
    fn log_sum_exp_dominance() {
        assert!(approx_eq(log_sum_exp(&[-1000.0, 0.0]), 0.0, 1e-12));
        assert!(approx_eq(log_sum_exp(&[0.0, 0.0]), 2.0f64.ln(), 1e-12));
    }

    #[test]
    fn log_sum_exp_edge_cases() {
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
        assert!(log_sum_exp(&[f64::NEG_INFINITY; 3]) == f64::NEG_INFINITY);
        assert!(log_sum_exp(&[0.0, f64::NAN]).is_nan());
    }

    #[test]
    fn log_add_exp_matches_lse() {
        let out = log_add_exp(1.234, -0.75);
        assert!(approx_eq(out, log_sum_exp(&[1.234, -0.75]), 1e-12));
        assert!(approx_eq(log_add_exp(f64::NEG_INFINITY, 2.0), 2.0, 1e-12));
    }

    #[test]
    fn softplus_limits() {
        assert!(approx_eq(softplus(0.0), 2.0f64.ln(), 1e-12));
        assert!(approx_eq(softplus(100.0), 100.0, 1e-9));
        assert!(softplus(-100.0) > 0.0);
        assert!(softplus(-100.0) < 1e-40);
    }

    #[test]
    fn inv_softplus_round_trip() {
        for &v in &[1e-6, 0.1, 1.0, 10.0, 100.0] {
            assert!(approx_eq(softplus(inv_softplus(v)), v, 1e-9 * v.max(1.0)));
        }
    }

    #[test]
    fn sigmoid_logit_round_trip() {
        for &p in &[1e-6, 0.25, 0.5, 0.9, 1.0 - 1e-6] {
            assert!(approx_eq(sigmoid(logit(p)), p, 1e-9));
        }
    }

    #[test]
    fn log_sigmoid_stable_tails() {
        assert!(approx_eq(log_sigmoid(0.0), (0.5f64).ln(), 1e-12));
        assert!(approx_eq(log_sigmoid(-800.0), -800.0, 1e-6));
        assert!(log_sigmoid(800.0).abs() < 1e-12);
    }

    #[test]
    fn bessel_i0_small_and_large() {
        // I_0(0) = 1
        assert!(approx_eq(log_bessel_i0(0.0), 0.0, 1e-12));
        // I_0(1) = 1.2660658...
        assert!(approx_eq(log_bessel_i0(1.0), 1.266_065_877_752_008f64.ln(), 1e-6));
        // Large x stays finite where naive I_0 would overflow
        let lb = log_bessel_i0(800.0);
        assert!(lb.is_finite() && lb > 700.0);
    }
}
