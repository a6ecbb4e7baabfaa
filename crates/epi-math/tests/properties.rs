//! Property tests for the log-domain primitives.

use epi_math::{
    discretized_kernel, log_add_exp, log_sum_exp, logit, sigmoid, softplus, CorrCholesky,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn log_add_exp_is_commutative(a in -500.0f64..500.0, b in -500.0f64..500.0) {
        let ab = log_add_exp(a, b);
        let ba = log_add_exp(b, a);
        prop_assert!((ab - ba).abs() < 1e-10);
    }

    #[test]
    fn log_sum_exp_bounded_by_max_plus_log_n(values in prop::collection::vec(-300.0f64..300.0, 1..20)) {
        let lse = log_sum_exp(&values);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(lse >= max - 1e-10);
        prop_assert!(lse <= max + (values.len() as f64).ln() + 1e-10);
    }

    #[test]
    fn sigmoid_logit_invert(p in 1e-6f64..(1.0 - 1e-6)) {
        prop_assert!((sigmoid(logit(p)) - p).abs() < 1e-9);
    }

    #[test]
    fn softplus_is_positive_and_monotone(x in -50.0f64..50.0) {
        prop_assert!(softplus(x) > 0.0);
        prop_assert!(softplus(x + 0.5) > softplus(x));
    }

    #[test]
    fn kernel_rows_always_normalize(mean in 0.5f64..30.0, disp in 0.1f64..10.0) {
        let k = discretized_kernel(mean, disp, 42);
        let total: f64 = k.iter().sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
        prop_assert!(k.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn cholesky_rows_unit_norm(y in prop::collection::vec(-3.0f64..3.0, 6)) {
        let (l, log_jac) = CorrCholesky::from_unconstrained(&y, 4);
        prop_assert!(log_jac.is_finite());
        for i in 0..4 {
            let norm: f64 = (0..=i).map(|j| l.get(i, j) * l.get(i, j)).sum();
            prop_assert!((norm - 1.0).abs() < 1e-9);
        }
    }
}
