//! Testing observation sub-model.
//!
//! Infections turn into reported positives through a per-country gamma
//! reporting delay and a detected fraction; total tests scale off the
//! positives by a learned tests-per-positive factor.

use crate::error::Result;
use crate::params::{ModelParams, TEST_DELAY_LEN};
use crate::space::Draw;
use epi_math::discretized_kernel;
use ndarray::Array3;

/// Expected test counts, shape (time, country, age_group) each.
#[derive(Debug, Clone)]
pub struct TestingObservables {
    pub total: Array3<f64>,
    pub positive: Array3<f64>,
}

/// Map the extended infection trajectory to expected test counts.
///
/// `extended` is the seed-padded trajectory from the renewal process; the
/// seed segment provides convolution history for the first observed days.
pub fn generate_testing(
    draw: &Draw<'_>,
    params: &ModelParams,
    extended: &Array3<f64>,
) -> Result<TestingObservables> {
    let t_max = params.num_days();
    let c = params.num_countries();
    let a = params.num_age_groups();
    let seed_len = extended.shape()[0] - t_max;

    let phi_plus = draw.values("phi_plus")?;
    let eta_test = draw.values("eta_test")?;
    let delay_mu = draw.values("test_delay_mu")?;
    let delay_theta = draw.scalar("test_delay_theta")?;

    let mut positive = Array3::zeros((t_max, c, a));
    let mut total = Array3::zeros((t_max, c, a));

    for ci in 0..c {
        let kernel = discretized_kernel(delay_mu[ci], delay_theta, TEST_DELAY_LEN);
        for t in 0..t_max {
            let s = seed_len + t;
            for ai in 0..a {
                let mut delayed = 0.0;
                for (tau, &k) in kernel.iter().enumerate().take(s + 1) {
                    delayed += k * extended[[s - tau, ci, ai]];
                }
                let pos = phi_plus[ci] * delayed;
                positive[[t, ci, ai]] = pos;
                total[[t, ci, ai]] = eta_test[ci] * pos;
            }
        }
    }

    Ok(TestingObservables { total, positive })
}
