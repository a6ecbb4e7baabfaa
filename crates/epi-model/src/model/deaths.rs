//! Death observation sub-model.
//!
//! Infections weighted by an age/country-resolved infection fatality
//! ratio, convolved with a per-country gamma reporting delay
//! parameterized by location and scale.

use crate::error::Result;
use crate::params::{ModelParams, DEATH_DELAY_LEN};
use crate::space::Draw;
use epi_math::discretized_kernel;
use ndarray::{Array2, Array3};

/// IFR per country and age group: log-normal spread around the per-age
/// literature means carried by `ModelParams`.
pub fn calc_phi_ifr(draw: &Draw<'_>, params: &ModelParams) -> Result<Array2<f64>> {
    let c = params.num_countries();
    let a = params.num_age_groups();
    let scale = params.priors().ifr_scale;
    let z = draw.raw("ifr_z")?;

    let mut phi = Array2::zeros((c, a));
    for ci in 0..c {
        for ai in 0..a {
            let base = params.ifr_means()[ai].ln();
            phi[[ci, ai]] = (base + scale * z[ci * a + ai]).exp();
        }
    }
    Ok(phi)
}

/// Death-reporting delay: per-country location, shared scale, and the
/// discretized kernels they imply.
#[derive(Debug, Clone)]
pub struct ReportingDelay {
    pub mu: Vec<f64>,
    pub theta: f64,
    /// Shape (country, DEATH_DELAY_LEN), rows normalized to 1.
    pub kernel: Array2<f64>,
}

pub fn construct_reporting_delay(draw: &Draw<'_>, params: &ModelParams) -> Result<ReportingDelay> {
    let c = params.num_countries();
    let mu = draw.values("death_delay_mu")?;
    let theta = draw.scalar("death_delay_theta")?;

    let mut kernel = Array2::zeros((c, DEATH_DELAY_LEN));
    for ci in 0..c {
        let row = discretized_kernel(mu[ci], theta, DEATH_DELAY_LEN);
        for (tau, value) in row.into_iter().enumerate() {
            kernel[[ci, tau]] = value;
        }
    }

    Ok(ReportingDelay { mu, theta, kernel })
}

/// Expected delayed deaths, shape (time, country, age_group).
///
/// The delay window is longer than the seed segment, so the convolution
/// truncates at the start of the available history; the earliest observed
/// days see only the tail mass that fits.
pub fn calc_delayed_deaths(
    phi_ifr: &Array2<f64>,
    delay: &ReportingDelay,
    extended: &Array3<f64>,
    t_max: usize,
) -> Array3<f64> {
    let (ext_len, c, a) = extended.dim();
    let seed_len = ext_len - t_max;

    let mut deaths = Array3::zeros((t_max, c, a));
    for ci in 0..c {
        for t in 0..t_max {
            let s = seed_len + t;
            for ai in 0..a {
                let mut acc = 0.0;
                for tau in 0..DEATH_DELAY_LEN.min(s + 1) {
                    acc += delay.kernel[[ci, tau]] * extended[[s - tau, ci, ai]];
                }
                deaths[[t, ci, ai]] = phi_ifr[[ci, ai]] * acc;
            }
        }
    }
    deaths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RenewalModel;
    use crate::params::test_fixtures::small_params;
    use crate::space::Draw;
    use ndarray::Array3;

    #[test]
    fn ifr_matches_age_means_at_origin() {
        let model = RenewalModel::new(small_params(10));
        let q = vec![0.0; model.space().dim()];
        let draw = Draw::new(model.space(), &q).unwrap();
        let phi = calc_phi_ifr(&draw, model.params()).unwrap();
        for ci in 0..2 {
            for ai in 0..2 {
                assert!((phi[[ci, ai]] - model.params().ifr_means()[ai]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn delay_kernel_rows_normalize() {
        let model = RenewalModel::new(small_params(10));
        let q = vec![0.0; model.space().dim()];
        let draw = Draw::new(model.space(), &q).unwrap();
        let delay = construct_reporting_delay(&draw, model.params()).unwrap();
        for ci in 0..2 {
            let total: f64 = (0..DEATH_DELAY_LEN).map(|t| delay.kernel[[ci, t]]).sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
        assert!((delay.mu[0] - model.params().priors().death_delay_loc).abs() < 1e-12);
    }

    #[test]
    fn flat_infections_give_ifr_scaled_deaths() {
        let model = RenewalModel::new(small_params(50));
        let q = vec![0.0; model.space().dim()];
        let draw = Draw::new(model.space(), &q).unwrap();
        let phi = calc_phi_ifr(&draw, model.params()).unwrap();
        let delay = construct_reporting_delay(&draw, model.params()).unwrap();

        let seed_len = model.params().seed_len();
        let extended = Array3::from_elem((seed_len + 50, 2, 2), 1000.0);
        let deaths = calc_delayed_deaths(&phi, &delay, &extended, 50);

        // Late enough that the full kernel fits: deaths = IFR * level.
        let late = deaths[[49, 0, 1]];
        assert!((late - phi[[0, 1]] * 1000.0).abs() / late < 1e-6);

        // Early days only see the truncated head of the delay kernel.
        assert!(deaths[[0, 0, 1]] < late);
    }
}
