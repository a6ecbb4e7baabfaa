//! Heavy-tailed masked likelihood.
//!
//! Every observation channel contributes a Student-t term per non-missing
//! entry, with a per-country scale through a soft-plus transform (always
//! positive) and a variance-stabilizing `sigma * sqrt(mu) + 1` scale so
//! outlier reporting days cannot dominate the fit. NaN observations are
//! excluded by the mask, never imputed.

use crate::error::Result;
use crate::params::ModelParams;
use crate::space::Draw;
use epi_math::student_t_log_pdf;
use ndarray::Array3;

/// Degrees of freedom of the observation noise.
pub const STUDENT_T_DF: f64 = 4.0;

/// Per-country likelihood scales of the three channels.
#[derive(Debug, Clone)]
pub struct LikelihoodScales {
    pub positive: Vec<f64>,
    pub total: Vec<f64>,
    pub deaths: Vec<f64>,
}

/// Sum the three Student-t channels against the observed data.
pub fn student_t_likelihood(
    draw: &Draw<'_>,
    params: &ModelParams,
    positive: &Array3<f64>,
    total: &Array3<f64>,
    deaths: &Array3<f64>,
) -> Result<(f64, LikelihoodScales)> {
    let scales = LikelihoodScales {
        positive: draw.values("sigma_positive")?,
        total: draw.values("sigma_total")?,
        deaths: draw.values("sigma_deaths")?,
    };

    let observed = params.observed();
    let mut lp = 0.0;
    lp += channel_log_density(positive, &observed.positive, &scales.positive);
    lp += channel_log_density(total, &observed.total, &scales.total);
    lp += channel_log_density(deaths, &observed.deaths, &scales.deaths);

    Ok((lp, scales))
}

/// One channel's masked log-density sum.
fn channel_log_density(expected: &Array3<f64>, observed: &Array3<f64>, sigma: &[f64]) -> f64 {
    let (t_max, c, a) = expected.dim();
    let mut lp = 0.0;
    for t in 0..t_max {
        for ci in 0..c {
            for ai in 0..a {
                let y = observed[[t, ci, ai]];
                if !y.is_finite() {
                    continue;
                }
                let mu = expected[[t, ci, ai]];
                let scale = sigma[ci] * mu.max(0.0).sqrt() + 1.0;
                lp += student_t_log_pdf(y, STUDENT_T_DF, mu, scale);
            }
        }
    }
    lp
}
