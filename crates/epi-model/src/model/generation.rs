//! Generation-interval kernel.
//!
//! Per-country discretized gamma kernel over a fixed lag window, from a
//! hierarchical mean (global level plus per-country log-offsets) and a
//! shared dispersion.

use crate::error::Result;
use crate::params::{ModelParams, GEN_KERNEL_LEN};
use crate::space::Draw;
use epi_math::discretized_kernel;
use ndarray::Array2;

/// Generation-interval kernel and its per-country mean.
#[derive(Debug, Clone)]
pub struct GenerationInterval {
    /// Shape (country, GEN_KERNEL_LEN), rows normalized to 1.
    pub kernel: Array2<f64>,
    /// Mean interval in days, per country.
    pub mean: Vec<f64>,
}

pub fn construct_generation_interval(
    draw: &Draw<'_>,
    params: &ModelParams,
) -> Result<GenerationInterval> {
    let c = params.num_countries();
    let priors = params.priors();

    let log_base = draw.scalar("gen_mu_log")?;
    let z = draw.raw("gen_mu_z")?;
    let theta = draw.scalar("gen_theta")?;

    let mut kernel = Array2::zeros((c, GEN_KERNEL_LEN));
    let mut mean = Vec::with_capacity(c);
    for ci in 0..c {
        let mu = (log_base + priors.gen_mu_country_scale * z[ci]).exp();
        let row = discretized_kernel(mu, theta, GEN_KERNEL_LEN);
        for (tau, value) in row.into_iter().enumerate() {
            kernel[[ci, tau]] = value;
        }
        mean.push(mu);
    }

    Ok(GenerationInterval { kernel, mean })
}
