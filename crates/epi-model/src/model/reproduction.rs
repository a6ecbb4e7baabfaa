//! Reproduction-number construction.
//!
//! `R_0` comes from a hierarchical log-normal/half-normal prior: one
//! global log-level, a per-country half-normal spread, and non-centered
//! per-country/age deviations. Intervention change points then evolve it
//! into the time-dependent `R(t)`.

use crate::error::Result;
use crate::params::{ChangePointKind, ModelParams};
use crate::space::Draw;
use epi_math::sigmoid;
use ndarray::{Array2, Array3};

/// Initial reproduction number, shape (country, age_group).
pub fn construct_r0(draw: &Draw<'_>, params: &ModelParams) -> Result<Array2<f64>> {
    let c = params.num_countries();
    let a = params.num_age_groups();

    let log_base = draw.scalar("R_0_log")?;
    let xi = draw.values("R_0_xi")?;
    let z = draw.raw("R_0_z")?;

    let mut r0 = Array2::zeros((c, a));
    for ci in 0..c {
        for ai in 0..a {
            r0[[ci, ai]] = (log_base + xi[ci] * z[ci * a + ai]).exp();
        }
    }
    Ok(r0)
}

/// Time-dependent reproduction number, shape (time, country, age_group).
///
/// Every intervention contributes `alpha[i,c] * gamma[i,c](t)` to a
/// log-reduction, where `gamma` is the change-point activation (step or
/// sigmoid around the per-country day plus a learned delay). Countries
/// without a change point for an intervention are unaffected by it.
pub fn construct_r_t(
    draw: &Draw<'_>,
    params: &ModelParams,
    r0: &Array2<f64>,
) -> Result<Array3<f64>> {
    let t_max = params.num_days();
    let c = params.num_countries();
    let a = params.num_age_groups();
    let interventions = params.interventions();

    let mut r_t = Array3::zeros((t_max, c, a));
    if interventions.is_empty() {
        for t in 0..t_max {
            for ci in 0..c {
                for ai in 0..a {
                    r_t[[t, ci, ai]] = r0[[ci, ai]];
                }
            }
        }
        return Ok(r_t);
    }

    let alpha_mean = draw.raw("alpha_mean")?;
    let alpha_sigma = draw.values("alpha_sigma")?;
    let alpha_z = draw.raw("alpha_z")?;
    let delay = draw.raw("cp_delay")?;
    let length = draw.values("cp_length")?;

    for ci in 0..c {
        for t in 0..t_max {
            let mut reduction = 0.0;
            for (i, intervention) in interventions.iter().enumerate() {
                let Some(cp_day) = intervention.day[ci] else {
                    continue;
                };
                let alpha = alpha_mean[i] + alpha_sigma[i] * alpha_z[i * c + ci];
                let day = cp_day + delay[i];
                let gamma = match intervention.kind {
                    ChangePointKind::Step => {
                        if (t as f64) >= day {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    ChangePointKind::Sigmoid => {
                        sigmoid(4.0 * (t as f64 - day) / length[i].max(1e-3))
                    }
                };
                reduction += alpha * gamma;
            }
            let factor = (-reduction).exp();
            for ai in 0..a {
                r_t[[t, ci, ai]] = r0[[ci, ai]] * factor;
            }
        }
    }
    Ok(r_t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RenewalModel;
    use crate::params::test_fixtures::small_params;

    fn fixture() -> (RenewalModel, Vec<f64>) {
        let model = RenewalModel::new(small_params(30));
        let q = vec![0.0; model.space().dim()];
        (model, q)
    }

    #[test]
    fn r0_matches_prior_median_at_origin() {
        let (model, q) = fixture();
        let draw = Draw::new(model.space(), &q).unwrap();
        let r0 = construct_r0(&draw, model.params()).unwrap();
        assert_eq!(r0.shape(), &[2, 2]);
        // At the origin the global level is ln(r0_loc) and deviations vanish.
        for &v in r0.iter() {
            assert!((v - model.params().priors().r0_loc).abs() < 1e-12);
        }
    }

    #[test]
    fn r_t_is_positive_and_shaped() {
        let (model, mut q) = fixture();
        // Push the intervention effect away from zero.
        for (block, value) in [("alpha_mean", 1.0)] {
            let offset = offset_of(&model, block);
            q[offset] = value;
        }
        let draw = Draw::new(model.space(), &q).unwrap();
        let r0 = construct_r0(&draw, model.params()).unwrap();
        let r_t = construct_r_t(&draw, model.params(), &r0).unwrap();
        assert_eq!(r_t.shape(), &[30, 2, 2]);
        assert!(r_t.iter().all(|&v| v > 0.0 && v.is_finite()));
    }

    #[test]
    fn sigmoid_change_point_reduces_late_r() {
        let (model, mut q) = fixture();
        let offset = offset_of(&model, "alpha_mean");
        q[offset] = 1.0;
        let draw = Draw::new(model.space(), &q).unwrap();
        let r0 = construct_r0(&draw, model.params()).unwrap();
        let r_t = construct_r_t(&draw, model.params(), &r0).unwrap();
        // Before the change point R is near R_0; well after it is reduced.
        assert!((r_t[[0, 0, 0]] - r0[[0, 0]]).abs() / r0[[0, 0]] < 0.05);
        assert!(r_t[[29, 0, 0]] < 0.6 * r0[[0, 0]]);
    }

    fn offset_of(model: &RenewalModel, name: &str) -> usize {
        let mut offset = 0;
        for block in model.space().blocks() {
            if block.name == name {
                return offset;
            }
            offset += block.len;
        }
        panic!("block {name} not found");
    }
}
