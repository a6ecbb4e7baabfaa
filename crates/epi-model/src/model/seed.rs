//! Seed infections before the observed window.
//!
//! The renewal convolution needs history before the data starts. The seed
//! segment extrapolates an exponential trend backwards from the sampled
//! initial infections `I_0`, at the growth rate implied by `R_0` and the
//! generation-interval mean, so the last seed row equals `I_0`.

use crate::error::Result;
use crate::model::generation::GenerationInterval;
use crate::params::ModelParams;
use crate::space::Draw;
use ndarray::{Array2, Array3};

/// Seed trajectory h_0(t), shape (seed_len, country, age_group).
pub fn construct_h0(
    draw: &Draw<'_>,
    params: &ModelParams,
    gen: &GenerationInterval,
    r0: &Array2<f64>,
) -> Result<Array3<f64>> {
    let seed_len = params.seed_len();
    let c = params.num_countries();
    let a = params.num_age_groups();

    let i0 = draw.values("I_0")?;

    let mut h0 = Array3::zeros((seed_len, c, a));
    for ci in 0..c {
        let r_bar: f64 = (0..a).map(|ai| r0[[ci, ai]]).sum::<f64>() / a as f64;
        let growth = r_bar.max(1e-3).ln() / gen.mean[ci].max(1e-3);
        for s in 0..seed_len {
            let back = (seed_len - 1 - s) as f64;
            for ai in 0..a {
                let value = i0[ci * a + ai] * (-growth * back).exp();
                h0[[s, ci, ai]] = value.max(1e-7);
            }
        }
    }
    Ok(h0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::generation::construct_generation_interval;
    use crate::model::reproduction::construct_r0;
    use crate::model::RenewalModel;
    use crate::params::test_fixtures::small_params;
    use crate::space::Draw;

    #[test]
    fn last_seed_row_equals_i0_and_grows_forward() {
        let model = RenewalModel::new(small_params(10));
        let q = vec![0.0; model.space().dim()];
        let draw = Draw::new(model.space(), &q).unwrap();
        let r0 = construct_r0(&draw, model.params()).unwrap();
        let gen = construct_generation_interval(&draw, model.params()).unwrap();
        let h0 = construct_h0(&draw, model.params(), &gen, &r0).unwrap();

        let seed_len = model.params().seed_len();
        assert_eq!(h0.shape(), &[seed_len, 2, 2]);

        // I_0 prior median is exp(i0_loc) = 1 at the origin.
        assert!((h0[[seed_len - 1, 0, 0]] - 1.0).abs() < 1e-12);

        // R_0 = 2 implies forward growth through the seed window.
        for s in 1..seed_len {
            assert!(h0[[s, 0, 0]] > h0[[s - 1, 0, 0]]);
        }
    }

    #[test]
    fn seed_values_are_strictly_positive() {
        let model = RenewalModel::new(small_params(10));
        let mut q = vec![0.0; model.space().dim()];
        q.iter_mut().for_each(|v| *v = -0.5);
        let draw = Draw::new(model.space(), &q).unwrap();
        let r0 = construct_r0(&draw, model.params()).unwrap();
        let gen = construct_generation_interval(&draw, model.params()).unwrap();
        let h0 = construct_h0(&draw, model.params(), &gen, &r0).unwrap();
        assert!(h0.iter().all(|&v| v >= 1e-7));
    }
}
