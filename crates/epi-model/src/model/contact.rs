//! Contact-mixing structure across age groups.
//!
//! One LKJ-Cholesky correlation factor per country, expanded to the full
//! matrix, rectified, and row-normalized so every row is a probability
//! vector over contacted age groups.

use crate::error::Result;
use crate::params::ModelParams;
use crate::space::Draw;
use epi_math::CorrCholesky;
use ndarray::Array3;

/// Normalized contact matrix, shape (country, age_group, age_group).
///
/// Rows sum to 1 and entries are non-negative.
pub fn construct_contact(draw: &Draw<'_>, params: &ModelParams) -> Result<Array3<f64>> {
    let c = params.num_countries();
    let a = params.num_age_groups();

    let mut contact = Array3::zeros((c, a, a));
    if a == 1 {
        contact.fill(1.0);
        return Ok(contact);
    }

    let raw = draw.raw("contact_chol")?;
    let per = CorrCholesky::unconstrained_len(a);

    for ci in 0..c {
        let (factor, _) = CorrCholesky::from_unconstrained(&raw[ci * per..(ci + 1) * per], a);
        let corr = factor.expand();
        for i in 0..a {
            // Negative correlations carry no contact interpretation;
            // rectify before normalizing the row.
            let row: Vec<f64> = (0..a).map(|j| corr[i * a + j].max(0.0)).collect();
            let row_sum: f64 = row.iter().sum();
            for j in 0..a {
                contact[[ci, i, j]] = row[j] / row_sum;
            }
        }
    }
    Ok(contact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RenewalModel;
    use crate::params::test_fixtures::small_params;
    use crate::space::Draw;

    #[test]
    fn rows_sum_to_one() {
        let model = RenewalModel::new(small_params(10));
        let mut q = vec![0.0; model.space().dim()];
        // Arbitrary non-trivial correlation parameters.
        for (i, v) in q.iter_mut().enumerate() {
            *v = ((i % 7) as f64 - 3.0) * 0.2;
        }
        let draw = Draw::new(model.space(), &q).unwrap();
        let contact = construct_contact(&draw, model.params()).unwrap();

        for ci in 0..2 {
            for i in 0..2 {
                let row_sum: f64 = (0..2).map(|j| contact[[ci, i, j]]).sum();
                assert!((row_sum - 1.0).abs() < 1e-12, "row sum {row_sum}");
                for j in 0..2 {
                    assert!(contact[[ci, i, j]] >= 0.0);
                }
            }
        }
    }

    #[test]
    fn identity_correlations_give_diagonal_mixing() {
        let model = RenewalModel::new(small_params(10));
        let q = vec![0.0; model.space().dim()];
        let draw = Draw::new(model.space(), &q).unwrap();
        let contact = construct_contact(&draw, model.params()).unwrap();
        for ci in 0..2 {
            assert!((contact[[ci, 0, 0]] - 1.0).abs() < 1e-12);
            assert!(contact[[ci, 0, 1]].abs() < 1e-12);
        }
    }
}
