//! Cholesky-factor correlation matrices and the LKJ prior.
//!
//! The sampler works in an unconstrained vector of `dim*(dim-1)/2` reals.
//! `tanh` maps them to canonical partial correlations, which build a
//! lower-triangular factor `L` with unit-norm rows, so `C = L Lᵀ` is a
//! correlation matrix by construction. The log-Jacobian of the map is
//! accumulated alongside so the prior can live on the constrained space.

/// Lower-triangular Cholesky factor of a correlation matrix,
/// stored row-major as a dense `dim x dim` block.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrCholesky {
    pub dim: usize,
    factor: Vec<f64>,
}

impl CorrCholesky {
    /// Number of unconstrained reals needed for a `dim x dim` factor.
    pub fn unconstrained_len(dim: usize) -> usize {
        dim * (dim - 1) / 2
    }

    /// Build the factor from unconstrained values.
    ///
    /// Returns the factor and the log-Jacobian of the transform
    /// (tanh derivative plus the row-remainder scaling).
    pub fn from_unconstrained(y: &[f64], dim: usize) -> (Self, f64) {
        debug_assert_eq!(y.len(), Self::unconstrained_len(dim));
        let mut factor = vec![0.0f64; dim * dim];
        let mut log_jac = 0.0f64;
        if dim > 0 {
            factor[0] = 1.0;
        }
        let mut idx = 0;
        for i in 1..dim {
            let mut sum_sq = 0.0f64;
            for j in 0..i {
                let z = y[idx].tanh();
                idx += 1;
                let rem = (1.0 - sum_sq).max(0.0);
                let l_ij = z * rem.sqrt();
                factor[i * dim + j] = l_ij;
                log_jac += (1.0 - z * z).ln() + 0.5 * rem.ln();
                sum_sq += l_ij * l_ij;
            }
            factor[i * dim + i] = (1.0 - sum_sq).max(0.0).sqrt();
        }
        (Self { dim, factor }, log_jac)
    }

    /// Entry (i, j) of the factor.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.factor[i * self.dim + j]
    }

    /// LKJ log-density of the factor (up to the normalizing constant),
    /// concentration `eta > 0`.
    pub fn lkj_log_density(&self, eta: f64) -> f64 {
        let k = self.dim as f64;
        let mut lp = 0.0;
        for i in 1..self.dim {
            let coeff = k - (i as f64 + 1.0) + 2.0 * eta - 2.0;
            let diag = self.get(i, i);
            if diag <= 0.0 {
                return f64::NEG_INFINITY;
            }
            lp += coeff * diag.ln();
        }
        lp
    }

    /// Expand to the full correlation matrix `C = L Lᵀ`, row-major.
    pub fn expand(&self) -> Vec<f64> {
        let d = self.dim;
        let mut c = vec![0.0f64; d * d];
        for i in 0..d {
            for j in 0..d {
                let mut acc = 0.0;
                for l in 0..=i.min(j) {
                    acc += self.get(i, l) * self.get(j, l);
                }
                c[i * d + j] = acc;
            }
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn unconstrained_len_counts_strict_lower_triangle() {
        assert_eq!(CorrCholesky::unconstrained_len(1), 0);
        assert_eq!(CorrCholesky::unconstrained_len(2), 1);
        assert_eq!(CorrCholesky::unconstrained_len(4), 6);
    }

    #[test]
    fn rows_have_unit_norm() {
        let y = [0.3, -1.2, 0.8, 0.05, -0.4, 1.7];
        let (l, _) = CorrCholesky::from_unconstrained(&y, 4);
        for i in 0..4 {
            let norm: f64 = (0..=i).map(|j| l.get(i, j) * l.get(i, j)).sum();
            assert!(approx_eq(norm, 1.0, 1e-12), "row {i} norm {norm}");
        }
    }

    #[test]
    fn expansion_is_a_correlation_matrix() {
        let y = [0.5, -0.25, 1.0];
        let (l, _) = CorrCholesky::from_unconstrained(&y, 3);
        let c = l.expand();
        for i in 0..3 {
            assert!(approx_eq(c[i * 3 + i], 1.0, 1e-12));
            for j in 0..3 {
                assert!(approx_eq(c[i * 3 + j], c[j * 3 + i], 1e-12));
                assert!(c[i * 3 + j].abs() <= 1.0 + 1e-12);
            }
        }
    }

    #[test]
    fn zero_input_gives_identity() {
        let y = [0.0; 3];
        let (l, _) = CorrCholesky::from_unconstrained(&y, 3);
        let c = l.expand();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(approx_eq(c[i * 3 + j], expected, 1e-12));
            }
        }
    }

    #[test]
    fn two_by_two_matches_tanh() {
        let y = [0.7];
        let (l, _) = CorrCholesky::from_unconstrained(&y, 2);
        let c = l.expand();
        assert!(approx_eq(c[1], 0.7f64.tanh(), 1e-12));
    }

    #[test]
    fn jacobian_is_finite_for_moderate_inputs() {
        let y = [2.0, -2.0, 0.1, 1.5, -0.5, 0.0];
        let (_, log_jac) = CorrCholesky::from_unconstrained(&y, 4);
        assert!(log_jac.is_finite());
        // Shrinking toward zero increases the Jacobian (tanh' peaks at 0).
        let (_, lj0) = CorrCholesky::from_unconstrained(&[0.0; 6], 4);
        assert!(lj0 > log_jac);
    }

    #[test]
    fn lkj_density_favors_identity_for_large_eta() {
        let (ident, _) = CorrCholesky::from_unconstrained(&[0.0; 3], 3);
        let (skewed, _) = CorrCholesky::from_unconstrained(&[1.5, -1.0, 0.9], 3);
        assert!(ident.lkj_log_density(4.0) > skewed.lkj_log_density(4.0));
    }
}
