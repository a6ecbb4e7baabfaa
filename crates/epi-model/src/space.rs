//! The model's named parameter space.
//!
//! The sampler sees one flat unconstrained vector; the model sees named
//! blocks with shapes, transforms, and priors. [`ParamSpace`] owns that
//! mapping: it computes the total prior log-density (with the Jacobian
//! corrections of every transform), hands sub-models their transformed
//! blocks through [`Draw`], and can sample the priors directly for
//! prior-predictive simulation.
//!
//! Every random variable the model declares is registered here exactly
//! once, in evaluation order, so a trace draw and a density evaluation
//! can never disagree about the layout.

use crate::error::{ModelError, Result};
use epi_math::{
    half_cauchy_log_pdf, half_normal_log_pdf, inv_softplus, log_sigmoid, logit, normal_log_pdf,
    sigmoid, softplus, von_mises_log_pdf, CorrCholesky,
};
use rand::Rng;
use rand_distr::{Beta, Distribution, StandardNormal};
use std::f64::consts::PI;

/// Element-wise map from unconstrained to model space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    /// `exp(x)`, log-Jacobian `x`.
    Exp,
    /// `softplus(x)`, log-Jacobian `log_sigmoid(x)`.
    Softplus,
    /// `sigmoid(x)` onto (0, 1).
    Sigmoid,
}

impl Transform {
    fn apply(&self, x: f64) -> f64 {
        match self {
            Transform::Identity => x,
            Transform::Exp => x.exp(),
            Transform::Softplus => softplus(x),
            Transform::Sigmoid => sigmoid(x),
        }
    }

    fn log_jacobian(&self, x: f64) -> f64 {
        match self {
            Transform::Identity => 0.0,
            Transform::Exp => x,
            Transform::Softplus => log_sigmoid(x),
            Transform::Sigmoid => log_sigmoid(x) + log_sigmoid(-x),
        }
    }
}

/// Prior attached to a block.
///
/// Scalar priors apply element-wise to the *transformed* value (the
/// Jacobian keeps the density consistent); `CorrCholeskyLkj` is a
/// block-level prior over one or more correlation factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prior {
    /// Normal on the (identity-transformed) raw value.
    Normal { loc: f64, scale: f64 },
    /// Half-normal on the positive transformed value.
    HalfNormal { scale: f64 },
    /// Half-Cauchy on the positive transformed value.
    HalfCauchy { scale: f64 },
    /// Von Mises on the raw value read as an angle.
    VonMises { kappa: f64 },
    /// LKJ over `count` correlation factors of dimension `dim`.
    CorrCholeskyLkj { dim: usize, count: usize, eta: f64 },
}

#[derive(Debug, Clone)]
pub struct Block {
    pub name: &'static str,
    pub len: usize,
    pub transform: Transform,
    pub prior: Prior,
}

/// Ordered registry of parameter blocks.
#[derive(Debug, Clone, Default)]
pub struct ParamSpace {
    blocks: Vec<Block>,
    offsets: Vec<usize>,
    dim: usize,
}

impl ParamSpace {
    pub fn builder() -> SpaceBuilder {
        SpaceBuilder {
            space: ParamSpace::default(),
        }
    }

    /// Total dimension of the flat vector.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    fn find(&self, name: &str) -> Result<(usize, &Block)> {
        self.blocks
            .iter()
            .zip(self.offsets.iter())
            .find(|(b, _)| b.name == name)
            .map(|(b, &o)| (o, b))
            .ok_or_else(|| ModelError::UnknownBlock(name.to_string()))
    }

    /// Prior log-density of the whole vector, including Jacobians.
    pub fn log_prior(&self, q: &[f64]) -> Result<f64> {
        if q.len() != self.dim {
            return Err(ModelError::Dimension {
                expected: self.dim,
                got: q.len(),
            });
        }

        let mut lp = 0.0;
        for (block, &offset) in self.blocks.iter().zip(self.offsets.iter()) {
            let raw = &q[offset..offset + block.len];
            match block.prior {
                Prior::Normal { loc, scale } => {
                    for &x in raw {
                        lp += normal_log_pdf(x, loc, scale);
                    }
                }
                Prior::HalfNormal { scale } => {
                    for &x in raw {
                        lp += half_normal_log_pdf(block.transform.apply(x), scale)
                            + block.transform.log_jacobian(x);
                    }
                }
                Prior::HalfCauchy { scale } => {
                    for &x in raw {
                        lp += half_cauchy_log_pdf(block.transform.apply(x), scale)
                            + block.transform.log_jacobian(x);
                    }
                }
                Prior::VonMises { kappa } => {
                    for &x in raw {
                        lp += von_mises_log_pdf(x, 0.0, kappa);
                    }
                }
                Prior::CorrCholeskyLkj { dim, count, eta } => {
                    let per = CorrCholesky::unconstrained_len(dim);
                    if per == 0 {
                        continue;
                    }
                    for chunk in raw.chunks(per).take(count) {
                        let (factor, log_jac) = CorrCholesky::from_unconstrained(chunk, dim);
                        lp += factor.lkj_log_density(eta) + log_jac;
                    }
                }
            }
        }
        Ok(lp)
    }

    /// Draw an unconstrained vector from the priors.
    pub fn sample_prior<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let mut q = Vec::with_capacity(self.dim);
        for block in &self.blocks {
            match block.prior {
                Prior::Normal { loc, scale } => {
                    for _ in 0..block.len {
                        let z: f64 = StandardNormal.sample(rng);
                        q.push(loc + scale * z);
                    }
                }
                Prior::HalfNormal { scale } => {
                    for _ in 0..block.len {
                        let z: f64 = StandardNormal.sample(rng);
                        let value = (z * scale).abs().max(1e-12);
                        q.push(unconstrain(block.transform, value));
                    }
                }
                Prior::HalfCauchy { scale } => {
                    for _ in 0..block.len {
                        // Half-Cauchy via the inverse CDF; clamp the tail
                        // so the unconstrained value stays representable.
                        let u: f64 = rng.gen_range(0.0..1.0);
                        let value = (scale * (PI * u / 2.0).tan()).clamp(1e-12, 1e6);
                        q.push(unconstrain(block.transform, value));
                    }
                }
                Prior::VonMises { kappa } => {
                    for _ in 0..block.len {
                        q.push(sample_von_mises(rng, kappa));
                    }
                }
                Prior::CorrCholeskyLkj { dim, count, eta } => {
                    // Canonical partial correlations of an LKJ factor are
                    // stretched Beta(b, b) per row (Lewandowski et al. 2009).
                    for _ in 0..count {
                        for i in 1..dim {
                            let b = (eta + (dim - 1 - i) as f64 / 2.0).max(0.5);
                            match Beta::new(b, b) {
                                Ok(beta) => {
                                    for _ in 0..i {
                                        let x: f64 = beta.sample(rng);
                                        let r = (2.0 * x - 1.0).clamp(-0.999_999, 0.999_999);
                                        q.push(0.5 * ((1.0 + r) / (1.0 - r)).ln());
                                    }
                                }
                                Err(_) => q.extend(std::iter::repeat(0.0).take(i)),
                            }
                        }
                    }
                }
            }
        }
        q
    }
}

fn unconstrain(transform: Transform, value: f64) -> f64 {
    match transform {
        Transform::Identity => value,
        Transform::Exp => value.ln(),
        Transform::Softplus => inv_softplus(value),
        Transform::Sigmoid => logit(value.clamp(1e-12, 1.0 - 1e-12)),
    }
}

/// Best-Fisher (1979) rejection sampler for the von Mises distribution,
/// centered at zero.
fn sample_von_mises<R: Rng + ?Sized>(rng: &mut R, kappa: f64) -> f64 {
    if kappa < 1e-6 {
        return rng.gen_range(-PI..PI);
    }
    let a = 1.0 + (1.0 + 4.0 * kappa * kappa).sqrt();
    let b = (a - (2.0 * a).sqrt()) / (2.0 * kappa);
    let r = (1.0 + b * b) / (2.0 * b);
    loop {
        let u1: f64 = rng.gen_range(0.0..1.0);
        let z = (PI * u1).cos();
        let f = (1.0 + r * z) / (r + z);
        let c = kappa * (r - f);
        let u2: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        if c * (2.0 - c) - u2 > 0.0 || (c / u2).ln() + 1.0 - c >= 0.0 {
            let u3: f64 = rng.gen_range(0.0..1.0);
            let theta = f.clamp(-1.0, 1.0).acos();
            return if u3 > 0.5 { theta } else { -theta };
        }
    }
}

pub struct SpaceBuilder {
    space: ParamSpace,
}

impl SpaceBuilder {
    pub fn block(
        mut self,
        name: &'static str,
        len: usize,
        transform: Transform,
        prior: Prior,
    ) -> Self {
        self.space.offsets.push(self.space.dim);
        self.space.dim += len;
        self.space.blocks.push(Block {
            name,
            len,
            transform,
            prior,
        });
        self
    }

    pub fn build(self) -> ParamSpace {
        self.space
    }
}

/// One parameter vector viewed through the space.
#[derive(Debug)]
pub struct Draw<'a> {
    space: &'a ParamSpace,
    q: &'a [f64],
}

impl<'a> Draw<'a> {
    pub fn new(space: &'a ParamSpace, q: &'a [f64]) -> Result<Self> {
        if q.len() != space.dim() {
            return Err(ModelError::Dimension {
                expected: space.dim(),
                got: q.len(),
            });
        }
        Ok(Self { space, q })
    }

    /// Raw unconstrained slice of a block.
    pub fn raw(&self, name: &str) -> Result<&'a [f64]> {
        let (offset, block) = self.space.find(name)?;
        Ok(&self.q[offset..offset + block.len])
    }

    /// Transformed values of a block.
    pub fn values(&self, name: &str) -> Result<Vec<f64>> {
        let (offset, block) = self.space.find(name)?;
        Ok(self.q[offset..offset + block.len]
            .iter()
            .map(|&x| block.transform.apply(x))
            .collect())
    }

    /// Transformed value of a length-1 block.
    pub fn scalar(&self, name: &str) -> Result<f64> {
        let (offset, block) = self.space.find(name)?;
        if block.len != 1 {
            return Err(ModelError::shape(name, &[1], &[block.len]));
        }
        Ok(block.transform.apply(self.q[offset]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn toy_space() -> ParamSpace {
        ParamSpace::builder()
            .block(
                "mu",
                2,
                Transform::Identity,
                Prior::Normal {
                    loc: 0.0,
                    scale: 1.0,
                },
            )
            .block("spread", 1, Transform::Exp, Prior::HalfNormal { scale: 0.5 })
            .block(
                "noise",
                1,
                Transform::Softplus,
                Prior::HalfCauchy { scale: 50.0 },
            )
            .block(
                "corr",
                CorrCholesky::unconstrained_len(3),
                Transform::Identity,
                Prior::CorrCholeskyLkj {
                    dim: 3,
                    count: 1,
                    eta: 4.0,
                },
            )
            .build()
    }

    #[test]
    fn dim_sums_block_lengths() {
        let space = toy_space();
        assert_eq!(space.dim(), 2 + 1 + 1 + 3);
    }

    #[test]
    fn draw_rejects_wrong_length() {
        let space = toy_space();
        let err = Draw::new(&space, &[0.0; 3]).unwrap_err();
        assert!(matches!(err, ModelError::Dimension { .. }));
    }

    #[test]
    fn unknown_block_is_an_error() {
        let space = toy_space();
        let q = vec![0.0; space.dim()];
        let draw = Draw::new(&space, &q).unwrap();
        assert!(matches!(
            draw.values("nope"),
            Err(ModelError::UnknownBlock(_))
        ));
    }

    #[test]
    fn transforms_are_applied() {
        let space = toy_space();
        let mut q = vec![0.0; space.dim()];
        q[2] = 1.5; // spread, Exp
        q[3] = -2.0; // noise, Softplus
        let draw = Draw::new(&space, &q).unwrap();
        assert!((draw.scalar("spread").unwrap() - 1.5f64.exp()).abs() < 1e-12);
        let noise = draw.scalar("noise").unwrap();
        assert!(noise > 0.0 && noise < 0.2);
    }

    #[test]
    fn log_prior_is_finite_at_origin() {
        let space = toy_space();
        let q = vec![0.0; space.dim()];
        let lp = space.log_prior(&q).unwrap();
        assert!(lp.is_finite());
    }

    #[test]
    fn log_prior_prefers_prior_mode() {
        let space = toy_space();
        let origin = vec![0.0; space.dim()];
        let mut shifted = origin.clone();
        shifted[0] = 5.0;
        let lp0 = space.log_prior(&origin).unwrap();
        let lp1 = space.log_prior(&shifted).unwrap();
        assert!(lp0 > lp1);
    }

    #[test]
    fn prior_samples_have_finite_density() {
        let space = toy_space();
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(3);
        for _ in 0..25 {
            let q = space.sample_prior(&mut rng);
            assert_eq!(q.len(), space.dim());
            let lp = space.log_prior(&q).unwrap();
            assert!(lp.is_finite(), "lp {lp} for {q:?}");
        }
    }

    #[test]
    fn von_mises_samples_stay_in_range() {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(9);
        for _ in 0..200 {
            let x = sample_von_mises(&mut rng, 1.0);
            assert!((-PI..=PI).contains(&x));
        }
    }
}
