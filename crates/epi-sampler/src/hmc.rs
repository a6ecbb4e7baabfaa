//! Plain Hamiltonian Monte Carlo with a fixed leapfrog trajectory length.
//!
//! Kept alongside NUTS as the simpler fallback sampler; shares the
//! dual-averaging warmup.

use crate::adapt::DualAveraging;
use crate::chains::ChainResult;
use crate::gradient::GradientTarget;
use crate::LogDensity;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

/// Energy error beyond which a transition counts as divergent.
const MAX_ENERGY_ERROR: f64 = 1000.0;

#[derive(Debug, Clone)]
pub struct HmcConfig {
    pub step_size: f64,
    pub leapfrog_steps: usize,
    pub draws: usize,
    pub warmup: usize,
    pub target_accept: f64,
}

impl Default for HmcConfig {
    fn default() -> Self {
        Self {
            step_size: 0.01,
            leapfrog_steps: 20,
            draws: 1000,
            warmup: 500,
            target_accept: 0.65,
        }
    }
}

/// Run one HMC chain from `init`.
pub fn run_chain<T: LogDensity + ?Sized>(
    target: &T,
    config: &HmcConfig,
    rng: &mut ChaCha8Rng,
    init: Vec<f64>,
) -> ChainResult {
    let dim = target.dim();
    let mut gt = GradientTarget::new(target);

    let mut q = init;
    let mut grad = vec![0.0; dim];
    let mut logp = gt.logp_and_grad(&q, &mut grad);

    let total_iters = config.warmup + config.draws;
    let mut draws = Vec::with_capacity(config.draws);
    let mut accepted = 0u64;
    let mut divergences = 0usize;

    let mut step_size = config.step_size.max(1e-10);
    let mut da = DualAveraging::new(step_size, config.target_accept);

    let mut q_prop = vec![0.0; dim];
    let mut p = vec![0.0; dim];
    let mut p_prop = vec![0.0; dim];
    let mut grad_prop = vec![0.0; dim];

    for iter in 0..total_iters {
        let warming = iter < config.warmup;

        for pi in p.iter_mut() {
            *pi = StandardNormal.sample(rng);
        }

        q_prop.copy_from_slice(&q);
        p_prop.copy_from_slice(&p);
        grad_prop.copy_from_slice(&grad);

        // Leapfrog trajectory
        let mut logp_prop = logp;
        for _ in 0..config.leapfrog_steps {
            for i in 0..dim {
                p_prop[i] += 0.5 * step_size * grad_prop[i];
            }
            for i in 0..dim {
                q_prop[i] += step_size * p_prop[i];
            }
            logp_prop = gt.logp_and_grad(&q_prop, &mut grad_prop);
            for i in 0..dim {
                p_prop[i] += 0.5 * step_size * grad_prop[i];
            }
        }

        let ke: f64 = p.iter().map(|pi| 0.5 * pi * pi).sum();
        let ke_prop: f64 = p_prop.iter().map(|pi| 0.5 * pi * pi).sum();
        let h0 = -logp + ke;
        let h1 = -logp_prop + ke_prop;
        let log_accept_ratio = h0 - h1;

        let diverging = !log_accept_ratio.is_finite() || (h1 - h0) > MAX_ENERGY_ERROR;
        if diverging {
            divergences += 1;
        }

        let accept_prob = if log_accept_ratio.is_finite() {
            log_accept_ratio.min(0.0).exp()
        } else {
            0.0
        };

        if !diverging && rng.gen::<f64>().ln() < log_accept_ratio {
            q.copy_from_slice(&q_prop);
            grad.copy_from_slice(&grad_prop);
            logp = logp_prop;
            accepted += 1;
        }

        if warming {
            step_size = da.update(accept_prob);
            if iter + 1 == config.warmup {
                step_size = da.finalized();
            }
        } else {
            draws.push(q.clone());
        }
    }

    ChainResult {
        draws,
        accept_rate: accepted as f64 / total_iters as f64,
        step_size,
        divergences,
    }
}
