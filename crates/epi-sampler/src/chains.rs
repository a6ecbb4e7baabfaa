//! Multi-chain execution.
//!
//! Chains are embarrassingly parallel: the target is shared read-only and
//! every chain owns a deterministic RNG seeded `seed + chain_index`, so
//! results are reproducible regardless of thread scheduling.

use crate::hmc::{self, HmcConfig};
use crate::nuts::{self, NutsConfig};
use crate::{LogDensity, Result, SamplerError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::info;

const INIT_ATTEMPTS: usize = 100;

/// Which transition kernel to run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Algorithm {
    Nuts { max_tree_depth: usize },
    Hmc { leapfrog_steps: usize },
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub chains: usize,
    pub draws: usize,
    pub warmup: usize,
    /// 0.0 requests automatic step-size initialization.
    pub step_size: f64,
    pub target_accept: f64,
    pub seed: u64,
    pub algorithm: Algorithm,
    /// Half-width of the uniform jitter around zero used for starting
    /// positions (unconstrained space).
    pub init_jitter: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chains: 4,
            draws: 1000,
            warmup: 1000,
            step_size: 0.0,
            target_accept: 0.8,
            seed: 42,
            algorithm: Algorithm::Nuts { max_tree_depth: 10 },
            init_jitter: 1.0,
        }
    }
}

/// Draws and transition statistics from a single chain.
#[derive(Debug, Clone)]
pub struct ChainResult {
    /// draws[draw][param], post-warmup only.
    pub draws: Vec<Vec<f64>>,
    pub accept_rate: f64,
    pub step_size: f64,
    pub divergences: usize,
}

/// All chains of one sampling run.
#[derive(Debug, Clone)]
pub struct SampleResult {
    pub chains: Vec<ChainResult>,
    pub dim: usize,
}

impl SampleResult {
    pub fn total_divergences(&self) -> usize {
        self.chains.iter().map(|c| c.divergences).sum()
    }

    /// Per-parameter traces as chains[chain][draw] for one coordinate.
    pub fn coordinate(&self, index: usize) -> Vec<Vec<f64>> {
        self.chains
            .iter()
            .map(|c| c.draws.iter().map(|d| d[index]).collect())
            .collect()
    }
}

/// Run all chains of `config` against `target`.
pub fn run<T: LogDensity>(target: &T, config: &SamplerConfig) -> Result<SampleResult> {
    let dim = target.dim();
    if dim == 0 {
        return Err(SamplerError::EmptyTarget);
    }
    if config.chains == 0 || config.draws == 0 {
        return Err(SamplerError::Config(
            "chains and draws must be positive".into(),
        ));
    }

    let chain_indices: Vec<usize> = (0..config.chains).collect();
    let results: Vec<Result<ChainResult>> = chain_indices
        .par_iter()
        .map(|&chain| {
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(chain as u64));
            let init = find_start(target, config.init_jitter, &mut rng)?;

            let result = match config.algorithm {
                Algorithm::Nuts { max_tree_depth } => {
                    let nuts_config = NutsConfig {
                        step_size: config.step_size,
                        max_tree_depth,
                        draws: config.draws,
                        warmup: config.warmup,
                        target_accept: config.target_accept,
                    };
                    nuts::run_chain(target, &nuts_config, &mut rng, init)
                }
                Algorithm::Hmc { leapfrog_steps } => {
                    let hmc_config = HmcConfig {
                        step_size: if config.step_size > 0.0 {
                            config.step_size
                        } else {
                            0.01
                        },
                        leapfrog_steps,
                        draws: config.draws,
                        warmup: config.warmup,
                        target_accept: config.target_accept,
                    };
                    hmc::run_chain(target, &hmc_config, &mut rng, init)
                }
            };

            info!(
                chain,
                accept_rate = result.accept_rate,
                step_size = result.step_size,
                divergences = result.divergences,
                "chain finished"
            );
            Ok(result)
        })
        .collect();

    let chains = results.into_iter().collect::<Result<Vec<_>>>()?;
    Ok(SampleResult { chains, dim })
}

/// Jitter starting positions until the density is finite.
fn find_start<T: LogDensity>(
    target: &T,
    jitter: f64,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<f64>> {
    let dim = target.dim();
    for _ in 0..INIT_ATTEMPTS {
        let candidate: Vec<f64> = (0..dim).map(|_| rng.gen_range(-jitter..=jitter)).collect();
        if target.logp(&candidate).is_finite() {
            return Ok(candidate);
        }
    }
    Err(SamplerError::NoFiniteStart {
        attempts: INIT_ATTEMPTS,
    })
}
