//! Run configuration.
//!
//! A single TOML file controls the sampler and model switches; every
//! field has a default so an empty file (or none at all) is a valid run.
//! Prior hyper-parameters are overridable under `[priors]`.

use crate::{CoreError, Result};
use epi_model::{ModulationKind, PriorConfig};
use epi_sampler::{Algorithm, SamplerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmChoice {
    Nuts,
    Hmc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub chains: usize,
    pub draws: usize,
    pub warmup: usize,
    pub seed: u64,
    pub target_accept: f64,
    /// 0.0 requests automatic step-size initialization.
    pub step_size: f64,
    pub algorithm: AlgorithmChoice,
    pub max_tree_depth: usize,
    pub leapfrog_steps: usize,

    /// Weekly reporting modulation; off by default.
    pub weekly_modulation: bool,
    pub modulation_kind: ModulationKind,

    pub priors: PriorConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            chains: 4,
            draws: 500,
            warmup: 500,
            seed: 42,
            target_accept: 0.8,
            step_size: 0.0,
            algorithm: AlgorithmChoice::Nuts,
            max_tree_depth: 10,
            leapfrog_steps: 20,
            weekly_modulation: false,
            modulation_kind: ModulationKind::AbsSine,
            priors: PriorConfig::default(),
        }
    }
}

impl RunConfig {
    /// Read and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: RunConfig = toml::from_str(&text)
            .map_err(|err| CoreError::Config(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chains == 0 || self.draws == 0 {
            return Err(CoreError::Config(
                "chains and draws must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.target_accept) || self.target_accept <= 0.0 {
            return Err(CoreError::Config(
                "target_accept must lie in (0, 1)".into(),
            ));
        }
        if self.max_tree_depth == 0 || self.max_tree_depth > 15 {
            return Err(CoreError::Config(
                "max_tree_depth must lie in 1..=15".into(),
            ));
        }
        Ok(())
    }

    /// The sampler view of this configuration.
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            chains: self.chains,
            draws: self.draws,
            warmup: self.warmup,
            step_size: self.step_size,
            target_accept: self.target_accept,
            seed: self.seed,
            algorithm: match self.algorithm {
                AlgorithmChoice::Nuts => Algorithm::Nuts {
                    max_tree_depth: self.max_tree_depth,
                },
                AlgorithmChoice::Hmc => Algorithm::Hmc {
                    leapfrog_steps: self.leapfrog_steps,
                },
            },
            init_jitter: 1.0,
        }
    }

    /// Weekly modulation switch for model construction.
    pub fn modulation(&self) -> Option<ModulationKind> {
        self.weekly_modulation.then_some(self.modulation_kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_all_defaults() {
        let config: RunConfig = toml::from_str("").unwrap();
        assert_eq!(config.chains, 4);
        assert!(!config.weekly_modulation);
        assert_eq!(config.algorithm, AlgorithmChoice::Nuts);
    }

    #[test]
    fn priors_are_overridable() {
        let config: RunConfig = toml::from_str(
            r#"
            draws = 100

            [priors]
            r0_loc = 3.0
            "#,
        )
        .unwrap();
        assert_eq!(config.draws, 100);
        assert!((config.priors.r0_loc - 3.0).abs() < 1e-12);
        // Untouched priors keep their defaults.
        assert!((config.priors.gen_mu_loc - 4.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: std::result::Result<RunConfig, _> = toml::from_str("chanis = 4");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_target_accept_fails_validation() {
        let config = RunConfig {
            target_accept: 1.5,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn modulation_switch_maps_to_model_kind() {
        let mut config = RunConfig::default();
        assert!(config.modulation().is_none());
        config.weekly_modulation = true;
        config.modulation_kind = ModulationKind::Step;
        assert_eq!(config.modulation(), Some(ModulationKind::Step));
    }
}
