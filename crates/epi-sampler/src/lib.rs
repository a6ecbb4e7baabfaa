//! Gradient-based MCMC for the renewal model.
//!
//! The sampler sees the model only through [`LogDensity`]: a pure function
//! from an unconstrained position vector to a scalar log-density. Gradients
//! come from central finite differences ([`gradient::GradientTarget`]), so
//! a non-finite density is handled as a divergent proposal rather than an
//! error. Chains are independent and run in parallel.

mod adapt;
pub mod chains;
pub mod diagnostics;
pub mod gradient;
pub mod hmc;
pub mod nuts;

pub use chains::{run, Algorithm, ChainResult, SampleResult, SamplerConfig};
pub use diagnostics::{summarize, DiagnosticsReport, ParamSummary};
pub use gradient::GradientTarget;

use thiserror::Error;

/// A target distribution in unconstrained coordinates.
///
/// Implementations must be pure: two calls with the same position return
/// the same value. `Sync` lets chains share one instance read-only.
pub trait LogDensity: Sync {
    /// Dimension of the position vector.
    fn dim(&self) -> usize;

    /// Log-density at `position`, up to an additive constant.
    ///
    /// May return `NEG_INFINITY` or NaN outside the supported region;
    /// the samplers treat both as "reject".
    fn logp(&self, position: &[f64]) -> f64;
}

/// Errors surfaced by the chain runner.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("target has zero dimensions")]
    EmptyTarget,

    #[error("no finite starting point found after {attempts} attempts")]
    NoFiniteStart { attempts: usize },

    #[error("invalid sampler configuration: {0}")]
    Config(String),
}

/// Result alias for sampler operations.
pub type Result<T> = std::result::Result<T, SamplerError>;
