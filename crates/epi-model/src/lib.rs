//! Age- and country-structured Bayesian renewal model.
//!
//! The crate owns the generative graph: a hierarchical reproduction
//! number evolved through intervention change points, a renewal-equation
//! infection process mixed across age groups, observation sub-models for
//! testing and delayed deaths, optional weekly reporting modulation, and
//! a masked heavy-tailed likelihood. Everything evaluates as a pure
//! function of one flat unconstrained parameter vector, which is what the
//! sampler crate consumes.

pub mod error;
pub mod model;
pub mod params;
pub mod space;
pub mod trace;

pub use error::{ModelError, Result};
pub use model::{ModelState, RenewalModel};
pub use params::{
    default_ifr_means, ChangePointKind, Intervention, ModelParams, ModulationKind, ObservedData,
    PriorConfig, DEATH_DELAY_LEN, GEN_KERNEL_LEN, NEW_E_CLIP, TEST_DELAY_LEN,
};
pub use space::{Draw, ParamSpace};
pub use trace::{ChainTrace, TraceVar};
