//! Log-domain math utilities for the renewal model.

pub mod math;

pub use math::cholesky::*;
pub use math::densities::*;
pub use math::gamma::*;
pub use math::stable::*;
