//! Error surface of the model crate.

use thiserror::Error;

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Unified error type for model construction and evaluation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("shape mismatch for {name}: expected {expected:?}, got {got:?}")]
    Shape {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("parameter vector has length {got}, model expects {expected}")]
    Dimension { expected: usize, got: usize },

    #[error("unknown parameter block: {0}")]
    UnknownBlock(String),

    #[error("invalid model configuration: {0}")]
    Config(String),

    #[error("non-finite value in {name}")]
    NonFinite { name: String },
}

impl ModelError {
    pub fn shape(name: impl Into<String>, expected: &[usize], got: &[usize]) -> Self {
        ModelError::Shape {
            name: name.into(),
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}
