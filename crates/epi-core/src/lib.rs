//! Command-line front end for the renewal model.
//!
//! Owns everything outside the model graph: dataset loading from
//! per-country CSV directories, run configuration, logging setup, the
//! fit/simulate/check workflows, and trace persistence. stdout carries
//! command payloads; all logging goes to stderr.

pub mod cli;
pub mod config;
pub mod data;
pub mod fixtures;
pub mod logging;
pub mod output;
pub mod run;

use thiserror::Error;

/// Result alias for CLI operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Unified error type of the front end.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Data(#[from] data::DataError),

    #[error(transparent)]
    Model(#[from] epi_model::ModelError),

    #[error(transparent)]
    Sampler(#[from] epi_sampler::SamplerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Stable exit codes, grouped by category:
    /// 10-19 configuration, 20-29 data, 30-39 model, 40-49 sampler,
    /// 60-69 I/O and serialization.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::Config(_) => 10,
            CoreError::Data(_) => 20,
            CoreError::Model(_) => 30,
            CoreError::Sampler(_) => 40,
            CoreError::Io(_) => 60,
            CoreError::Json(_) => 61,
        }
    }
}
