//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "epi",
    version,
    about = "Bayesian renewal-model inference over country/age-group case data"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the model to a dataset with NUTS and write the posterior trace.
    Fit {
        /// Dataset directory (one sub-directory per country).
        #[arg(long)]
        data: PathBuf,

        /// Output directory for the trace and diagnostics.
        #[arg(long)]
        out: PathBuf,

        /// Run configuration TOML; defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Draw once from the priors and emit a synthetic dataset.
    Simulate {
        /// Template dataset directory (population, interventions, dates).
        #[arg(long)]
        data: PathBuf,

        /// Output directory for the synthetic observation CSVs.
        #[arg(long)]
        out: PathBuf,

        /// RNG seed for the prior draw.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Validate a dataset directory and report its shape.
    Check {
        /// Dataset directory to validate.
        #[arg(long)]
        data: PathBuf,
    },
}
