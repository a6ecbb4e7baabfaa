use clap::Parser;
use epi_core::cli::{Cli, Command};
use epi_core::{logging, run};

fn main() {
    let cli = Cli::parse();
    logging::init();

    let result = match cli.command {
        Command::Fit { data, out, config } => run::fit(&data, &out, config.as_deref()),
        Command::Simulate { data, out, seed } => run::simulate(&data, &out, seed),
        Command::Check { data } => run::check(&data),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}
