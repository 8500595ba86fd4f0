mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let command = cli.command.name();
    info!(command, version = env!("CARGO_PKG_VERSION"), "sqleval starting");
    if let Err(err) = run(cli.command) {
        error!(command, error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Evaluate(args) => commands::evaluate::run(args),
        Commands::Compare(args) => commands::compare::run(args),
        Commands::Summarize(args) => commands::summarize::run(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
