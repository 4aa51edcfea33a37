#![doc = include_str!("../README.md")]

use std::process::ExitCode;

use clap::Parser;
use hoststrap::{
    Error,
    LocalHost,
    StepOutcome,
    cli::{BIN_NAME, Cli},
    ensure_root,
    provision,
};
use hoststrap_common::logging::setup_logging;
use hoststrap_config::HostConfig;
use log::{error, info, warn};

fn run_command(cli: Cli) -> Result<(), Error> {
    if cli.version {
        println!("{BIN_NAME} {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    ensure_root()?;

    let config = HostConfig::from_file(cli.config.unwrap_or_default())?;
    let host = LocalHost::new(config.tools());
    let report = provision(&config, &host)?;

    for (step, outcome) in report.steps() {
        match outcome {
            StepOutcome::Warned(warnings) => {
                warn!("{step}: {} warning(s)", warnings.len());
                for warning in warnings {
                    warn!("  {warning}");
                }
            }
            outcome => info!("{step}: {outcome}"),
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(error) = setup_logging(cli.verbosity) {
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }

    if let Err(error) = run_command(cli) {
        error!("{error}");
        if error.is_transient() {
            warn!("The failure is likely temporary, running {BIN_NAME} again may succeed");
        }
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
