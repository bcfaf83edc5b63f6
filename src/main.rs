use cgcd::{cli::Command, Cli, Consensus};
use clap::Parser;
use color_eyre::eyre::{Report, Result};
use std::process::ExitCode;

/// Exit code when the two methods share no plateau group count.
const NO_CONSENSUS: u8 = 2;

fn main() -> Result<ExitCode, Report> {
    // ------------------------------------------------------------------------
    // CLI Setup

    // Parse CLI parameters
    let args = Cli::parse();

    // initialize color_eyre crate for colorized logs
    color_eyre::install()?;

    // Set logging/verbosity level via RUST_LOG
    std::env::set_var("RUST_LOG", args.verbosity.to_string());

    // initialize env_logger crate for logging/verbosity level
    env_logger::init();

    // check which CLI command we're running
    let consensus = match args.command {
        Command::Matrix(args) => {
            cgcd::run::matrix(&args)?;
            None
        }
        Command::Scan(args) => {
            cgcd::run::scan(&args)?;
            None
        }
        Command::Groups(args) => {
            cgcd::run::groups(&args)?;
            None
        }
        Command::Consensus(args) => Some(cgcd::run::consensus(&args)?),
        Command::Run(args) => Some(cgcd::run(&args)?),
    };

    match consensus {
        Some(Consensus::Selected(result)) => {
            println!("{result}");
            Ok(ExitCode::SUCCESS)
        }
        Some(Consensus::NoConsensus { .. }) => Ok(ExitCode::from(NO_CONSENSUS)),
        None => Ok(ExitCode::SUCCESS),
    }
}
