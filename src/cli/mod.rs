//! [Command-line interface](Cli) (CLI) of the main binary.

use crate::run::{ConsensusArgs, GroupsArgs, MatrixArgs, RunArgs, ScanArgs};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

// ----------------------------------------------------------------------------
// CLI Entry Point
// ----------------------------------------------------------------------------

/// The command-line interface (CLI).
/// ---
/// The CLI is intended for parsing user input from the command-line in the main function. This is achieved with the `parse` function, which parses the command line arguments from [`std::env::args`](https://doc.rust-lang.org/std/env/fn.args.html).
/// ```no_run
/// use clap::Parser;
/// let args = cgcd::Cli::parse();
/// ```
/// Here is a manual example of setting the command-line input:
/// ```rust
/// # use clap::Parser;
/// let input = ["cgcd", "consensus", "--curves", "abgd.tsv,asap.tsv", "--output-dir", "output"];
/// let args = cgcd::Cli::parse_from(input);
/// serde_json::to_string_pretty(&args)?;
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
/// With the following pretty JSON representation:
/// ```json
/// {
///   "command": {
///     "Consensus": {
///       "curves": ["abgd.tsv", "asap.tsv"],
///       "names": null,
///       "kappa": 20.0,
///       "output_dir": "output"
///     }
///   },
///   "verbosity": "Info"
/// }
/// ```
#[derive(Debug, Deserialize, Parser, Serialize)]
#[clap(name = "cgcd", author, version)]
#[clap(about = "cgcd delimits conspecific strains from the agreement of per-gene partitions.")]
pub struct Cli {
    #[clap(subcommand)]
    /// Pass CLI arguments to a particular [Command].
    #[clap(help = "Set the command.")]
    pub command: Command,

    /// Set the output [Verbosity] level.
    #[clap(short = 'v', long)]
    #[clap(value_enum, default_value_t = Verbosity::default())]
    #[clap(hide_possible_values = false)]
    #[clap(global = true)]
    #[clap(help = "Set the output verbosity level.")]
    pub verbosity: Verbosity,
}

/// CLI [commands](#variants). Used to decide which runtime [Command](#variants) the CLI arguments should be passed to.
#[derive(Debug, Deserialize, Serialize, Subcommand)]
pub enum Command {
    /// ## Examples
    /// ```rust
    /// use cgcd::{Cli, cli::Command};
    /// use clap::Parser;
    /// let input = ["cgcd", "matrix", "--partitions", "genes/abgd", "--output", "matrix.tsv"];
    /// let args = Cli::parse_from(input);
    /// assert!(matches!(args.command, Command::Matrix(_)));
    /// ```
    #[clap(about = "Build the support matrix of one method's per-gene partitions.")]
    Matrix(MatrixArgs),
    #[clap(about = "Scan thresholds of a support matrix into a group-count curve.")]
    Scan(ScanArgs),
    #[clap(about = "Export group membership at chosen thresholds.")]
    Groups(GroupsArgs),
    #[clap(about = "Select the consensus group count of two curves.")]
    Consensus(ConsensusArgs),
    /// ## Examples
    /// ```rust
    /// use cgcd::{Cli, cli::Command};
    /// use clap::Parser;
    /// let input = ["cgcd", "run", "--method", "abgd=genes/abgd", "--method", "asap=genes/asap", "-o", "out"];
    /// let args = Cli::parse_from(input);
    /// let Command::Run(args) = args.command else { panic!() };
    /// assert_eq!(args.methods.len(), 2);
    /// assert_eq!(args.methods[1].name, "asap");
    /// ```
    #[clap(about = "Run matrices, scans, and consensus of two methods.")]
    Run(RunArgs),
}

// -----------------------------------------------------------------------------
// Verbosity
// -----------------------------------------------------------------------------

/// The output verbosity level.
#[derive(Clone, Debug, Default, Deserialize, Serialize, ValueEnum)]
pub enum Verbosity {
    #[default]
    Info,
    Warn,
    Debug,
    Error,
}

impl Display for Verbosity {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        // Convert to lowercase for RUST_LOG env var compatibility
        let lowercase = format!("{:?}", self).to_lowercase();
        write!(f, "{lowercase}")
    }
}
