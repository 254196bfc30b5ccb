use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Materials Modeling Group",
    version,
    about = "eqsweep CLI - Batch equilibrium parameter sweeps over cementitious carbonation formulations.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full sweep: enumerate, derive compositions, and execute all
    /// equilibrium calculations.
    Run(RunArgs),
    /// Aggregate a finished (or partial) sweep into tabular exports.
    Aggregate(AggregateArgs),
    /// Enumerate the design space and derived masses without running any
    /// calculation.
    Preview(PreviewArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Root directory for input, result, and raw-output artifacts.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub work_dir: PathBuf,

    /// Path to the equilibrium solver executable. When omitted, common
    /// install locations and PATH are searched; with no solver found the
    /// built-in heuristic approximation is used.
    #[arg(short, long, value_name = "PATH")]
    pub executable: Option<PathBuf>,

    /// Path to the thermodynamic database handed to the solver.
    #[arg(long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Disable solver discovery; use the heuristic approximation unless an
    /// executable is given explicitly.
    #[arg(long)]
    pub no_discover: bool,

    /// Number of parallel workers. 1 runs strictly sequentially.
    #[arg(short = 'j', long, value_name = "NUM", default_value_t = 1)]
    pub workers: usize,

    /// Wall-clock timeout per calculation, in seconds.
    #[arg(short, long, value_name = "SECS", default_value_t = 300)]
    pub timeout: u64,

    /// Re-run tasks even when their result artifact already exists.
    #[arg(long)]
    pub no_skip_existing: bool,

    /// Retry rounds over the failed subset after the initial batch.
    #[arg(long, value_name = "NUM", default_value_t = 0)]
    pub retry_rounds: usize,

    /// Aggregate into tabular exports immediately after the sweep.
    #[arg(long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,
}

/// Arguments for the `aggregate` subcommand.
#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// Directory containing the result artifacts of a sweep.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub results_dir: PathBuf,

    /// Directory the exports are written to.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub out_dir: PathBuf,
}

/// Arguments for the `preview` subcommand.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Write the enumerated mix designs with derived masses to a CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Print only the first N mix designs.
    #[arg(long, value_name = "NUM", default_value_t = 10)]
    pub head: usize,
}
