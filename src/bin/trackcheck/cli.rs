use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "trackcheck",
    about = "Cross-check particle tracking codes on a single beamline element",
    version,
    author,
    before_help = crate::display::banner_for_help(),
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Clean, generate inputs, run every backend and compare the results
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Generate the particle file and lattices without running anything
    #[command(visible_alias = "m")]
    Make(PrepareArgs),

    /// Remove every file a run of the case produces
    Clean(PrepareArgs),
}

impl Command {
    pub fn case(&self) -> &CaseArgs {
        match self {
            Command::Run(args) => &args.case,
            Command::Make(args) | Command::Clean(args) => &args.case,
        }
    }
}

/// Case selection shared by all commands.
#[derive(Args)]
pub struct CaseArgs {
    /// Test case description (TOML)
    #[arg(value_name = "CASE")]
    pub case_file: PathBuf,

    /// Working directory, overriding [run].working_dir
    #[arg(short = 'C', long = "workdir", value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Suppress progress output (for scripting)
    #[arg(short, long)]
    pub quiet: bool,

    /// Raise log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Backend selection shared by all commands.
#[derive(Args)]
#[command(next_help_heading = "Backends")]
pub struct BackendOptions {
    /// Backends to use, in order (bdsim, bdsim-tracking, ptc), comma-separated
    #[arg(short, long = "backend", value_name = "ID", value_delimiter = ',')]
    pub backends: Vec<String>,

    /// Backend whose output is the residual denominator (default: last)
    #[arg(long, value_name = "ID")]
    pub reference: Option<String>,
}

#[derive(Args)]
#[command(next_help_heading = "Execution")]
pub struct ExecutionOptions {
    /// Run the backends concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Per-process wall-clock limit in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,
}

#[derive(Args)]
#[command(next_help_heading = "Report")]
pub struct ReportOptions {
    /// Write the JSON report to FILE ("-" for stdout)
    #[arg(short, long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub case: CaseArgs,

    #[command(flatten)]
    pub backends: BackendOptions,

    #[command(flatten)]
    pub execution: ExecutionOptions,

    #[command(flatten)]
    pub report: ReportOptions,
}

#[derive(Args)]
pub struct PrepareArgs {
    #[command(flatten)]
    pub case: CaseArgs,

    #[command(flatten)]
    pub backends: BackendOptions,
}

pub fn parse() -> Cli {
    Cli::parse()
}
