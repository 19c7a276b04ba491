use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use log::debug;
use std::path::PathBuf;

use crate::metrics::ContributionUnit;
use crate::pipeline::Stage;

/// Staged software-process metrics over git history and issue trackers
#[derive(Parser, Debug)]
#[command(name = "prime")]
#[command(about = "Collects commits, file sizes, issues and pull requests into a SQLite store and derives per-commit and per-day metrics")]
#[command(version)]
pub struct Args {
    /// Path to git repository (defaults to the current directory)
    #[arg(short = 'r', long = "repo", alias = "repository", value_name = "PATH", global = true)]
    pub repository: Option<String>,

    /// Store path (overrides the configured database)
    #[arg(long, value_name = "FILE", global = true)]
    pub db: Option<PathBuf>,

    /// Verbose output (debug level logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Log file path for file output
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Configuration section overriding all others
    #[arg(long, value_name = "SECTION", global = true)]
    pub config_name: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Tracker coordinates for the ingest stages
#[derive(ClapArgs, Debug, Clone, PartialEq)]
pub struct TrackerArgs {
    /// Repository owner on the tracker
    #[arg(long)]
    pub owner: String,

    /// Repository name on the tracker
    #[arg(long = "repo-name")]
    pub repo_name: String,

    /// API token (defaults to the configured environment variable)
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(ClapArgs, Debug, Clone, PartialEq, Default)]
pub struct RunArgs {
    /// Repository owner; with --repo-name runs the tracker side too
    #[arg(long, requires = "repo_name")]
    pub owner: Option<String>,

    #[arg(long = "repo-name", requires = "owner")]
    pub repo_name: Option<String>,

    #[arg(long)]
    pub token: Option<String>,

    #[command(flatten)]
    pub filesize: FileSizeArgs,

    #[command(flatten)]
    pub bus_factor: BusFactorArgs,
}

#[derive(ClapArgs, Debug, Clone, PartialEq, Default)]
pub struct FileSizeArgs {
    /// Scratch directory for commit checkouts
    #[arg(long, value_name = "DIR")]
    pub checkout_dir: Option<PathBuf>,

    /// Line counter program
    #[arg(long, value_name = "PROGRAM")]
    pub counter: Option<String>,
}

#[derive(ClapArgs, Debug, Clone, PartialEq, Default)]
pub struct BusFactorArgs {
    /// What counts as a contribution: commits or churn
    #[arg(long, value_name = "UNIT")]
    pub contribution: Option<ContributionUnit>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Ingest commits and release tags
    Vcs,
    /// Count lines per file at every commit
    Filesize(FileSizeArgs),
    /// Aggregate file sizes per commit and per day
    ProjectSize,
    /// Derive churn per commit and per day
    ProjectProductivity,
    /// Derive the bus factor per day
    BusFactor(BusFactorArgs),
    /// Ingest issues from the tracker
    Issues(TrackerArgs),
    /// Derive issue spoilage per day
    IssueSpoilage,
    /// Derive issue density per day
    IssueDensity,
    /// Ingest pull requests from the tracker
    PullRequests(TrackerArgs),
    /// Derive pull request spoilage per day
    PullRequestSpoilage,
    /// Run every stage in order
    Run(RunArgs),
}

impl Command {
    /// The stage this command runs, `None` for `run`
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Command::Vcs => Some(Stage::Vcs),
            Command::Filesize(_) => Some(Stage::Filesize),
            Command::ProjectSize => Some(Stage::ProjectSize),
            Command::ProjectProductivity => Some(Stage::ProjectProductivity),
            Command::BusFactor(_) => Some(Stage::BusFactor),
            Command::Issues(_) => Some(Stage::Issues),
            Command::IssueSpoilage => Some(Stage::IssueSpoilage),
            Command::IssueDensity => Some(Stage::IssueDensity),
            Command::PullRequests(_) => Some(Stage::PullRequests),
            Command::PullRequestSpoilage => Some(Stage::PullRequestSpoilage),
            Command::Run(_) => None,
        }
    }

    /// Tracker coordinates the command was given, if any
    pub fn tracker(&self) -> Option<TrackerArgs> {
        match self {
            Command::Issues(args) | Command::PullRequests(args) => Some(args.clone()),
            Command::Run(RunArgs {
                owner: Some(owner),
                repo_name: Some(repo_name),
                token,
                ..
            }) => Some(TrackerArgs {
                owner: owner.clone(),
                repo_name: repo_name.clone(),
                token: token.clone(),
            }),
            _ => None,
        }
    }

    pub fn filesize(&self) -> Option<&FileSizeArgs> {
        match self {
            Command::Filesize(args) => Some(args),
            Command::Run(run) => Some(&run.filesize),
            _ => None,
        }
    }

    pub fn bus_factor(&self) -> Option<&BusFactorArgs> {
        match self {
            Command::BusFactor(args) => Some(args),
            Command::Run(run) => Some(&run.bus_factor),
            _ => None,
        }
    }
}

pub fn parse_args() -> Args {
    let args = Args::parse();
    debug!("Parsed CLI arguments: {:?}", args);
    args
}

/// Reject flag combinations clap cannot express
pub fn validate_args(args: &Args) -> Result<()> {
    let log_flags_count = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|&&flag| flag)
        .count();
    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified"
        ));
    }

    if let Some(format) = &args.log_format {
        format
            .parse::<crate::logging::LogFormat>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }

    if let Some(level) = &args.log_file_level {
        crate::logging::parse_log_level(level)?;
        if args.log_file.is_none() {
            return Err(anyhow::anyhow!("--log-file-level requires --log-file to be specified"));
        }
    }

    Ok(())
}
