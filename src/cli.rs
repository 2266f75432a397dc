//! Data structures for the `ura` CLI (§6).

use std::path::PathBuf;

/// Assess the effort, risk, and feasibility of upgrading a content-management installation
#[derive(Debug, clap::Parser)]
#[command(name = "ura", about, long_about = None)]
pub struct Args {
    /// path to the configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// silence progress reporting
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Discover an installation, run the analyzer battery against it, and write a report
    Analyze(AnalyzeArgs),
    /// Clear one or more on-disk caches
    Cache(CacheArgs),
}

#[derive(Debug, clap::Args)]
pub struct AnalyzeArgs {
    /// path to the installation to analyze
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// target major version to assess readiness against
    #[arg(short, long, value_name = "VERSION")]
    pub target: String,

    /// output directory for the report (overrides `reporting.output_dir`)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// report formats to emit (overrides `reporting.formats`)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Vec<String>,
}

#[derive(Debug, clap::Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum CacheCommand {
    /// Clear cache entries
    Clear(CacheClearArgs),
}

#[derive(Debug, clap::Args)]
pub struct CacheClearArgs {
    /// cache type(s) to clear; clears all types if omitted
    #[arg(long = "type", value_name = "TYPE")]
    pub cache_type: Vec<String>,

    /// report what would be cleared without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// proceed even if a requested cache type has never been populated
    #[arg(long)]
    pub force: bool,
}
