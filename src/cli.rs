// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "outrider")]
#[command(about = "Ship container images to remote and air-gapped hosts over SSH")]
#[command(version)]
pub struct Cli {
    /// Log stage progress
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log per-step detail
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output (for CI)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding the cache and the resume ledger (default ~/.outrider)
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull, package, transfer and post-place images on every target
    Deploy(DeployArgs),

    /// Check a configuration file without touching any host
    Validate {
        /// Configuration file
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Inspect or clear the packaging cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Inspect or prune the transfer ledger
    Resume {
        #[command(subcommand)]
        action: ResumeAction,
    },

    /// Load an image archive into the local runtime
    Load {
        /// Archive to import
        archive: PathBuf,

        /// Runtime socket (default: auto-detect)
        #[arg(long, value_name = "PATH")]
        socket: Option<String>,
    },
}

#[derive(Args)]
pub struct DeployArgs {
    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,

    /// Accept unknown host keys without recording them
    #[arg(long)]
    pub skip_host_verification: bool,

    /// Targets served at once (clamped to 1..=10)
    #[arg(long, value_name = "N", default_value_t = outrider::types::DEFAULT_CONCURRENCY)]
    pub max_concurrent_uploads: usize,

    /// Repackage even when a cached archive matches
    #[arg(long)]
    pub no_cache: bool,

    /// Skip the upload when the remote archive path already exists
    #[arg(long)]
    pub skip_if_exists: bool,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show cached archives
    Stats,

    /// Forget one cached archive, or all of them
    Clear {
        /// Archive path to forget
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ResumeAction {
    /// Show recorded transfers
    Stats,

    /// Drop entries older than the given age
    Cleanup {
        /// Maximum entry age, e.g. 7d or 12h
        #[arg(long, value_name = "DURATION", default_value = "7d", value_parser = humantime::parse_duration)]
        max_age: Duration,
    },
}
