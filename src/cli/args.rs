//! Command-line argument definitions
//!
//! Global flags select the config file and verbosity; each subcommand maps
//! to one stage or to the whole pipeline.

use crate::models::{DiscoveryStrategy, NormalizeMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Discover, unzip and load fixed-width instrument files
#[derive(Debug, Clone, Parser)]
#[command(
    name = "chestnut-etl",
    version,
    about = "Discover, unzip and load fixed-width instrument .dat files",
    long_about = "Selects zip archives of fixed-width instrument files by date window, \
                  extracts and stacks the .dat files inside them, normalizes column labels \
                  and timestamps, and appends the result to a SQLite database."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file (defaults to the user config directory)
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// List archives inside a date window
    Discover(DiscoverArgs),
    /// Extract one archive and print the stacked table
    Ingest(IngestArgs),
    /// Discover, ingest, normalize and append archives to a database table
    Load(LoadArgs),
    /// Fetch a secret through the credential broker
    Secret(SecretArgs),
}

#[derive(Debug, Clone, Parser)]
pub struct DiscoverArgs {
    /// Base directories to search
    #[arg(required = true, value_name = "BASE_DIR")]
    pub base_dirs: Vec<PathBuf>,

    /// Date window: YYYYMM, YYYYMMDD or YYYYMMDD-YYYYMMDD
    #[arg(short = 'd', long = "dates", value_name = "TOKEN")]
    pub dates: String,

    #[arg(long, value_enum)]
    pub strategy: Option<DiscoveryStrategy>,

    /// File extension collected in pruned mode
    #[arg(long, value_name = "EXT")]
    pub extension: Option<String>,
}

#[derive(Debug, Clone, Parser)]
pub struct IngestArgs {
    /// Zip archive of .dat files
    #[arg(value_name = "ZIP")]
    pub zip: PathBuf,

    /// Keep the extracted files
    #[arg(long)]
    pub keep: bool,

    /// Where kept files are moved
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub mode: Option<NormalizeMode>,

    /// Rows to print
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[derive(Debug, Clone, Parser)]
pub struct LoadArgs {
    #[arg(required = true, value_name = "BASE_DIR")]
    pub base_dirs: Vec<PathBuf>,

    /// Date window: YYYYMM, YYYYMMDD or YYYYMMDD-YYYYMMDD
    #[arg(short = 'd', long = "dates", value_name = "TOKEN")]
    pub dates: String,

    /// Target table
    #[arg(short = 't', long, value_name = "NAME")]
    pub table: String,

    /// SQLite database file
    #[arg(long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Schema (`main`, or a database attached from `<schema>.db` next to the main one)
    #[arg(long, value_name = "NAME")]
    pub schema: Option<String>,

    #[arg(long, value_name = "ROWS")]
    pub batch_size: Option<usize>,

    #[arg(long, value_enum)]
    pub strategy: Option<DiscoveryStrategy>,

    #[arg(long)]
    pub keep: bool,

    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub mode: Option<NormalizeMode>,
}

#[derive(Debug, Clone, Parser)]
pub struct SecretArgs {
    /// Variable to fetch (defaults to the configured token name)
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Broker program
    #[arg(long, value_name = "PROGRAM")]
    pub program: Option<String>,
}

impl Args {
    /// Log level from the flags, falling back to the configured level
    pub fn get_log_level(&self, configured: &str) -> String {
        if self.quiet {
            return "error".to_string();
        }
        match self.verbose {
            0 => configured.to_lowercase(),
            1 => "info".to_string(),
            2 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }

    /// Progress bars are drawn unless running quiet
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}
