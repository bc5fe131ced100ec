use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;

/// Upper bound on concurrent domain tasks
pub const MAX_WORKERS: usize = 200;

#[derive(Parser, Debug)]
#[command(name = "logocluster")]
#[command(about = "Fetch a logo for every domain in a list and group domains whose logos look alike")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Create default configuration file at ./config/logocluster.toml
    #[arg(long, global = true)]
    pub init: bool,

    /// Domain list (CSV with a domain column, plain list, or JSON)
    #[arg(short, long, global = true, default_value = "data.csv")]
    pub input: PathBuf,

    /// Directory the result files are written to
    #[arg(short, long, global = true, default_value = ".")]
    pub output_dir: PathBuf,

    /// Number of domains processed concurrently (overrides config)
    #[arg(short = 'j', long, global = true)]
    pub workers: Option<usize>,

    /// Maximum Hamming distance to a group's seed, inclusive (overrides config)
    #[arg(short, long, global = true)]
    pub threshold: Option<u32>,

    /// Per-request timeout in seconds (overrides config)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Configuration file (defaults to ./config/logocluster.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging (use -v for INFO, -vv for DEBUG with per-request details)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable the progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Fetch logos, write hashes, then group similar logos (default)
    Run,

    /// Fetch logos and write hashes only
    Fetch,

    /// Group logos from a previously written hash file
    Group {
        /// Hash file to read (defaults to the configured hash file in the output directory)
        #[arg(long)]
        hashes: Option<PathBuf>,
    },
}

impl Cli {
    /// Subcommand to execute; no subcommand means a full run
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(workers) = self.workers {
            if workers == 0 {
                return Err("Workers must be greater than 0".to_string());
            }
            if workers > MAX_WORKERS {
                return Err(format!(
                    "Workers cannot exceed {} to avoid overwhelming remote hosts",
                    MAX_WORKERS
                ));
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(workers) = self.workers {
            config.fetch.workers = workers;
        }
        if let Some(threshold) = self.threshold {
            config.grouping.threshold = threshold;
        }
        if let Some(timeout) = self.timeout {
            config.http.request_timeout_secs = timeout;
        }
    }

    /// Resolve an output file name against the output directory
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}
