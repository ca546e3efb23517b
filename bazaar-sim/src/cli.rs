//! Command-line interface definition and parsing.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the market simulation.
#[derive(Parser, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short, long, env = "BAZAAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the number of rounds to run.
    #[arg(short, long)]
    pub rounds: Option<u64>,

    /// Override the seed of the tenants' random number generators.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the JSON schema of the configuration to this path and exit.
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Write the final run report to this path instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn import() -> Result<Self, clap::Error> {
        Self::try_parse()
    }
}
