//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "drowsiness-monitor", version, about = "Driver drowsiness monitor service")]
pub struct Args {
    /// Settings file; defaults to config/default.toml
    #[arg(long, env = "DMS_CONFIG")]
    pub config: Option<PathBuf>,
}
