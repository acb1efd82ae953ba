//! Driver Drowsiness Monitor - Main Entry Point

use api::cli::Args;
use api::settings::Settings;
use api::telemetry::{init_logging, install_metrics};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    init_logging(&settings.logging)?;
    let metrics = install_metrics()?;

    info!("=== Driver Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    api::run(settings, metrics).await
}
