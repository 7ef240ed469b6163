//! ShakeDraw - shake (or ask) to draw a random image from your folders
//!
//! Command-line entry point.

mod cli;
mod commands;

use anyhow::Result;
use app_core::AppConfig;
use clap::Parser;
use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Read before logging starts so the verbosity setting applies
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load().unwrap_or_default(),
    };

    let verbose = cli.verbose || config.general.verbose_logging;
    let _log_guard = app_log::init(app_log::LogOptions {
        verbose,
        console: verbose || cfg!(debug_assertions),
        dir: None,
    })?;

    // Clean up old logs (7 days)
    if let Err(e) = app_log::cleanup_old_logs(7) {
        tracing::warn!("Failed to cleanup old logs: {}", e);
    }

    tracing::info!("ShakeDraw {} starting...", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("shakedraw-worker")
        .build()?;

    let result = runtime.block_on(commands::run(cli.command, config, runtime.handle().clone()));
    if let Err(e) = &result {
        tracing::error!("{:#}", e);
    }
    result
}
