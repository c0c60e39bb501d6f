//! Fieldbook CLI - diagnostics for backend resolution and offline fallback.
//!
//! Supplies the platform signal and resolver configuration that the mobile
//! and web hosts normally provide, then drives `fieldbook-core` directly.
//! Results are printed to stdout as JSON; logs go to stderr.

mod cli;
mod commands;
mod settings;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Set up logging
    let log_level = if args.global.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = settings::load_config(&args.global)?;
    let platform = settings::platform(&args.global)?;
    debug!("Platform {} (emulator: {})", platform.os, platform.is_emulator);

    let output = commands::run(&args.command, config, platform, args.global.token.clone()).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
