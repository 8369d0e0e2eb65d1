// =============================================================================
// gather — Main Entry Point
// =============================================================================
//
// Resolves the run configuration, connects to XTB and either dumps recent
// history or logs the live candle stream. Candle lines go to stdout (-v) or
// are appended to the log file; diagnostics always go to stderr.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod candle;
mod cli;
mod config;
mod error;
mod gather;
mod sink;
mod types;
mod xtb;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::{ConfigLayer, EffectiveConfig};
use crate::error::GatherError;
use crate::sink::CandleSink;
use crate::xtb::XtbClient;

#[tokio::main]
async fn main() -> ExitCode {
    // ── 1. Environment & CLI ─────────────────────────────────────────────
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(&cli))),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(written) => {
            info!(written, "finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "gather failed");
            eprintln!("Err: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<u64, GatherError> {
    // ── 2. Config: CLI > file > environment ──────────────────────────────
    let config = resolve_config(cli)?;
    info!(
        symbol = %config.symbol,
        server = %config.server,
        destination = ?config.destination(),
        "configuration resolved"
    );

    // ── 3. Broker session + sink ─────────────────────────────────────────
    let sink = CandleSink::new(config.destination());
    let mut client = XtbClient::connect(config.server, config.debug).await?;

    // ── 4. Acquire ───────────────────────────────────────────────────────
    gather::run(&config, &mut client, &sink).await
}

fn resolve_config(cli: &Cli) -> Result<EffectiveConfig, GatherError> {
    let file = cli
        .config
        .as_deref()
        .map(ConfigLayer::from_file)
        .transpose()?;
    let config = config::resolve(cli.layer(), file, ConfigLayer::from_env(), cli.flags())?;
    Ok(config)
}

fn default_filter(cli: &Cli) -> &'static str {
    if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    }
}
