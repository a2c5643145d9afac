// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Sentinel.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

mod config;
mod console;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sentinel_api::{IotApi, IotApiClient};
use sentinel_core::Dashboard;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::console::Console;

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(author, version, about = "Sentinel - IoT sensor and actuator dashboard")]
#[command(long_about = "Polls an IoT REST API for sensor readings and actuator states, \
    keeps a local snapshot and lets an operator switch actuators.\n\
    \nExamples:\n  \
    sentinel                          # Poll and open the console\n  \
    sentinel --config sentinel.toml run\n  \
    sentinel once                     # One poll cycle, JSON on stdout")]
struct Cli {
    /// Configuration file (TOML, or JSON with a .json extension)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Poll continuously and accept console commands on stdin
    Run,
    /// Run a single poll cycle and print the resulting dashboard as JSON
    Once,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.dashboard.log_level)),
        )
        .init();

    info!("🚀 Starting Sentinel");
    info!("📋 Configuration Summary:");
    info!("   Mode: {}", config.dashboard.mode);
    info!(
        "   API: {}",
        config.api.base_url.as_deref().unwrap_or("(from environment)")
    );
    info!("   Poll interval: {}s", config.polling.interval_secs);
    info!(
        "   Detail batches: sensors {} / {}ms, actuators {} / {}ms",
        config.polling.sensor_batch_size,
        config.polling.sensor_batch_pause_ms,
        config.polling.actuator_batch_size,
        config.polling.actuator_batch_pause_ms
    );
    info!(
        "   Temperature scale: {}",
        config.dashboard.temperature_scale.symbol()
    );
    info!("   AI summary: {}", config.summary.enabled);

    let client = IotApiClient::from_config(
        config.api.base_url.clone(),
        config.api.token.clone(),
        config.api_timeout(),
    )
    .context("Failed to initialize IoT API client")?
    .with_retry_config(config.api.max_retries, config.retry_delay());
    info!("🔌 IoT API client ready: {}", client.base_url());

    let api: Arc<dyn IotApi> = Arc::new(client);
    let dashboard = Dashboard::new(api, config.to_dashboard_config());

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Once => run_once(&dashboard).await,
        Commands::Run => run(&dashboard, &config).await,
    }
}

async fn run_once(dashboard: &Dashboard) -> Result<()> {
    let report = dashboard.poll_once().await;
    if let Some(kind) = report.error {
        warn!("Poll cycle finished with upstream error: {}", kind);
    }

    let store = dashboard.store();
    let output = json!({
        "mode": store.mode(),
        "connection": store.connection(),
        "stats": store.stats(),
        "snapshot": store.snapshot(),
        "metrics": dashboard.metrics(),
        "activity": store.activity(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to serialize dashboard")?
    );
    Ok(())
}

async fn run(dashboard: &Dashboard, config: &AppConfig) -> Result<()> {
    let shutdown = CancellationToken::new();
    let poller = dashboard.spawn_poller(shutdown.child_token());

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {e}");
            return;
        }
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    let result = Console::new(dashboard, &config.summary).run(&shutdown).await;

    shutdown.cancel();
    if let Err(e) = poller.await {
        warn!("Poll loop ended abnormally: {e}");
    }
    info!("Shutting down");
    result
}
