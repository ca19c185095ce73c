use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use portfolio_returns_core::models::settings::EngineConfig;
use portfolio_returns_core::providers::http::HttpAssetStore;
use portfolio_returns_core::ReturnsEngine;

/// Compute strategy returns from the asset store and write the output document.
///
/// Runs once and exits; scheduling is left to cron or the orchestrator.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON configuration file. Built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("portfolio_returns=info,portfolio_returns_core=info")
    });
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let store = HttpAssetStore::new(
        config.store_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let engine = ReturnsEngine::new(config)?;
    info!(store = store.base_url(), "starting run");

    let (output, saved) = engine
        .run_once(&store)
        .await
        .context("portfolio returns run failed")?;

    for (name, report) in &output.document.strategies {
        info!(strategy = %name, annual_roi = report.annual_roi, "strategy result");
    }
    info!(document = %saved.latest_document.display(), "outputs written");
    Ok(())
}
