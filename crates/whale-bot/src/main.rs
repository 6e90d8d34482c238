//! Whale position tracker entry point.

use clap::Parser;
use tracing::{error, info};
use whale_bot::{AppConfig, Application};
use whale_telemetry::init_logging;

#[derive(Parser, Debug)]
#[command(name = "whale-bot", about = "Hyperliquid whale position tracker")]
struct Args {
    /// Path to the TOML config file (environment variables override it).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let args = Args::parse();
    let config_path = args
        .config
        .or_else(|| std::env::var("WHALE_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = AppConfig::load(Some(&config_path))?;
    if let Err(e) = config.validate() {
        error!(%e, "Invalid configuration");
        return Err(e.into());
    }

    info!(config = %config_path, "Configuration loaded");
    Application::new(config)?.run().await?;
    Ok(())
}
