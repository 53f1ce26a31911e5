//! sigfeed monitor - Entry Point

use anyhow::Result;
use clap::Parser;
use sigfeed_ws::ConnectionManager;
use tracing::info;

/// Headless monitor for the sigfeed dashboard feed
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SIGFEED_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// WebSocket base URL, overriding the configured one
    #[arg(short, long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    sigfeed_ws::init_crypto();

    let args = Args::parse();

    sigfeed_telemetry::init_logging()?;

    info!("Starting sigfeed monitor v{}", env!("CARGO_PKG_VERSION"));

    let mut config = sigfeed_monitor::AppConfig::load(args.config)?;
    if let Some(url) = args.url {
        config = config.with_url(url);
    }
    info!(
        url = %config.connection.url,
        max_reconnect_attempts = config.connection.max_reconnect_attempts,
        "Configuration loaded"
    );

    let connection = ConnectionManager::new(config.connection.clone());
    let mut monitor = sigfeed_monitor::Monitor::new(config, connection);
    monitor.run().await?;

    Ok(())
}
