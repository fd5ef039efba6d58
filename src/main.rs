//! Presence Relay Server
//!
//! Run with: cargo run -- [--config path] [--port N]
//!
//! # Configuration
//!
//! Environment variables:
//! - `PORT`: Port to listen on (default: 3002)
//! - `PRESENCE_RELAY_HOST`: Host to bind to (default: 0.0.0.0)
//! - `PRESENCE_RELAY_STATIC_DIR`: Static asset directory (default: public)
//! - `PRESENCE_RELAY_LOG_LEVEL`: Log level (default: info)
//! - `PRESENCE_RELAY_LOG_FORMAT`: pretty or json (default: pretty)
//! - `RUST_LOG`: Full filter directive, overrides the log level

use clap::Parser;
use presence_relay::api::{serve, AppState};
use presence_relay::config::{generate_default_config, Config, LoggingConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "presence-relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time presence and location broadcast relay")]
struct Cli {
    /// Path to a TOML config file (default: search standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overrides config and environment
    #[arg(short, long)]
    port: Option<u16>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let loaded = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    // Messages gathered while loading are emitted once the subscriber exists
    init_tracing(&loaded.config.logging);
    loaded.log();

    let mut config = loaded.config;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!("Starting presence relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Static assets: {:?}", config.server.static_dir);

    let state = AppState::with_hub_config(config.server.clone(), config.hub_config());
    serve(state).await?;

    tracing::info!("Presence relay stopped");
    Ok(())
}

/// Initialize tracing from the logging config. `RUST_LOG` takes precedence.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("presence_relay={},tower_http=info", logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
