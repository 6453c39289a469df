//! FrameDeck server binary

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use framedeck_web::{AppState, ServerConfig};

#[derive(Parser)]
#[command(name = "framedeck-server")]
#[command(about = "FrameDeck server - url catalogs and active url preferences")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FRAMEDECK_CONFIG")]
    config: Option<PathBuf>,

    /// Store directory
    #[arg(short, long, env = "FRAMEDECK_STORE")]
    store: Option<PathBuf>,

    /// Catalog file
    #[arg(long, env = "FRAMEDECK_CATALOG")]
    catalog: Option<PathBuf>,

    /// HTTP listen address
    #[arg(short, long, env = "FRAMEDECK_LISTEN")]
    listen: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("FrameDeck server v{}", framedeck_common::VERSION);

    let config_path = cli
        .config
        .unwrap_or_else(|| framedeck_common::default_store_path().join("server.toml"));
    let mut config = ServerConfig::load(&config_path)?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    if let Some(catalog) = cli.catalog {
        config.catalog_path = Some(catalog);
    }
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    tokio::fs::create_dir_all(&config.store_path).await?;

    let addr = config.listen_addr()?;
    let state = Arc::new(AppState::from_config(&config)?);
    framedeck_web::serve(addr, state).await?;

    info!("Server shutdown complete");
    Ok(())
}
