//! FrameDeck CLI - Main Entry Point

use clap::{Parser, Subcommand};
use colored::Colorize;

use framedeck_cli::commands::{active, catalog, session};
use framedeck_cli::output::{self, print_error, print_success};
use framedeck_workspace::DeckClient;

/// FrameDeck CLI - keep many dashboards warm in one tab
#[derive(Parser)]
#[command(name = "framedeck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Server address
    #[arg(long, default_value = "http://127.0.0.1:7080", env = "FRAMEDECK_SERVER", global = true)]
    server_addr: String,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the url catalog
    #[command(subcommand)]
    Catalog(catalog::CatalogCommands),

    /// Manage stored active urls
    #[command(subcommand)]
    Active(active::ActiveCommands),

    /// Run a scripted headless session
    Session(session::SessionArgs),

    /// Check server status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let client = DeckClient::new(&cli.server_addr)?;

    match cli.command {
        Commands::Catalog(cmd) => catalog::execute(cmd, client, cli.format).await?,
        Commands::Active(cmd) => active::execute(cmd, client, cli.format).await?,
        Commands::Session(args) => session::execute(args, client, cli.format).await?,
        Commands::Status => match client.health().await {
            Ok(health) => {
                print_success(&format!("Server is running at {}", client.base_url()));
                println!("  Version: {}", health.version.bold());
                println!("  URLs:    {}", health.url_count);
                println!("  Users:   {}", health.user_count);
            }
            Err(e) => {
                print_error(&format!("Server is not responding at {}: {}", client.base_url(), e));
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
