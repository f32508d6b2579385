//! bommerge server entry point.
//!
//! Loads configuration, opens the database, starts the web server, and
//! handles graceful shutdown.

mod signals;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bommerge_core::config::AppConfig;
use bommerge_core::db::Database;
use bommerge_web::WebServer;

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// bommerge HTTP API server.
#[derive(Parser, Debug)]
#[command(
    name = "bommerge-server",
    version,
    about = "BOM part-list merge and snapshot server"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load and validate configuration
    let config =
        AppConfig::load_from_file(&args.config).context("failed to load configuration file")?;
    config
        .validate()
        .context("configuration validation failed")?;

    // Initialize tracing
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.server.log_level);

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    // Startup banner
    info!("========================================");
    info!("  bommerge Server v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Config file : {}", args.config.display());
    info!("Listen      : {}", config.server.listen);
    info!("Data dir    : {}", config.server.data_dir.display());
    info!("Database    : {}", config.db_path().display());
    info!("Log level   : {}", log_level);
    info!("========================================");

    // Ensure data directory exists
    std::fs::create_dir_all(&config.server.data_dir)
        .context("failed to create data directory")?;

    // Initialize database
    let db = Database::new(config.db_path()).context("failed to open database")?;
    db.initialize()
        .context("failed to initialize database schema")?;
    info!("Database initialized at {}", config.db_path().display());

    // Initialize web server. The spreadsheet exporter is an external
    // collaborator; none ships with this server.
    let listen_addr = config.server.listen.clone();
    let web_server = WebServer::new(config, db, None);

    // Start web server in background
    let web_handle = tokio::spawn(async move {
        if let Err(e) = web_server.start(&listen_addr).await {
            error!("Web server error: {}", e);
        }
    });

    // Wait for shutdown signal
    signals::wait_for_shutdown().await;

    info!("Shutdown signal received, stopping...");

    // In-flight requests each hold the database lock only briefly; there is
    // no background work to drain, so aborting the server task is enough.
    web_handle.abort();

    info!("bommerge server stopped.");
    Ok(())
}
