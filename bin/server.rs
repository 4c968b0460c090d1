// Payroll Ledger - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use clap::Parser;
use payroll_ledger::api::{create_router, AppState};
use payroll_ledger::logging::init_logger;
use payroll_ledger::{Config, PayrollService};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Payroll ledger HTTP server", long_about = None)]
struct Cli {
    /// TOML config file (defaults to $PAYROLL_CONFIG, then built-in defaults)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_logger(&config.logging);

    let database = config.database();
    database
        .initialize()
        .with_context(|| format!("Failed to initialize database at {}", database.path().display()))?;
    info!(path = %database.path().display(), "database ready");

    let state = AppState::new(PayrollService::new(database));
    let app = create_router(state);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(%addr, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
