//! asmbly-dash - Membership dashboard API server
//!
//! Serves daily counts, active-member trends, churn-risk tables and zip
//! counts from the database `asmbly-sync` maintains.

use anyhow::{Context, Result};
use asmbly_common::config::{load_config, resolve_database_path};
use asmbly_common::db::init_database;
use asmbly_dash::{build_router, AppState};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "asmbly-dash", version, about = "Asmbly membership dashboard")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the SQLite database
    #[arg(long)]
    database: Option<PathBuf>,

    /// Listen address, overriding `dashboard.bind`
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "Starting asmbly-dash v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let db_path = resolve_database_path(cli.database.as_deref(), &config);
    info!("Database: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let app = build_router(AppState::new(pool));

    let bind = cli.bind.unwrap_or(config.dashboard.bind);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("asmbly-dash listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
