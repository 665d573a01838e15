//! asmbly-sync - Membership analytics jobs
//!
//! Each job is a subcommand, run once per invocation (normally from cron):
//! - `daily-counts`: reconcile churns and joins and store the day's counts
//! - `risk-scores`: rescore established members
//! - `zip-codes`: refresh stored member zip codes

use anyhow::{Context, Result};
use asmbly_common::config::{load_config, resolve_database_path};
use asmbly_common::db::init_database;
use asmbly_common::time::{parse_iso_date, reporting_date, today};
use asmbly_sync::crm::NeonClient;
use asmbly_sync::risk::{LinearRiskModel, RiskJob, RiskModel};
use asmbly_sync::{ReconciliationDriver, SqliteDailyStore};
use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "asmbly-sync", version, about = "Asmbly membership analytics jobs")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite database
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store active, signup and churn counts for one day
    DailyCounts {
        /// Reporting date (YYYY-MM-DD), default yesterday
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Recompute churn-risk scores for active members
    RiskScores,
    /// Refresh member zip codes
    ZipCodes,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    parse_iso_date(s).ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD", s))
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
        "Starting asmbly-sync v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let db_path = resolve_database_path(cli.database.as_deref(), &config);
    info!("Database: {}", db_path.display());
    let pool = init_database(&db_path).await?;

    let crm = Arc::new(NeonClient::from_config(&config.crm)?);

    let result = match cli.command {
        Command::DailyCounts { date } => {
            let run_date = match date {
                Some(d) => d + Duration::days(1),
                None => today(),
            };
            let report_date = reporting_date(run_date);
            let driver = ReconciliationDriver::new(
                crm,
                SqliteDailyStore::new(pool.clone()),
                config.sync.concurrency,
            );
            driver
                .run(report_date, run_date)
                .await
                .map(|summary| info!(run_id = %summary.run_id, "Daily counts complete for {}", report_date))
                .context("daily-counts failed")
        }
        Command::RiskScores => {
            let model: Arc<dyn RiskModel> = match &config.sync.risk_model_path {
                Some(path) => Arc::new(LinearRiskModel::load(path)?),
                None => {
                    warn!("No sync.risk_model_path configured, scoring everyone at baseline risk");
                    Arc::new(LinearRiskModel::default())
                }
            };
            let job = RiskJob::new(crm, model, pool.clone(), &config.sync);
            job.run(today())
                .await
                .map(|summary| info!(run_id = %summary.run_id, scored = summary.scored, "Risk scoring complete"))
                .context("risk-scores failed")
        }
        Command::ZipCodes => asmbly_sync::zip::refresh_zip_codes(crm, &pool)
            .await
            .map(|summary| info!(rows_updated = summary.rows_updated, "Zip refresh complete"))
            .context("zip-codes failed"),
    };

    pool.close().await;

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
