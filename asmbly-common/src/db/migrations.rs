//! Database schema versioning
//!
//! Version 1 is the schema `CREATE TABLE IF NOT EXISTS` in
//! [`crate::db::init`] creates. A fresh or unversioned database is stamped
//! with it; later schema changes are added here as numbered migrations.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - they must stay stable for upgrades
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Check before altering** - every migration must be safe to re-run

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Bring the recorded schema version up to [`CURRENT_SCHEMA_VERSION`].
///
/// Expects the `schema_version` table and the current tables to exist.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    if current_version < 1 {
        set_schema_version(pool, 1).await?;
        info!("Stamped database schema v1");
    }

    Ok(())
}
