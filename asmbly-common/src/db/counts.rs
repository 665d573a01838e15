//! Daily count persistence
//!
//! `membership_count` is keyed by date: writing the same day twice
//! overwrites the row instead of adding a second one.

use crate::db::models::DailyCountRecord;
use crate::{Error, Result};
use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};

/// Insert or overwrite the row for `record.date`
pub async fn upsert_daily_count(conn: &mut SqliteConnection, record: &DailyCountRecord) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO membership_count (
            date, total_active_count, acct_signups_count,
            member_signups_count, churn_count, updated_at
        ) VALUES (?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(date) DO UPDATE SET
            total_active_count = excluded.total_active_count,
            acct_signups_count = excluded.acct_signups_count,
            member_signups_count = excluded.member_signups_count,
            churn_count = excluded.churn_count,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(record.date)
    .bind(record.total_active_count)
    .bind(record.acct_signups_count)
    .bind(record.member_signups_count)
    .bind(record.churn_count)
    .execute(conn)
    .await?;

    if result.rows_affected() != 1 {
        return Err(Error::PersistenceConflict {
            table: "membership_count",
            key: record.date.to_string(),
            rows: result.rows_affected(),
        });
    }

    Ok(())
}

/// Load the row for one day
pub async fn get_daily_count(pool: &SqlitePool, date: NaiveDate) -> Result<Option<DailyCountRecord>> {
    let record = sqlx::query_as::<_, DailyCountRecord>(
        r#"
        SELECT date, total_active_count, acct_signups_count, member_signups_count, churn_count
        FROM membership_count
        WHERE date = ?
        "#,
    )
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Rows with `start <= date <= end`, newest first
pub async fn list_daily_counts(
    pool: &SqlitePool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DailyCountRecord>> {
    let records = sqlx::query_as::<_, DailyCountRecord>(
        r#"
        SELECT date, total_active_count, acct_signups_count, member_signups_count, churn_count
        FROM membership_count
        WHERE date >= ? AND date <= ?
        ORDER BY date DESC
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Number of stored days
pub async fn count_days(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM membership_count")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
