//! Member persistence
//!
//! The `member` table is keyed by CRM account id. Jobs write disjoint
//! column sets: daily classification flips `active`, the risk job writes the
//! profile and score, the zip job refreshes `zip_code`, and the dashboard
//! owns `emailed`.

use crate::db::models::{MemberActivity, MemberProfile, MemberRecord, ZipUpdate};
use crate::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};

/// Insert-or-update the `active` flag of each member.
///
/// Members seen for the first time are created with only their id and
/// activity; the risk job fills in the rest later.
pub async fn bulk_upsert_member_activity(
    conn: &mut SqliteConnection,
    updates: &[MemberActivity],
) -> Result<()> {
    for update in updates {
        let result = sqlx::query(
            r#"
            INSERT INTO member (neon_id, active, created_at, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            ON CONFLICT(neon_id) DO UPDATE SET
                active = excluded.active,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(update.neon_id)
        .bind(update.active)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() != 1 {
            return Err(Error::PersistenceConflict {
                table: "member",
                key: update.neon_id.to_string(),
                rows: result.rows_affected(),
            });
        }
    }

    Ok(())
}

/// Insert-or-update everything the risk job knows about a member
pub async fn upsert_member_profile(pool: &SqlitePool, profile: &MemberProfile) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO member (
            neon_id, first_name, last_name, email, zip_code, risk_score,
            membership_duration, active, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(neon_id) DO UPDATE SET
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            email = excluded.email,
            zip_code = excluded.zip_code,
            risk_score = excluded.risk_score,
            membership_duration = excluded.membership_duration,
            active = excluded.active,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(profile.neon_id)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.email)
    .bind(profile.zip_code)
    .bind(profile.risk_score)
    .bind(profile.membership_duration)
    .bind(profile.active)
    .execute(pool)
    .await?;

    if result.rows_affected() != 1 {
        return Err(Error::PersistenceConflict {
            table: "member",
            key: profile.neon_id.to_string(),
            rows: result.rows_affected(),
        });
    }

    Ok(())
}

/// Refresh zip codes of existing members in one transaction.
///
/// Returns the number of rows updated; ids without a row are ignored.
pub async fn bulk_update_zip_codes(pool: &SqlitePool, updates: &[ZipUpdate]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut updated = 0;

    for update in updates {
        let result = sqlx::query(
            "UPDATE member SET zip_code = ?, updated_at = CURRENT_TIMESTAMP WHERE neon_id = ?",
        )
        .bind(update.zip_code)
        .bind(update.neon_id)
        .execute(&mut *tx)
        .await?;
        updated += result.rows_affected();
    }

    tx.commit().await?;
    Ok(updated)
}

/// Every member id in the table, ascending
pub async fn list_member_ids(pool: &SqlitePool) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar("SELECT neon_id FROM member ORDER BY neon_id")
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// Load one member
pub async fn get_member(pool: &SqlitePool, neon_id: i64) -> Result<Option<MemberRecord>> {
    let record = sqlx::query_as::<_, MemberRecord>(
        r#"
        SELECT neon_id, first_name, last_name, email, zip_code, risk_score,
               membership_duration, emailed, active
        FROM member
        WHERE neon_id = ?
        "#,
    )
    .bind(neon_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}
