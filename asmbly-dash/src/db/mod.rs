//! Dashboard queries over the `member` table
//!
//! Daily counts are read through `asmbly_common::db::counts`; everything
//! member-shaped the dashboard needs lives here.

use asmbly_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Sortable columns of the risk table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSort {
    RiskScore,
    Name,
    NeonId,
    Email,
}

impl RiskSort {
    fn column(self) -> &'static str {
        match self {
            RiskSort::RiskScore => "risk_score",
            RiskSort::Name => "lower(coalesce(first_name, '') || ' ' || coalesce(last_name, ''))",
            RiskSort::NeonId => "neon_id",
            RiskSort::Email => "lower(coalesce(email, ''))",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filters shared by the risk count and page queries
#[derive(Debug, Clone, Default)]
pub struct RiskFilter {
    /// Case-insensitive match on full name or email, exact match on id
    pub search: Option<String>,
    pub show_emailed: bool,
}

/// One scored active member
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RiskRow {
    pub neon_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub risk_score: f64,
    pub membership_duration: i64,
    pub emailed: bool,
}

const RISK_WHERE: &str = r#"
    WHERE active = 1
      AND risk_score IS NOT NULL
      AND (? OR emailed = 0)
      AND (
        ? IS NULL
        OR instr(lower(coalesce(first_name, '') || ' ' || coalesce(last_name, '')), lower(?)) > 0
        OR instr(lower(coalesce(email, '')), lower(?)) > 0
        OR CAST(neon_id AS TEXT) = ?
      )
"#;

fn search_term(filter: &RiskFilter) -> Option<&str> {
    filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Number of rows matching `filter`
pub async fn count_risk_rows(pool: &SqlitePool, filter: &RiskFilter) -> Result<i64> {
    let term = search_term(filter);
    let sql = format!("SELECT COUNT(*) FROM member {}", RISK_WHERE);

    let count: i64 = sqlx::query_scalar(&sql)
        .bind(filter.show_emailed)
        .bind(term)
        .bind(term)
        .bind(term)
        .bind(term)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// One page of rows matching `filter`; ties break on `neon_id`
pub async fn list_risk_rows(
    pool: &SqlitePool,
    filter: &RiskFilter,
    sort: RiskSort,
    order: SortOrder,
    limit: i64,
    offset: i64,
) -> Result<Vec<RiskRow>> {
    let term = search_term(filter);
    let sql = format!(
        r#"
        SELECT neon_id, first_name, last_name, email, risk_score,
               membership_duration, emailed
        FROM member
        {}
        ORDER BY {} {}, neon_id ASC
        LIMIT ? OFFSET ?
        "#,
        RISK_WHERE,
        sort.column(),
        order.keyword()
    );

    let rows = sqlx::query_as::<_, RiskRow>(&sql)
        .bind(filter.show_emailed)
        .bind(term)
        .bind(term)
        .bind(term)
        .bind(term)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// New value of one member's `emailed` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailedUpdate {
    pub neon_id: i64,
    pub emailed: bool,
}

/// Apply all updates in one transaction.
///
/// An unknown member id fails the whole batch with [`Error::NotFound`].
pub async fn set_emailed(pool: &SqlitePool, updates: &[EmailedUpdate]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut updated = 0;

    for update in updates {
        let result = sqlx::query(
            "UPDATE member SET emailed = ?, updated_at = CURRENT_TIMESTAMP WHERE neon_id = ?",
        )
        .bind(update.emailed)
        .bind(update.neon_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back earlier updates
            return Err(Error::NotFound(format!("member {}", update.neon_id)));
        }
        updated += result.rows_affected();
    }

    tx.commit().await?;
    Ok(updated)
}

/// Which members the zip map counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Inactive,
    #[default]
    All,
}

impl MemberStatus {
    fn active_flag(self) -> Option<bool> {
        match self {
            MemberStatus::Active => Some(true),
            MemberStatus::Inactive => Some(false),
            MemberStatus::All => None,
        }
    }
}

/// Member count for one zip code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ZipCount {
    pub zip_code: i64,
    pub members: i64,
}

/// Members per zip code, ascending by zip; members without a zip are left out
pub async fn zip_counts(pool: &SqlitePool, status: MemberStatus) -> Result<Vec<ZipCount>> {
    let active = status.active_flag();
    let counts = sqlx::query_as::<_, ZipCount>(
        r#"
        SELECT zip_code, COUNT(*) AS members
        FROM member
        WHERE zip_code IS NOT NULL
          AND (? IS NULL OR active = ?)
        GROUP BY zip_code
        ORDER BY zip_code
        "#,
    )
    .bind(active)
    .bind(active)
    .fetch_all(pool)
    .await?;

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use asmbly_common::db::init_memory_database;
    use asmbly_common::db::members::upsert_member_profile;
    use asmbly_common::db::models::MemberProfile;

    async fn seed(pool: &SqlitePool, neon_id: i64, first: &str, email: &str, risk: f64) {
        upsert_member_profile(
            pool,
            &MemberProfile {
                neon_id,
                first_name: Some(first.to_string()),
                last_name: Some("Smith".to_string()),
                email: Some(email.to_string()),
                zip_code: Some(78701),
                risk_score: risk,
                membership_duration: 4,
                active: true,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_search_matches_name_email_and_id() {
        let pool = init_memory_database().await.unwrap();
        seed(&pool, 101, "ada", "ADA@example.org", 0.2).await;
        seed(&pool, 202, "grace", "grace@example.org", 0.9).await;

        let by_name = RiskFilter {
            search: Some("ADA SM".to_string()),
            show_emailed: true,
        };
        assert_eq!(count_risk_rows(&pool, &by_name).await.unwrap(), 1);

        let by_email = RiskFilter {
            search: Some("grace@".to_string()),
            show_emailed: true,
        };
        let rows = list_risk_rows(&pool, &by_email, RiskSort::RiskScore, SortOrder::Desc, 15, 0)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].neon_id, 202);

        let by_id = RiskFilter {
            search: Some("101".to_string()),
            show_emailed: true,
        };
        assert_eq!(count_risk_rows(&pool, &by_id).await.unwrap(), 1);

        let blank = RiskFilter {
            search: Some("  ".to_string()),
            show_emailed: true,
        };
        assert_eq!(count_risk_rows(&pool, &blank).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_set_emailed_rolls_back_on_unknown_member() {
        let pool = init_memory_database().await.unwrap();
        seed(&pool, 101, "ada", "ada@example.org", 0.2).await;

        let updates = [
            EmailedUpdate { neon_id: 101, emailed: true },
            EmailedUpdate { neon_id: 999, emailed: true },
        ];
        let err = set_emailed(&pool, &updates).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let hidden = RiskFilter {
            search: None,
            show_emailed: false,
        };
        assert_eq!(count_risk_rows(&pool, &hidden).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_zip_counts_by_status() {
        let pool = init_memory_database().await.unwrap();
        seed(&pool, 101, "ada", "ada@example.org", 0.2).await;
        seed(&pool, 202, "grace", "grace@example.org", 0.9).await;
        sqlx::query("UPDATE member SET active = 0 WHERE neon_id = 202")
            .execute(&pool)
            .await
            .unwrap();

        let all = zip_counts(&pool, MemberStatus::All).await.unwrap();
        assert_eq!(all, vec![ZipCount { zip_code: 78701, members: 2 }]);

        let inactive = zip_counts(&pool, MemberStatus::Inactive).await.unwrap();
        assert_eq!(inactive, vec![ZipCount { zip_code: 78701, members: 1 }]);
    }
}
