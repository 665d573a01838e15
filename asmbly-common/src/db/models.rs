//! Database models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Aggregate counts for one calendar day (`membership_count` row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyCountRecord {
    pub date: NaiveDate,
    pub total_active_count: i64,
    pub acct_signups_count: i64,
    pub member_signups_count: i64,
    pub churn_count: i64,
}

impl DailyCountRecord {
    /// All counts zero
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_active_count: 0,
            acct_signups_count: 0,
            member_signups_count: 0,
            churn_count: 0,
        }
    }
}

/// Persisted member projection (`member` row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberRecord {
    pub neon_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub zip_code: Option<i64>,
    pub risk_score: Option<f64>,
    pub membership_duration: i64,
    pub emailed: bool,
    pub active: bool,
}

/// Partial member update produced by daily churn/join classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberActivity {
    pub neon_id: i64,
    pub active: bool,
}

/// Member fields written by the risk-score job (everything but `emailed`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub neon_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub zip_code: Option<i64>,
    pub risk_score: f64,
    pub membership_duration: i64,
    pub active: bool,
}

/// Zip code refresh for an existing member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipUpdate {
    pub neon_id: i64,
    pub zip_code: i64,
}
