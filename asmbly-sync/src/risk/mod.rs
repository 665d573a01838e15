//! Churn-risk scoring job
//!
//! Scores every established active member and upserts their profile. Each
//! member's account, memberships, registrations and donations are fetched
//! concurrently; members are processed with bounded parallelism and share
//! one run-scoped event cache.

pub mod features;
pub mod model;

pub use features::{ClassKind, MemberFeatures};
pub use model::{LinearRiskModel, RiskModel};

use crate::crm::event_cache::CacheStats;
use crate::crm::search::MEMBERSHIP_STATUS_FIELD;
use crate::crm::{AccountDetailSource, AccountRow, AccountSearch, CrmError, EventCache};
use crate::error::SyncResult;
use crate::membership::normalize_memberships;
use crate::zip::parse_zip_prefix;
use asmbly_common::config::SyncConfig;
use asmbly_common::db::{upsert_member_profile, MemberProfile};
use chrono::{Duration, NaiveDate};
use futures::stream::{self, StreamExt, TryStreamExt};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Account status meaning the member currently holds a membership
const STATUS_ACTIVE: &str = "Active";

/// Outcome of a scoring run
#[derive(Debug, Clone, PartialEq)]
pub struct RiskSummary {
    pub run_id: Uuid,
    pub candidates: usize,
    pub scored: usize,
    /// Members skipped because a CRM record was malformed
    pub skipped: usize,
    pub event_cache: CacheStats,
}

/// Scores members and writes their profiles
pub struct RiskJob<C> {
    crm: Arc<C>,
    model: Arc<dyn RiskModel>,
    pool: SqlitePool,
    concurrency: usize,
    event_cache_capacity: usize,
    min_tenure_days: i64,
}

impl<C: AccountDetailSource> RiskJob<C> {
    pub fn new(crm: Arc<C>, model: Arc<dyn RiskModel>, pool: SqlitePool, config: &SyncConfig) -> Self {
        Self {
            crm,
            model,
            pool,
            concurrency: config.concurrency.max(1),
            event_cache_capacity: config.event_cache_capacity,
            min_tenure_days: config.min_tenure_days,
        }
    }

    pub async fn run(&self, today: NaiveDate) -> SyncResult<RiskSummary> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("risk_scores", run_id = %run_id, today = %today);
        self.run_inner(run_id, today).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, today: NaiveDate) -> SyncResult<RiskSummary> {
        let cutoff = today - Duration::days(self.min_tenure_days);
        let rows = self
            .crm
            .search_accounts(&AccountSearch::risk_candidates(cutoff))
            .await?;
        tracing::info!(candidates = rows.len(), cutoff = %cutoff, "Scoring members");

        let cache = EventCache::new(self.event_cache_capacity);
        let cache = &cache;
        let outcomes: Vec<bool> = stream::iter(&rows)
            .map(|row| async move { self.score_member(row, cache, today).await })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let scored = outcomes.iter().filter(|s| **s).count();
        let summary = RiskSummary {
            run_id,
            candidates: rows.len(),
            scored,
            skipped: outcomes.len() - scored,
            event_cache: cache.stats(),
        };
        tracing::info!(
            scored = summary.scored,
            skipped = summary.skipped,
            cache_hits = summary.event_cache.hits,
            cache_misses = summary.event_cache.misses,
            "Risk scores updated"
        );
        Ok(summary)
    }

    /// Returns `false` when the member was skipped
    async fn score_member(&self, row: &AccountRow, cache: &EventCache, today: NaiveDate) -> SyncResult<bool> {
        let account_id = row.account_id;
        let fetched = tokio::try_join!(
            self.crm.fetch_account(account_id),
            self.crm.fetch_membership_history(account_id),
            self.crm.fetch_event_registrations(account_id, cache),
            self.crm.fetch_donations(account_id),
        );
        let (account, raw_memberships, registrations, donations) = match fetched {
            Ok(fetched) => fetched,
            Err(CrmError::MalformedRecord(e)) => {
                tracing::warn!(account_id, error = %e, "Skipping member with malformed record");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let normalized = normalize_memberships(&raw_memberships);
        for rejected in &normalized.rejected {
            tracing::warn!(account_id, error = %rejected, "Skipping malformed membership");
        }

        let features = MemberFeatures::build(
            &account,
            &normalized.timeline,
            &registrations,
            &donations,
            today,
        );
        let risk_score = self.model.predict_risk(&features);

        let profile = MemberProfile {
            neon_id: account_id,
            zip_code: account.zip_code().and_then(parse_zip_prefix),
            first_name: account.first_name,
            last_name: account.last_name,
            email: account.email,
            risk_score,
            membership_duration: normalized.timeline.duration_months(),
            active: row.field(MEMBERSHIP_STATUS_FIELD) == Some(STATUS_ACTIVE),
        };
        upsert_member_profile(&self.pool, &profile).await?;

        tracing::debug!(account_id, risk_score, "Member scored");
        Ok(true)
    }
}
