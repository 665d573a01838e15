//! Daily reconciliation driver
//!
//! One run computes and stores the counts for a single reporting date:
//!
//! ```text
//! FETCH -> NORMALIZE -> CLASSIFY -> AGGREGATE -> PERSIST -> DONE
//! ```
//!
//! FETCH runs the active-member count, the account-signup count and the
//! candidate history download concurrently; the first failure aborts the
//! run before anything is written. PERSIST writes the day's record and the
//! member activity flips in one transaction, keyed by date and member id,
//! so running the same date again replaces rather than duplicates.

use crate::aggregate::{aggregate_day, DailyAggregate, PassThroughCounts};
use crate::crm::{AccountSearch, CrmError, CrmSource, RawMembership};
use crate::error::SyncResult;
use crate::membership::{classify, normalize_memberships, Classification};
use asmbly_common::db::{bulk_upsert_member_activity, upsert_daily_count, DailyCountRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt, TryStreamExt};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Stages of a reconciliation run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Fetch,
    Normalize,
    Classify,
    Aggregate,
    Persist,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStage::Fetch => "FETCH",
            RunStage::Normalize => "NORMALIZE",
            RunStage::Classify => "CLASSIFY",
            RunStage::Aggregate => "AGGREGATE",
            RunStage::Persist => "PERSIST",
            RunStage::Done => "DONE",
        };
        f.write_str(s)
    }
}

/// Where a finished day is written
#[async_trait]
pub trait DailyStore: Send + Sync {
    /// Write the day's record and activity updates atomically
    async fn persist_day(&self, day: &DailyAggregate) -> asmbly_common::Result<()>;
}

/// [`DailyStore`] over the SQLite tables
#[derive(Clone)]
pub struct SqliteDailyStore {
    pool: SqlitePool,
}

impl SqliteDailyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DailyStore for SqliteDailyStore {
    async fn persist_day(&self, day: &DailyAggregate) -> asmbly_common::Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_daily_count(&mut *tx, &day.record).await?;
        bulk_upsert_member_activity(&mut *tx, &day.activity).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// What a completed run did
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub report_date: NaiveDate,
    pub record: DailyCountRecord,
    /// Members whose histories were classified
    pub candidates: usize,
    /// Membership records skipped as malformed
    pub malformed_records: usize,
    pub activity_updates: usize,
}

/// Runs reconciliation for one date against a CRM and a store
pub struct ReconciliationDriver<C, S> {
    crm: Arc<C>,
    store: S,
    concurrency: usize,
}

impl<C, S> ReconciliationDriver<C, S>
where
    C: CrmSource,
    S: DailyStore,
{
    /// `concurrency` bounds the parallel history fetches
    pub fn new(crm: Arc<C>, store: S, concurrency: usize) -> Self {
        Self {
            crm,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Reconcile `report_date`, classifying histories relative to `today`
    /// (normally the day after `report_date`).
    pub async fn run(&self, report_date: NaiveDate, today: NaiveDate) -> SyncResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("daily_counts", run_id = %run_id, report_date = %report_date);
        self.run_stages(run_id, report_date, today)
            .instrument(span)
            .await
    }

    async fn run_stages(
        &self,
        run_id: Uuid,
        report_date: NaiveDate,
        today: NaiveDate,
    ) -> SyncResult<RunSummary> {
        enter(RunStage::Fetch);
        let active_search = AccountSearch::active_members();
        let signup_search = AccountSearch::account_signups(report_date);
        let (total_active, acct_signups, histories) = tokio::try_join!(
            self.crm.count_accounts(&active_search),
            self.crm.count_accounts(&signup_search),
            self.fetch_candidate_histories(report_date),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Fetch failed, nothing persisted");
            e
        })?;

        enter(RunStage::Normalize);
        let mut malformed_records = 0;
        let timelines: Vec<_> = histories
            .iter()
            .map(|(member_id, raw)| {
                let normalized = normalize_memberships(raw);
                for rejected in &normalized.rejected {
                    tracing::warn!(member_id, error = %rejected, "Skipping malformed membership");
                }
                malformed_records += normalized.rejected.len();
                (*member_id, normalized.timeline)
            })
            .collect();

        enter(RunStage::Classify);
        let classifications: Vec<Classification> = timelines
            .iter()
            .map(|(member_id, timeline)| classify(*member_id, timeline, today))
            .collect();

        enter(RunStage::Aggregate);
        let day = aggregate_day(
            report_date,
            &classifications,
            PassThroughCounts {
                total_active,
                acct_signups,
            },
        );

        enter(RunStage::Persist);
        self.store.persist_day(&day).await?;

        enter(RunStage::Done);
        let summary = RunSummary {
            run_id,
            report_date,
            record: day.record,
            candidates: classifications.len(),
            malformed_records,
            activity_updates: day.activity.len(),
        };
        tracing::info!(
            total_active = summary.record.total_active_count,
            acct_signups = summary.record.acct_signups_count,
            member_signups = summary.record.member_signups_count,
            churns = summary.record.churn_count,
            candidates = summary.candidates,
            malformed = summary.malformed_records,
            "Daily counts stored"
        );
        Ok(summary)
    }

    /// Full membership history of every account with a term starting or
    /// expiring on `date`, ordered by account id
    async fn fetch_candidate_histories(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<(i64, Vec<RawMembership>)>, CrmError> {
        let starts_search = AccountSearch::membership_starts(date);
        let expirations_search = AccountSearch::membership_expirations(date);
        let (starts, expirations) = tokio::try_join!(
            self.crm.search_accounts(&starts_search),
            self.crm.search_accounts(&expirations_search),
        )?;

        let candidates: BTreeSet<i64> = starts
            .iter()
            .chain(&expirations)
            .map(|row| row.account_id)
            .collect();
        tracing::info!(candidates = candidates.len(), "Fetching membership histories");

        let crm = &self.crm;
        let mut histories: Vec<(i64, Vec<RawMembership>)> = stream::iter(candidates)
            .map(|account_id| async move {
                crm.fetch_membership_history(account_id)
                    .await
                    .map(|history| (account_id, history))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        histories.sort_by_key(|(account_id, _)| *account_id);
        Ok(histories)
    }
}

fn enter(stage: RunStage) {
    tracing::info!(stage = %stage, "Entering stage");
}
