//! In-memory CRM
//!
//! Answers account searches from stored membership histories the way the
//! real search endpoint filters them, so jobs can run end to end without HTTP.

use asmbly_sync::crm::search::{MEMBERSHIP_STATUS_FIELD, ZIP_CODE_FIELD};
use asmbly_sync::crm::{
    AccountDetail, AccountDetailSource, AccountRow, AccountSearch, CrmError, CrmSource, Donation,
    EventCache, EventRegistration, RawMembership,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct FakeCrm {
    /// Rows returned for the active-member count
    pub active_count: usize,
    /// Account id -> `YYYY-MM-DD` creation date
    pub created: BTreeMap<i64, String>,
    pub histories: BTreeMap<i64, Vec<RawMembership>>,
    /// Account detail documents as returned by `GET /v2/accounts/{id}`
    pub accounts: BTreeMap<i64, Value>,
    /// Account id -> current membership status
    pub statuses: BTreeMap<i64, String>,
    pub registrations: BTreeMap<i64, Vec<EventRegistration>>,
    pub donations: BTreeMap<i64, Vec<Donation>>,
    pub zips: BTreeMap<i64, String>,
    /// History fetches for these accounts fail with a 502 that outlived retries
    pub failing_histories: HashSet<i64>,
    pub history_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl FakeCrm {
    pub fn with_history(mut self, account_id: i64, periods: &[(&str, &str)]) -> Self {
        let raw = periods
            .iter()
            .map(|(start, end)| RawMembership::new(start, end, 95.0, "MONTH", "SUCCEEDED"))
            .collect();
        self.histories.insert(account_id, raw);
        self
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn qualifying_terms(&self) -> impl Iterator<Item = (i64, &RawMembership)> {
        self.histories.iter().flat_map(|(id, history)| {
            history
                .iter()
                .filter(|m| m.status.as_deref() == Some("SUCCEEDED") && m.fee.unwrap_or(0.0) > 0.0)
                .map(move |m| (*id, m))
        })
    }

    fn accounts_where(&self, pred: impl Fn(&RawMembership) -> bool) -> Vec<AccountRow> {
        let ids: std::collections::BTreeSet<i64> = self
            .qualifying_terms()
            .filter(|(_, m)| pred(m))
            .map(|(id, _)| id)
            .collect();
        ids.into_iter().map(AccountRow::new).collect()
    }
}

fn condition<'a>(search: &'a AccountSearch, field: &str) -> Option<&'a Value> {
    search
        .search_fields
        .iter()
        .find(|f| f.field == field)
        .and_then(|f| f.value.as_ref())
}

#[async_trait]
impl CrmSource for FakeCrm {
    async fn search_accounts(&self, search: &AccountSearch) -> Result<Vec<AccountRow>, CrmError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(Value::String(day)) = condition(search, "Membership Start Date") {
            return Ok(self.accounts_where(|m| m.term_start_date.as_deref() == Some(day.as_str())));
        }
        if let Some(Value::String(day)) = condition(search, "Membership Expiration Date") {
            return Ok(self.accounts_where(|m| m.term_end_date.as_deref() == Some(day.as_str())));
        }
        if let Some(Value::String(day)) = condition(search, "Account Created Date") {
            return Ok(self
                .created
                .iter()
                .filter(|(_, created)| *created == day)
                .map(|(id, _)| AccountRow::new(*id))
                .collect());
        }
        if condition(search, "First Membership Enrollment Date").is_some() {
            return Ok(self
                .statuses
                .iter()
                .map(|(id, status)| AccountRow::new(*id).with_field(MEMBERSHIP_STATUS_FIELD, status.clone()))
                .collect());
        }
        if let Some(ids) = search
            .search_fields
            .iter()
            .find(|f| f.field == "Account ID")
            .and_then(|f| f.value_list.as_ref())
        {
            return Ok(ids
                .iter()
                .filter_map(|v| v.as_str()?.parse::<i64>().ok())
                .filter_map(|id| {
                    let zip = self.zips.get(&id)?;
                    Some(AccountRow::new(id).with_field(ZIP_CODE_FIELD, zip.clone()))
                })
                .collect());
        }

        Ok((1..=self.active_count as i64).map(AccountRow::new).collect())
    }

    async fn fetch_membership_history(
        &self,
        account_id: i64,
    ) -> Result<Vec<RawMembership>, CrmError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_histories.contains(&account_id) {
            return Err(CrmError::Transient {
                status: 502,
                attempts: 10,
            });
        }
        Ok(self.histories.get(&account_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl AccountDetailSource for FakeCrm {
    async fn fetch_account(&self, account_id: i64) -> Result<AccountDetail, CrmError> {
        let doc = self.accounts.get(&account_id).cloned().unwrap_or(Value::Null);
        Ok(AccountDetail::from_json(account_id, &doc)?)
    }

    async fn fetch_event_registrations(
        &self,
        account_id: i64,
        cache: &EventCache,
    ) -> Result<Vec<EventRegistration>, CrmError> {
        let registrations = self.registrations.get(&account_id).cloned().unwrap_or_default();
        for r in &registrations {
            if cache.get(r.event_id).is_none() {
                cache.insert(r.event_id, r.event.clone());
            }
        }
        Ok(registrations)
    }

    async fn fetch_donations(&self, account_id: i64) -> Result<Vec<Donation>, CrmError> {
        Ok(self.donations.get(&account_id).cloned().unwrap_or_default())
    }
}
