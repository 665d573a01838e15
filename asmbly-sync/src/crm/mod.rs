//! Neon CRM access
//!
//! Jobs talk to the CRM through the [`CrmSource`] and [`AccountDetailSource`]
//! traits; [`NeonClient`] implements both over the REST API, and tests
//! substitute in-memory fakes.

pub mod account;
pub mod client;
pub mod event_cache;
pub mod records;
pub mod retry;
pub mod search;

pub use account::AccountDetail;
pub use client::NeonClient;
pub use event_cache::{EventCache, EventInfo};
pub use records::{AccountRow, Donation, EventRegistration, RawMembership};
pub use retry::RetryPolicy;
pub use search::{AccountSearch, Operator, SearchField};

use async_trait::async_trait;
use std::fmt::Display;
use thiserror::Error;

/// CRM client errors
#[derive(Debug, Error)]
pub enum CrmError {
    /// 429/502 that persisted through every retry
    #[error("CRM returned {status} after {attempts} attempts")]
    Transient { status: u16, attempts: u32 },

    #[error("CRM API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    MalformedRecord(#[from] MalformedRecord),
}

impl CrmError {
    /// Upstream asked us to back off or was briefly unavailable
    pub fn is_transient(&self) -> bool {
        matches!(self, CrmError::Status { status, .. } if *status == 429 || *status == 502)
    }
}

/// A CRM record that is missing a required key or holds an unusable value
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Malformed {record}: {reason}")]
pub struct MalformedRecord {
    /// Which record, e.g. `membership 1234`
    pub record: String,
    pub reason: String,
}

impl MalformedRecord {
    pub fn missing(record: impl Into<String>, field: &str) -> Self {
        Self {
            record: record.into(),
            reason: format!("missing {}", field),
        }
    }

    pub fn invalid(record: impl Into<String>, field: &str, detail: impl Display) -> Self {
        Self {
            record: record.into(),
            reason: format!("invalid {}: {}", field, detail),
        }
    }
}

/// Account searches and membership histories
#[async_trait]
pub trait CrmSource: Send + Sync {
    /// Every row matching `search`, across all result pages
    async fn search_accounts(&self, search: &AccountSearch) -> Result<Vec<AccountRow>, CrmError>;

    /// Number of accounts matching `search`, malformed rows included
    async fn count_accounts(&self, search: &AccountSearch) -> Result<i64, CrmError> {
        Ok(self.search_accounts(search).await?.len() as i64)
    }

    /// Complete membership history of one account, oldest first
    async fn fetch_membership_history(&self, account_id: i64)
        -> Result<Vec<RawMembership>, CrmError>;
}

/// Per-account detail needed for risk scoring
#[async_trait]
pub trait AccountDetailSource: CrmSource {
    async fn fetch_account(&self, account_id: i64) -> Result<AccountDetail, CrmError>;

    /// Succeeded event registrations, with event metadata resolved through `cache`
    async fn fetch_event_registrations(
        &self,
        account_id: i64,
        cache: &EventCache,
    ) -> Result<Vec<EventRegistration>, CrmError>;

    async fn fetch_donations(&self, account_id: i64) -> Result<Vec<Donation>, CrmError>;
}
