//! Account search requests
//!
//! Typed builders for the `POST /v2/accounts/search` body. Each job's
//! filter set lives here so the field names Neon expects are spelled in
//! one place.

use crate::crm::records::ACCOUNT_ID_FIELD;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

/// Comparison operators accepted by the search endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equal,
    NotEqual,
    Blank,
    NotBlank,
    LessThan,
    GreaterThan,
    LessAndEqual,
    GreaterAndEqual,
    InRange,
    NotInRange,
    Contain,
}

/// One search condition: `value` for scalar operators, `valueList` for ranges
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchField {
    pub field: String,
    pub operator: Operator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(rename = "valueList", skip_serializing_if = "Option::is_none")]
    pub value_list: Option<Vec<Value>>,
}

impl SearchField {
    pub fn new(field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value: Some(value.into()),
            value_list: None,
        }
    }

    pub fn equal(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Equal, value)
    }

    pub fn in_range(field: &str, values: Vec<Value>) -> Self {
        Self {
            field: field.to_string(),
            operator: Operator::InRange,
            value: None,
            value_list: Some(values),
        }
    }
}

fn date_value(date: NaiveDate) -> Value {
    Value::String(date.format("%Y-%m-%d").to_string())
}

/// Conditions shared by the account searches
pub mod filters {
    use super::*;

    pub fn individual() -> SearchField {
        SearchField::equal("Account Type", "Individual")
    }

    pub fn currently_active() -> SearchField {
        SearchField::equal("Account Current Membership Status", "Active")
    }

    pub fn regular_membership() -> SearchField {
        SearchField::equal("Membership Level", "Regular Membership")
    }

    pub fn membership_succeeded() -> SearchField {
        SearchField::equal("Membership Transaction Status", "Succeeded")
    }

    pub fn paid_membership() -> SearchField {
        SearchField::new("Membership Cost", Operator::GreaterThan, 0)
    }

    pub fn most_recent_membership_only() -> SearchField {
        SearchField::equal("Most Recent Membership Only", "Yes")
    }

    pub fn created_on(date: NaiveDate) -> SearchField {
        SearchField::equal("Account Created Date", date_value(date))
    }

    pub fn membership_starts_on(date: NaiveDate) -> SearchField {
        SearchField::equal("Membership Start Date", date_value(date))
    }

    pub fn membership_expires_on(date: NaiveDate) -> SearchField {
        SearchField::equal("Membership Expiration Date", date_value(date))
    }

    pub fn first_enrolled_before(date: NaiveDate) -> SearchField {
        SearchField::new("First Membership Enrollment Date", Operator::LessThan, date_value(date))
    }

    pub fn account_ids(ids: &[i64]) -> SearchField {
        SearchField::in_range(
            super::ACCOUNT_ID_FIELD,
            ids.iter().map(|id| Value::String(id.to_string())).collect(),
        )
    }
}

/// Search conditions plus the columns to return
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSearch {
    pub search_fields: Vec<SearchField>,
    pub output_fields: Vec<String>,
}

impl AccountSearch {
    pub fn new(search_fields: Vec<SearchField>) -> Self {
        Self {
            search_fields,
            output_fields: vec![ACCOUNT_ID_FIELD.to_string()],
        }
    }

    pub fn with_output(mut self, field: &str) -> Self {
        self.output_fields.push(field.to_string());
        self
    }

    /// Individual accounts currently holding a paid regular membership
    pub fn active_members() -> Self {
        Self::new(vec![
            filters::individual(),
            filters::currently_active(),
            filters::regular_membership(),
            filters::membership_succeeded(),
            filters::paid_membership(),
            filters::most_recent_membership_only(),
        ])
    }

    /// Individual accounts created on `date`
    pub fn account_signups(date: NaiveDate) -> Self {
        Self::new(vec![filters::individual(), filters::created_on(date)])
    }

    /// Accounts with a succeeded paid membership starting on `date`
    pub fn membership_starts(date: NaiveDate) -> Self {
        Self::new(vec![
            filters::individual(),
            filters::membership_succeeded(),
            filters::paid_membership(),
            filters::membership_starts_on(date),
        ])
    }

    /// Accounts with a succeeded paid membership expiring on `date`
    pub fn membership_expirations(date: NaiveDate) -> Self {
        Self::new(vec![
            filters::individual(),
            filters::membership_succeeded(),
            filters::paid_membership(),
            filters::membership_expires_on(date),
        ])
    }

    /// Active members first enrolled before `cutoff`, for risk scoring
    pub fn risk_candidates(cutoff: NaiveDate) -> Self {
        let mut search = Self::active_members();
        search.search_fields.push(filters::first_enrolled_before(cutoff));
        search.with_output(MEMBERSHIP_STATUS_FIELD)
    }

    /// Zip codes of the given accounts
    pub fn zip_codes(ids: &[i64]) -> Self {
        Self::new(vec![filters::account_ids(ids)]).with_output(ZIP_CODE_FIELD)
    }
}

/// Output field with the account's current membership status
pub const MEMBERSHIP_STATUS_FIELD: &str = "Account Current Membership Status";
/// Output field with the primary address zip code
pub const ZIP_CODE_FIELD: &str = "Zip Code";
