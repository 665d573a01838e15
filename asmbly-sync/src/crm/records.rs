//! CRM wire records
//!
//! Search results and list endpoints return loosely structured JSON. Each
//! item is parsed into a typed record here; anything missing a required key
//! becomes a [`MalformedRecord`] instead of a half-filled value.

use crate::crm::event_cache::EventInfo;
use crate::crm::MalformedRecord;
use asmbly_common::time::parse_iso_date;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;

/// Output field holding the account id in every search
pub const ACCOUNT_ID_FIELD: &str = "Account ID";

/// Registration status of an attendee whose registration went through
pub const REGISTRATION_SUCCEEDED: &str = "SUCCEEDED";

/// Integer id sent either as a JSON number or a numeric string
pub fn parse_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Amount sent either as a JSON number or a numeric string
pub fn parse_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_amount(&v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("fee is not a number: {}", v))),
    }
}

/// One row of an account search: the account id plus the requested output fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AccountRow {
    pub account_id: i64,
    fields: HashMap<String, String>,
}

impl AccountRow {
    pub fn new(account_id: i64) -> Self {
        Self {
            account_id,
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Parse one `searchResults` entry; `Account ID` is required
    pub fn from_json(value: &Value) -> Result<Self, MalformedRecord> {
        let object = value
            .as_object()
            .ok_or_else(|| MalformedRecord::invalid("search result", "row", "not an object"))?;

        let account_id = object
            .get(ACCOUNT_ID_FIELD)
            .ok_or_else(|| MalformedRecord::missing("search result", ACCOUNT_ID_FIELD))
            .and_then(|v| {
                parse_id(v).ok_or_else(|| MalformedRecord::invalid("search result", ACCOUNT_ID_FIELD, v))
            })?;

        let mut row = AccountRow::new(account_id);
        for (name, value) in object {
            if name == ACCOUNT_ID_FIELD {
                continue;
            }
            match value {
                Value::String(s) => {
                    row.fields.insert(name.clone(), s.clone());
                }
                Value::Number(n) => {
                    row.fields.insert(name.clone(), n.to_string());
                }
                Value::Bool(b) => {
                    row.fields.insert(name.clone(), b.to_string());
                }
                _ => {}
            }
        }
        Ok(row)
    }

    /// A non-blank output field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// One entry of `GET /v2/accounts/{id}/memberships`, before validation
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMembership {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub term_start_date: Option<String>,
    #[serde(default)]
    pub term_end_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub fee: Option<f64>,
    #[serde(default)]
    pub term_unit: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl RawMembership {
    pub fn new(start: &str, end: &str, fee: f64, term_unit: &str, status: &str) -> Self {
        Self {
            id: None,
            term_start_date: Some(start.to_string()),
            term_end_date: Some(end.to_string()),
            fee: Some(fee),
            term_unit: Some(term_unit.to_string()),
            status: Some(status.to_string()),
        }
    }

    /// Label used in logs and errors
    pub fn describe(&self) -> String {
        match self.id.as_ref().and_then(parse_id) {
            Some(id) => format!("membership {}", id),
            None => "membership".to_string(),
        }
    }
}

/// Event registration of one account whose attendee registration succeeded
#[derive(Debug, Clone, PartialEq)]
pub struct EventRegistration {
    pub event_id: i64,
    pub amount: f64,
    pub event: EventInfo,
}

/// Succeeded registration before the event is resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistrationRow {
    pub event_id: i64,
    pub amount: f64,
}

impl RegistrationRow {
    /// Parse one `eventRegistrations` entry.
    ///
    /// Returns `Ok(None)` for registrations that did not succeed.
    pub fn from_json(value: &Value) -> Result<Option<Self>, MalformedRecord> {
        let label = "event registration";
        let status = value
            .pointer("/tickets/0/attendees/0/registrationStatus")
            .and_then(Value::as_str)
            .ok_or_else(|| MalformedRecord::missing(label, "tickets[0].attendees[0].registrationStatus"))?;

        if status != REGISTRATION_SUCCEEDED {
            return Ok(None);
        }

        let event_id = value
            .get("eventId")
            .and_then(parse_id)
            .ok_or_else(|| MalformedRecord::missing(label, "eventId"))?;
        let amount = match value.get("registrationAmount") {
            None | Some(Value::Null) => 0.0,
            Some(v) => parse_amount(v)
                .ok_or_else(|| MalformedRecord::invalid(label, "registrationAmount", v))?,
        };

        Ok(Some(Self { event_id, amount }))
    }
}

/// One donation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Donation {
    pub date: NaiveDate,
    pub amount: f64,
}

impl Donation {
    pub fn from_json(value: &Value) -> Result<Self, MalformedRecord> {
        let label = "donation";
        let date = value
            .get("date")
            .and_then(Value::as_str)
            .ok_or_else(|| MalformedRecord::missing(label, "date"))
            .and_then(|s| {
                parse_iso_date(s).ok_or_else(|| MalformedRecord::invalid(label, "date", s))
            })?;
        let amount = value
            .get("amount")
            .ok_or_else(|| MalformedRecord::missing(label, "amount"))
            .and_then(|v| parse_amount(v).ok_or_else(|| MalformedRecord::invalid(label, "amount", v)))?;

        Ok(Self { date, amount })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_row_accepts_string_or_number_id() {
        let row = AccountRow::from_json(&json!({"Account ID": "1234", "Zip Code": "78701-1234"})).unwrap();
        assert_eq!(row.account_id, 1234);
        assert_eq!(row.field("Zip Code"), Some("78701-1234"));

        let row = AccountRow::from_json(&json!({"Account ID": 99, "Zip Code": "  "})).unwrap();
        assert_eq!(row.account_id, 99);
        assert_eq!(row.field("Zip Code"), None);
    }

    #[test]
    fn test_account_row_requires_id() {
        assert!(AccountRow::from_json(&json!({"Zip Code": "78701"})).is_err());
        assert!(AccountRow::from_json(&json!({"Account ID": "abc"})).is_err());
        assert!(AccountRow::from_json(&json!(["Account ID"])).is_err());
    }

    #[test]
    fn test_raw_membership_from_wire() {
        let raw: RawMembership = serde_json::from_value(json!({
            "id": "5512",
            "termStartDate": "2024-01-01",
            "termEndDate": "2024-01-31",
            "fee": "95.00",
            "termUnit": "MONTH",
            "status": "SUCCEEDED",
            "membershipLevel": {"name": "Regular Membership"}
        }))
        .unwrap();

        assert_eq!(raw.fee, Some(95.0));
        assert_eq!(raw.describe(), "membership 5512");

        let partial: RawMembership = serde_json::from_value(json!({"termStartDate": "2024-01-01"})).unwrap();
        assert_eq!(partial.fee, None);
        assert_eq!(partial.status, None);
    }

    #[test]
    fn test_registration_status_filter() {
        let ok = json!({
            "eventId": "77",
            "registrationAmount": 45,
            "tickets": [{"attendees": [{"registrationStatus": "SUCCEEDED"}]}]
        });
        assert_eq!(
            RegistrationRow::from_json(&ok).unwrap(),
            Some(RegistrationRow { event_id: 77, amount: 45.0 })
        );

        let canceled = json!({
            "eventId": "78",
            "tickets": [{"attendees": [{"registrationStatus": "CANCELED"}]}]
        });
        assert_eq!(RegistrationRow::from_json(&canceled).unwrap(), None);

        let no_tickets = json!({"eventId": "79", "tickets": []});
        assert!(RegistrationRow::from_json(&no_tickets).is_err());
    }

    #[test]
    fn test_donation_parse() {
        let d = Donation::from_json(&json!({"date": "2024-05-01", "amount": 25.5})).unwrap();
        assert_eq!(d.amount, 25.5);
        assert!(Donation::from_json(&json!({"amount": 25.5})).is_err());
    }
}
