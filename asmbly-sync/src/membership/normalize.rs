//! Membership period normalizer
//!
//! Turns the raw membership records of one member into a [`MemberTimeline`].
//! Each record is parsed on its own: a record missing a required key, or with
//! a value that does not parse, is reported as a [`MalformedRecord`] and left
//! out; the rest of the history still goes through.

use crate::crm::{MalformedRecord, RawMembership};
use crate::membership::period::{MemberTimeline, MembershipPeriod, MembershipStatus, MembershipType};
use asmbly_common::time::parse_iso_date;

/// Result of normalizing one member's history
#[derive(Debug, Default)]
pub struct NormalizedHistory {
    pub timeline: MemberTimeline,
    /// Records that could not be parsed, in input order
    pub rejected: Vec<MalformedRecord>,
}

/// Parse one raw record into a typed period
pub fn parse_period(raw: &RawMembership) -> Result<MembershipPeriod, MalformedRecord> {
    let start_text = required(raw, "termStartDate", raw.term_start_date.as_deref())?;
    let end_text = required(raw, "termEndDate", raw.term_end_date.as_deref())?;
    let unit_text = required(raw, "termUnit", raw.term_unit.as_deref())?;
    let status_text = required(raw, "status", raw.status.as_deref())?;
    let price = raw
        .fee
        .ok_or_else(|| MalformedRecord::missing(raw.describe(), "fee"))?;

    let start_date = parse_iso_date(start_text).ok_or_else(|| {
        MalformedRecord::invalid(raw.describe(), "termStartDate", "expected YYYY-MM-DD")
    })?;
    let end_date = parse_iso_date(end_text).ok_or_else(|| {
        MalformedRecord::invalid(raw.describe(), "termEndDate", "expected YYYY-MM-DD")
    })?;
    let kind: MembershipType = unit_text
        .parse()
        .map_err(|e| MalformedRecord::invalid(raw.describe(), "termUnit", e))?;
    let status: MembershipStatus = status_text
        .parse()
        .map_err(|e| MalformedRecord::invalid(raw.describe(), "status", e))?;

    if !price.is_finite() {
        return Err(MalformedRecord::invalid(raw.describe(), "fee", "not a finite number"));
    }
    if end_date < start_date {
        return Err(MalformedRecord::invalid(
            raw.describe(),
            "termEndDate",
            format!("{} is before start {}", end_date, start_date),
        ));
    }

    Ok(MembershipPeriod {
        start_date,
        end_date,
        kind,
        price,
        status,
    })
}

fn required<'a>(
    raw: &RawMembership,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, MalformedRecord> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MalformedRecord::missing(raw.describe(), field))
}

/// Normalize a member's raw membership records.
///
/// Keeps succeeded periods with a positive price, sorted by start date, with
/// identical `(start, end)` terms collapsed to one.
pub fn normalize_memberships(raw: &[RawMembership]) -> NormalizedHistory {
    let mut periods = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();

    for record in raw {
        match parse_period(record) {
            Ok(period) => periods.push(period),
            Err(e) => rejected.push(e),
        }
    }

    NormalizedHistory {
        timeline: MemberTimeline::from_periods(periods),
        rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parses_complete_record() {
        let raw = RawMembership::new("2024-01-01", "2024-01-31", 95.0, "MONTH", "SUCCEEDED");
        let period = parse_period(&raw).unwrap();

        assert_eq!(period.start_date, date(2024, 1, 1));
        assert_eq!(period.end_date, date(2024, 1, 31));
        assert_eq!(period.kind, MembershipType::Monthly);
        assert_eq!(period.status, MembershipStatus::Succeeded);
        assert!(period.qualifies());
    }

    #[test]
    fn test_missing_fee_is_malformed() {
        let mut raw = RawMembership::new("2024-01-01", "2024-01-31", 95.0, "MONTH", "SUCCEEDED");
        raw.fee = None;

        let err = parse_period(&raw).unwrap_err();
        assert!(err.to_string().contains("fee"), "{}", err);
    }

    #[test]
    fn test_bad_values_are_malformed() {
        let bad_date = RawMembership::new("01/01/2024", "2024-01-31", 95.0, "MONTH", "SUCCEEDED");
        assert!(parse_period(&bad_date).is_err());

        let bad_unit = RawMembership::new("2024-01-01", "2024-01-31", 95.0, "DAY", "SUCCEEDED");
        assert!(parse_period(&bad_unit).is_err());

        let reversed = RawMembership::new("2024-02-01", "2024-01-31", 95.0, "MONTH", "SUCCEEDED");
        assert!(parse_period(&reversed).is_err());

        let blank = RawMembership::new(" ", "2024-01-31", 95.0, "MONTH", "SUCCEEDED");
        assert!(parse_period(&blank).is_err());
    }

    #[test]
    fn test_normalize_skips_malformed_and_keeps_rest() {
        let raw = vec![
            RawMembership::new("2024-03-01", "2024-03-31", 95.0, "MONTH", "SUCCEEDED"),
            RawMembership::new("not-a-date", "2024-02-29", 95.0, "MONTH", "SUCCEEDED"),
            RawMembership::new("2024-01-01", "2024-01-31", 95.0, "MONTH", "SUCCEEDED"),
            RawMembership::new("2024-02-01", "2024-02-29", 95.0, "MONTH", "FAILED"),
            RawMembership::new("2024-04-01", "2024-04-30", 0.0, "MONTH", "SUCCEEDED"),
        ];

        let normalized = normalize_memberships(&raw);

        assert_eq!(normalized.rejected.len(), 1);
        let starts: Vec<_> = normalized
            .timeline
            .periods()
            .iter()
            .map(|p| p.start_date)
            .collect();
        assert_eq!(starts, vec![date(2024, 1, 1), date(2024, 3, 1)]);
    }

    #[test]
    fn test_normalize_empty_history() {
        let normalized = normalize_memberships(&[]);
        assert!(normalized.timeline.is_empty());
        assert!(normalized.rejected.is_empty());
    }
}
