//! Daily aggregation
//!
//! Reduces per-member classifications to the counts stored for one
//! reporting date, plus the member activity flips caused by that day's
//! events. Active-member and account-signup totals come straight from the
//! CRM and are passed through unchanged.

use crate::membership::Classification;
use asmbly_common::db::{DailyCountRecord, MemberActivity};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Counts taken directly from CRM searches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassThroughCounts {
    pub total_active: i64,
    pub acct_signups: i64,
}

/// Output of [`aggregate_day`]
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregate {
    pub record: DailyCountRecord,
    /// One entry per member with an event on the reporting date, by member id
    pub activity: Vec<MemberActivity>,
}

/// Build the record for `date` from every candidate member's classification.
///
/// A member who both churned and joined on `date` ends the day inactive.
pub fn aggregate_day(
    date: NaiveDate,
    classifications: &[Classification],
    counts: PassThroughCounts,
) -> DailyAggregate {
    let mut churn_count = 0i64;
    let mut member_signups_count = 0i64;
    let mut activity: BTreeMap<i64, bool> = BTreeMap::new();

    for c in classifications {
        let joins = c.joins_on(date);
        let churns = c.churns_on(date);
        member_signups_count += joins as i64;
        churn_count += churns as i64;

        if churns > 0 {
            activity.insert(c.member_id, false);
        } else if joins > 0 {
            activity.entry(c.member_id).or_insert(true);
        }
    }

    DailyAggregate {
        record: DailyCountRecord {
            date,
            total_active_count: counts.total_active,
            acct_signups_count: counts.acct_signups,
            member_signups_count,
            churn_count,
        },
        activity: activity
            .into_iter()
            .map(|(neon_id, active)| MemberActivity { neon_id, active })
            .collect(),
    }
}
