//! Typed membership periods
//!
//! A [`MembershipPeriod`] is one CRM membership term after parsing. Only
//! succeeded, paid periods take part in churn/join classification; the rest
//! are kept around long enough to be filtered by the normalizer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Billing cadence of a membership term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MembershipType {
    Monthly,
    Annual,
}

impl MembershipType {
    /// Months credited towards membership duration
    pub fn months(self) -> i64 {
        match self {
            MembershipType::Monthly => 1,
            MembershipType::Annual => 12,
        }
    }
}

impl FromStr for MembershipType {
    type Err = String;

    /// Parses the CRM `termUnit` value
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MONTH" => Ok(MembershipType::Monthly),
            "YEAR" => Ok(MembershipType::Annual),
            other => Err(format!("unknown term unit '{}'", other)),
        }
    }
}

/// Transaction status of a membership term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MembershipStatus {
    Succeeded,
    Canceled,
    Refunded,
    Failed,
    Deferred,
    Pending,
}

impl FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCEEDED" => Ok(MembershipStatus::Succeeded),
            "CANCELED" => Ok(MembershipStatus::Canceled),
            "REFUNDED" => Ok(MembershipStatus::Refunded),
            "FAILED" => Ok(MembershipStatus::Failed),
            "DEFERRED" => Ok(MembershipStatus::Deferred),
            "PENDING" => Ok(MembershipStatus::Pending),
            other => Err(format!("unknown membership status '{}'", other)),
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MembershipStatus::Succeeded => "SUCCEEDED",
            MembershipStatus::Canceled => "CANCELED",
            MembershipStatus::Refunded => "REFUNDED",
            MembershipStatus::Failed => "FAILED",
            MembershipStatus::Deferred => "DEFERRED",
            MembershipStatus::Pending => "PENDING",
        };
        f.write_str(s)
    }
}

/// One membership term, `start_date..=end_date`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub kind: MembershipType,
    pub price: f64,
    pub status: MembershipStatus,
}

impl MembershipPeriod {
    /// Succeeded and paid: the only periods that count as membership
    pub fn qualifies(&self) -> bool {
        self.status == MembershipStatus::Succeeded && self.price > 0.0
    }
}

/// Qualifying periods of one member, ordered by start date (ties by end date)
/// with duplicate terms removed.
///
/// Built by [`crate::membership::normalize_memberships`]; an empty timeline
/// means the member never held a paid membership.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberTimeline {
    periods: Vec<MembershipPeriod>,
}

impl MemberTimeline {
    /// Sort, drop non-qualifying periods and collapse identical terms
    pub fn from_periods(mut periods: Vec<MembershipPeriod>) -> Self {
        periods.retain(MembershipPeriod::qualifies);
        periods.sort_by(|a, b| {
            a.start_date
                .cmp(&b.start_date)
                .then(a.end_date.cmp(&b.end_date))
        });
        periods.dedup_by(|b, a| a.start_date == b.start_date && a.end_date == b.end_date);
        Self { periods }
    }

    pub fn periods(&self) -> &[MembershipPeriod] {
        &self.periods
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// First day of paid membership
    pub fn first_start(&self) -> Option<NaiveDate> {
        self.periods.first().map(|p| p.start_date)
    }

    /// Any paid annual term on record
    pub fn has_annual(&self) -> bool {
        self.periods.iter().any(|p| p.kind == MembershipType::Annual)
    }

    /// Total months of paid membership
    pub fn duration_months(&self) -> i64 {
        self.periods.iter().map(|p| p.kind.months()).sum()
    }

    /// Sum of all membership fees paid
    pub fn total_fees(&self) -> f64 {
        self.periods.iter().map(|p| p.price).sum()
    }
}
