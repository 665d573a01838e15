//! Interval classifier
//!
//! Walks a member's timeline and marks where membership began and lapsed.
//! The gap between two periods is the number of uncovered days between
//! them: Jan 31 to Feb 2 leaves one (Feb 1). A gap of at most
//! [`GAP_TOLERANCE_DAYS`] is one continuous membership; a longer gap is a
//! churn at the end of the earlier period followed by a join at the start
//! of the later one. The
//! first period is always a join, and a final period that ended before
//! `today` is a churn.
//!
//! Classification is a pure function of the whole history, so re-running it
//! for the same data and `today` yields the same events.

use crate::membership::period::MemberTimeline;
use chrono::NaiveDate;
use serde::Serialize;

/// Most uncovered days between two periods still treated as continuous
pub const GAP_TOLERANCE_DAYS: i64 = 1;

/// A membership lapse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChurnEvent {
    pub member_id: i64,
    pub churn_date: NaiveDate,
}

/// The start of a membership, or of a rejoin after a lapse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct JoinEvent {
    pub member_id: i64,
    pub join_date: NaiveDate,
}

/// Every churn and join of one member, each in chronological order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub member_id: i64,
    pub joins: Vec<JoinEvent>,
    pub churns: Vec<ChurnEvent>,
}

impl Classification {
    pub fn joins_on(&self, date: NaiveDate) -> usize {
        self.joins.iter().filter(|j| j.join_date == date).count()
    }

    pub fn churns_on(&self, date: NaiveDate) -> usize {
        self.churns.iter().filter(|c| c.churn_date == date).count()
    }
}

/// Classify the timeline of `member_id` relative to `today`.
///
/// Overlapping periods never produce a lapse: the gap is measured from the
/// furthest end date covered so far, not from the previous period alone.
pub fn classify(member_id: i64, timeline: &MemberTimeline, today: NaiveDate) -> Classification {
    let mut result = Classification {
        member_id,
        ..Default::default()
    };

    let periods = timeline.periods();
    let Some(first) = periods.first() else {
        return result;
    };

    result.joins.push(JoinEvent {
        member_id,
        join_date: first.start_date,
    });

    let mut covered_until = first.end_date;
    for next in &periods[1..] {
        let gap = uncovered_days(covered_until, next.start_date);
        if gap > GAP_TOLERANCE_DAYS {
            result.churns.push(ChurnEvent {
                member_id,
                churn_date: covered_until,
            });
            result.joins.push(JoinEvent {
                member_id,
                join_date: next.start_date,
            });
        }
        covered_until = covered_until.max(next.end_date);
    }

    if covered_until < today {
        result.churns.push(ChurnEvent {
            member_id,
            churn_date: covered_until,
        });
    }

    result
}

/// Days strictly between `covered_until` and `next_start`; zero or less
/// when the periods touch or overlap
fn uncovered_days(covered_until: NaiveDate, next_start: NaiveDate) -> i64 {
    (next_start - covered_until).num_days() - 1
}
