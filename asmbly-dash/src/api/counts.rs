//! Daily count endpoints
//!
//! Dates are `YYYY-MM-DD`. Ranges default to the 90 days ending yesterday.

use axum::{
    extract::{Query, State},
    Json,
};
use asmbly_common::db::counts::{get_daily_count, list_daily_counts};
use asmbly_common::db::models::DailyCountRecord;
use asmbly_common::time::{parse_iso_date, reporting_date, today};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{ApiError, ApiResult, AppState};

/// Days shown when no start date is given
pub const DEFAULT_RANGE_DAYS: i64 = 90;

/// Rolling-average windows the dashboard offers (1 = raw counts)
pub const ROLLING_WINDOWS: [i64; 5] = [1, 7, 14, 30, 90];

/// Default rolling-average window
pub const DEFAULT_WINDOW: i64 = 14;

/// Baselines the active-member summary compares against
pub const SUMMARY_OFFSETS_DAYS: [i64; 2] = [30, 365];

/// Query parameters for date-ranged endpoints
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub window: Option<i64>,
}

fn parse_date_param(name: &str, value: Option<&str>) -> ApiResult<Option<NaiveDate>> {
    match value {
        None => Ok(None),
        Some(s) => parse_iso_date(s).map(Some).ok_or_else(|| {
            ApiError::BadRequest(format!("{} must be YYYY-MM-DD, got '{}'", name, s))
        }),
    }
}

/// `days` before `date`, or 400 when that falls outside the calendar
fn days_before(date: NaiveDate, days: i64) -> ApiResult<NaiveDate> {
    date.checked_sub_signed(Duration::days(days))
        .ok_or_else(|| ApiError::BadRequest(format!("date out of range: {} minus {} days", date, days)))
}

/// Resolve `start`/`end`, applying defaults relative to `today`
pub fn resolve_range(query: &RangeQuery, today: NaiveDate) -> ApiResult<(NaiveDate, NaiveDate)> {
    let end = parse_date_param("end", query.end.as_deref())?.unwrap_or_else(|| reporting_date(today));
    let start = match parse_date_param("start", query.start.as_deref())? {
        Some(start) => start,
        None => days_before(end, DEFAULT_RANGE_DAYS)?,
    };

    if start > end {
        return Err(ApiError::BadRequest(format!(
            "start ({}) is after end ({})",
            start, end
        )));
    }

    Ok((start, end))
}

/// Response for GET /api/counts
#[derive(Debug, Serialize)]
pub struct CountsResponse {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub counts: Vec<DailyCountRecord>,
}

/// GET /api/counts
///
/// Stored daily rows in the range, newest first. Days without a row are
/// absent rather than zero-filled.
pub async fn list_counts(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<CountsResponse>> {
    let (start, end) = resolve_range(&query, today())?;
    let counts = list_daily_counts(&state.db, start, end).await?;

    Ok(Json(CountsResponse { start, end, counts }))
}

/// Query parameters for GET /api/counts/summary
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub as_of: Option<String>,
}

/// Active count compared with an earlier day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveComparison {
    pub days: i64,
    pub date: NaiveDate,
    pub total_active_count: Option<i64>,
    pub change: Option<i64>,
    pub percent_change: Option<f64>,
}

/// Response for GET /api/counts/summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResponse {
    pub as_of: NaiveDate,
    pub total_active_count: Option<i64>,
    pub comparisons: Vec<ActiveComparison>,
}

/// Compare `current` against `baseline`; nothing to say without both, or
/// against a zero baseline
pub fn compare(days: i64, date: NaiveDate, current: Option<i64>, baseline: Option<i64>) -> ActiveComparison {
    let (change, percent_change) = match (current, baseline) {
        (Some(now), Some(then)) if then != 0 => (
            Some(now - then),
            Some((now as f64 / then as f64 - 1.0) * 100.0),
        ),
        _ => (None, None),
    };

    ActiveComparison {
        days,
        date,
        total_active_count: baseline,
        change,
        percent_change,
    }
}

/// GET /api/counts/summary
pub async fn counts_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<SummaryResponse>> {
    let as_of = parse_date_param("as_of", query.as_of.as_deref())?
        .unwrap_or_else(|| reporting_date(today()));

    let current = get_daily_count(&state.db, as_of)
        .await?
        .map(|r| r.total_active_count);

    let mut comparisons = Vec::with_capacity(SUMMARY_OFFSETS_DAYS.len());
    for days in SUMMARY_OFFSETS_DAYS {
        let date = days_before(as_of, days)?;
        let baseline = get_daily_count(&state.db, date)
            .await?
            .map(|r| r.total_active_count);
        comparisons.push(compare(days, date, current, baseline));
    }

    Ok(Json(SummaryResponse {
        as_of,
        total_active_count: current,
        comparisons,
    }))
}

/// Churns and joins on one day with their trailing averages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnJoinPoint {
    pub date: NaiveDate,
    pub churns: i64,
    pub joins: i64,
    pub churns_avg: f64,
    pub joins_avg: f64,
}

/// Response for GET /api/counts/churns-joins
#[derive(Debug, Serialize)]
pub struct ChurnJoinResponse {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub window: i64,
    pub points: Vec<ChurnJoinPoint>,
}

/// Trailing means over stored days in `(date - window, date]`.
///
/// `records` must be ascending by date. Only points on or after `from` are
/// returned; earlier records just feed the first windows.
pub fn rolling_points(records: &[DailyCountRecord], window: i64, from: NaiveDate) -> Vec<ChurnJoinPoint> {
    let mut points = Vec::new();
    let mut tail = 0;
    let mut churn_sum = 0;
    let mut join_sum = 0;

    for (i, record) in records.iter().enumerate() {
        churn_sum += record.churn_count;
        join_sum += record.member_signups_count;

        // Nothing to drop when the window reaches past the earliest date
        let window_start = record.date.checked_sub_signed(Duration::days(window));
        while window_start.is_some_and(|ws| records[tail].date <= ws) {
            churn_sum -= records[tail].churn_count;
            join_sum -= records[tail].member_signups_count;
            tail += 1;
        }

        if record.date < from {
            continue;
        }

        let n = (i + 1 - tail) as f64;
        points.push(ChurnJoinPoint {
            date: record.date,
            churns: record.churn_count,
            joins: record.member_signups_count,
            churns_avg: churn_sum as f64 / n,
            joins_avg: join_sum as f64 / n,
        });
    }

    points
}

/// GET /api/counts/churns-joins
///
/// Ascending by date, for plotting.
pub async fn churns_joins(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<ChurnJoinResponse>> {
    let (start, end) = resolve_range(&query, today())?;
    let window = query.window.unwrap_or(DEFAULT_WINDOW);
    if !ROLLING_WINDOWS.contains(&window) {
        return Err(ApiError::BadRequest(format!(
            "window must be one of {:?}, got {}",
            ROLLING_WINDOWS, window
        )));
    }

    let lookback = days_before(start, window - 1)?;
    let mut records = list_daily_counts(&state.db, lookback, end).await?;
    records.reverse();

    Ok(Json(ChurnJoinResponse {
        start,
        end,
        window,
        points: rolling_points(&records, window, start),
    }))
}
