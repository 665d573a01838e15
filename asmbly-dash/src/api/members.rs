//! Member endpoints: churn-risk table, outreach flag, zip map

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{self, EmailedUpdate, MemberStatus, RiskFilter, RiskRow, RiskSort, SortOrder, ZipCount};
use crate::pagination::{calculate_pagination, PAGE_SIZE};
use crate::{ApiError, ApiResult, AppState};

/// Query parameters for GET /api/members/risk
#[derive(Debug, Deserialize)]
pub struct RiskQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    pub search: Option<String>,
    #[serde(default = "default_sort")]
    pub sort: RiskSort,
    #[serde(default = "default_order")]
    pub order: SortOrder,
    #[serde(default = "default_show_emailed")]
    pub show_emailed: bool,
}

fn default_page() -> i64 {
    1
}

fn default_sort() -> RiskSort {
    RiskSort::RiskScore
}

fn default_order() -> SortOrder {
    SortOrder::Desc
}

fn default_show_emailed() -> bool {
    true
}

/// One row of the risk table as displayed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskMember {
    pub neon_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub risk_score: f64,
    pub membership_duration: i64,
    pub emailed: bool,
}

impl From<RiskRow> for RiskMember {
    fn from(row: RiskRow) -> Self {
        let full_name = format!(
            "{} {}",
            row.first_name.as_deref().unwrap_or_default(),
            row.last_name.as_deref().unwrap_or_default()
        );
        Self {
            neon_id: row.neon_id,
            name: title_case(full_name.trim()),
            email: row.email.map(|e| e.trim().to_lowercase()),
            risk_score: row.risk_score,
            membership_duration: row.membership_duration,
            emailed: row.emailed,
        }
    }
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Response for GET /api/members/risk
#[derive(Debug, Serialize)]
pub struct RiskPage {
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub total_rows: i64,
    pub members: Vec<RiskMember>,
}

/// GET /api/members/risk
///
/// Active members that have a risk score, highest risk first by default.
pub async fn risk_table(
    State(state): State<AppState>,
    Query(query): Query<RiskQuery>,
) -> ApiResult<Json<RiskPage>> {
    let filter = RiskFilter {
        search: query.search,
        show_emailed: query.show_emailed,
    };

    let total_rows = db::count_risk_rows(&state.db, &filter).await?;
    let pagination = calculate_pagination(total_rows, query.page);

    let rows = db::list_risk_rows(
        &state.db,
        &filter,
        query.sort,
        query.order,
        PAGE_SIZE,
        pagination.offset,
    )
    .await?;

    Ok(Json(RiskPage {
        page: pagination.page,
        page_size: PAGE_SIZE,
        total_pages: pagination.total_pages,
        total_rows,
        members: rows.into_iter().map(RiskMember::from).collect(),
    }))
}

/// Request body for POST /api/members/emailed
#[derive(Debug, Deserialize)]
pub struct EmailedRequest {
    pub updates: Vec<EmailedUpdate>,
}

/// Response for POST /api/members/emailed
#[derive(Debug, Serialize)]
pub struct EmailedResponse {
    pub updated: u64,
}

/// POST /api/members/emailed
pub async fn set_emailed(
    State(state): State<AppState>,
    Json(request): Json<EmailedRequest>,
) -> ApiResult<Json<EmailedResponse>> {
    if request.updates.is_empty() {
        return Err(ApiError::BadRequest("updates must not be empty".to_string()));
    }

    let updated = db::set_emailed(&state.db, &request.updates).await?;
    info!("Updated emailed flag on {} members", updated);

    Ok(Json(EmailedResponse { updated }))
}

/// Query parameters for GET /api/members/zip-counts
#[derive(Debug, Deserialize)]
pub struct ZipQuery {
    #[serde(default)]
    pub status: MemberStatus,
}

/// Response for GET /api/members/zip-counts
#[derive(Debug, Serialize)]
pub struct ZipCountsResponse {
    pub status: MemberStatus,
    pub zip_codes: Vec<ZipCount>,
}

/// GET /api/members/zip-counts
pub async fn zip_counts(
    State(state): State<AppState>,
    Query(query): Query<ZipQuery>,
) -> ApiResult<Json<ZipCountsResponse>> {
    let zip_codes = db::zip_counts(&state.db, query.status).await?;

    Ok(Json(ZipCountsResponse {
        status: query.status,
        zip_codes,
    }))
}
