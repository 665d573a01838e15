//! Zip-code refresh job
//!
//! Re-reads the zip code of every member already in the database and
//! updates the stored five-digit prefix.

use crate::crm::search::ZIP_CODE_FIELD;
use crate::crm::{AccountSearch, CrmSource};
use crate::error::SyncResult;
use asmbly_common::db::{bulk_update_zip_codes, list_member_ids, ZipUpdate};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Account ids per search request
const IDS_PER_SEARCH: usize = 500;

/// Leading digits of a zip code: `"78754-1234"` and `"78754"` give `78754`.
///
/// Anything else (letters, a leading dash, digits followed by other text)
/// gives `None`.
pub fn parse_zip_prefix(zip: &str) -> Option<i64> {
    let zip = zip.trim();
    let digits_end = zip
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(zip.len());
    if digits_end == 0 {
        return None;
    }
    let rest = &zip[digits_end..];
    if !(rest.is_empty() || rest.starts_with('-')) {
        return None;
    }
    zip[..digits_end].parse().ok()
}

/// Outcome of a zip refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZipSummary {
    pub members: usize,
    pub zips_found: usize,
    pub rows_updated: u64,
}

/// Refresh stored zip codes from the CRM
pub async fn refresh_zip_codes<C: CrmSource>(crm: Arc<C>, pool: &SqlitePool) -> SyncResult<ZipSummary> {
    let ids = list_member_ids(pool).await?;
    if ids.is_empty() {
        tracing::info!("No members stored, nothing to refresh");
        return Ok(ZipSummary::default());
    }

    let mut updates = Vec::new();
    for chunk in ids.chunks(IDS_PER_SEARCH) {
        let rows = crm.search_accounts(&AccountSearch::zip_codes(chunk)).await?;
        for row in rows {
            let Some(raw) = row.field(ZIP_CODE_FIELD) else {
                continue;
            };
            match parse_zip_prefix(raw) {
                Some(zip_code) => updates.push(ZipUpdate {
                    neon_id: row.account_id,
                    zip_code,
                }),
                None => tracing::warn!(
                    account_id = row.account_id,
                    zip = raw,
                    "Skipping unparseable zip code"
                ),
            }
        }
    }

    let rows_updated = bulk_update_zip_codes(pool, &updates).await?;
    let summary = ZipSummary {
        members: ids.len(),
        zips_found: updates.len(),
        rows_updated,
    };
    tracing::info!(
        members = summary.members,
        zips_found = summary.zips_found,
        rows_updated = summary.rows_updated,
        "Zip codes refreshed"
    );
    Ok(summary)
}
