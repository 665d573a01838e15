//! Neon CRM REST client
//!
//! Every request passes one shared rate limiter and is retried on 429/502
//! through [`retry_transient`]. Authentication is HTTP basic with the
//! organization id as user and the API key as password.

use crate::crm::account::AccountDetail;
use crate::crm::event_cache::{EventCache, EventInfo};
use crate::crm::records::{AccountRow, Donation, EventRegistration, RawMembership, RegistrationRow};
use crate::crm::retry::{retry_transient, RetryPolicy};
use crate::crm::search::AccountSearch;
use crate::crm::{AccountDetailSource, CrmError, CrmSource};
use asmbly_common::config::CrmConfig;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::time::Duration;

/// `pagination` block of list and search responses
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    search_results: Vec<Value>,
    #[serde(default)]
    pagination: Pagination,
}

/// Neon CRM API client
pub struct NeonClient {
    http: Client,
    base_url: String,
    org_id: String,
    api_key: String,
    page_size: u32,
    retry: RetryPolicy,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl NeonClient {
    /// Build a client from the `[crm]` config section.
    ///
    /// Fails with a configuration error when credentials are missing.
    pub fn from_config(config: &CrmConfig) -> asmbly_common::Result<Self> {
        let (org_id, api_key) = config.credentials()?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("asmbly-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| asmbly_common::Error::Config(format!("HTTP client build failed: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            org_id,
            api_key,
            page_size: config.page_size.max(1),
            retry: RetryPolicy::from_config(config),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    /// Send one request (with retries) and decode the JSON body
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, CrmError> {
        let url = format!("{}{}", self.base_url, path);
        let url = url.as_str();
        let method = &method;

        retry_transient(path, &self.retry, move || async move {
            self.rate_limiter.until_ready().await;

            tracing::debug!(method = %method, url = %url, "CRM request");

            let mut request = self
                .http
                .request(method.clone(), url)
                .basic_auth(&self.org_id, Some(&self.api_key))
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| CrmError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CrmError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| CrmError::Decode(format!("{}: {}", path, e)))
        })
        .await
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, CrmError> {
        self.request(Method::GET, path, query, None).await
    }

    /// Every item under `key` across all pages of a list endpoint
    async fn get_list(
        &self,
        path: &str,
        key: &str,
        sort_column: &str,
    ) -> Result<Vec<Value>, CrmError> {
        let mut items = Vec::new();
        let mut page = 0u32;

        loop {
            let query = [
                ("currentPage", page.to_string()),
                ("pageSize", self.page_size.to_string()),
                ("sortColumn", sort_column.to_string()),
                ("sortDirection", "ASC".to_string()),
            ];
            let mut response = self.get(path, &query).await?;

            if let Some(Value::Array(page_items)) = response.get_mut(key).map(Value::take) {
                items.extend(page_items);
            }

            let pagination: Pagination = response
                .get("pagination")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| CrmError::Decode(format!("{} pagination: {}", path, e)))?
                .unwrap_or_default();

            page += 1;
            if page >= pagination.total_pages {
                break;
            }
        }

        Ok(items)
    }

    /// Raw `searchResults` entries of every page of an account search
    async fn search_results(&self, search: &AccountSearch) -> Result<Vec<Value>, CrmError> {
        let mut results = Vec::new();
        let mut page = 0u32;

        loop {
            let body = json!({
                "searchFields": search.search_fields,
                "outputFields": search.output_fields,
                "pagination": {"currentPage": page, "pageSize": self.page_size},
            });
            let response = self
                .request(Method::POST, "/v2/accounts/search", &[], Some(&body))
                .await?;
            let response: SearchResponse = serde_json::from_value(response)
                .map_err(|e| CrmError::Decode(format!("account search: {}", e)))?;
            results.extend(response.search_results);

            page += 1;
            if page >= response.pagination.total_pages {
                break;
            }
        }

        tracing::debug!(results = results.len(), pages = page, "Account search complete");
        Ok(results)
    }

    async fn fetch_event(&self, event_id: i64) -> Result<EventInfo, CrmError> {
        let response = self.get(&format!("/v2/events/{}", event_id), &[]).await?;
        Ok(EventInfo::from_json(event_id, &response)?)
    }

    async fn resolve_event(&self, event_id: i64, cache: &EventCache) -> Result<EventInfo, CrmError> {
        if let Some(info) = cache.get(event_id) {
            return Ok(info);
        }
        let info = self.fetch_event(event_id).await?;
        cache.insert(event_id, info.clone());
        Ok(info)
    }
}

#[async_trait]
impl CrmSource for NeonClient {
    async fn search_accounts(&self, search: &AccountSearch) -> Result<Vec<AccountRow>, CrmError> {
        let results = self.search_results(search).await?;

        let mut rows = Vec::with_capacity(results.len());
        for result in &results {
            match AccountRow::from_json(result) {
                Ok(row) => rows.push(row),
                Err(e) => tracing::warn!(error = %e, "Skipping malformed search result"),
            }
        }
        Ok(rows)
    }

    async fn count_accounts(&self, search: &AccountSearch) -> Result<i64, CrmError> {
        let results = self.search_results(search).await?;
        Ok(results.len() as i64)
    }

    async fn fetch_membership_history(
        &self,
        account_id: i64,
    ) -> Result<Vec<RawMembership>, CrmError> {
        let items = self
            .get_list(
                &format!("/v2/accounts/{}/memberships", account_id),
                "memberships",
                "date",
            )
            .await?;

        let mut memberships = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<RawMembership>(item) {
                Ok(raw) => memberships.push(raw),
                Err(e) => tracing::warn!(
                    account_id,
                    error = %e,
                    "Skipping malformed membership record"
                ),
            }
        }
        Ok(memberships)
    }
}

#[async_trait]
impl AccountDetailSource for NeonClient {
    async fn fetch_account(&self, account_id: i64) -> Result<AccountDetail, CrmError> {
        let response = self.get(&format!("/v2/accounts/{}", account_id), &[]).await?;
        Ok(AccountDetail::from_json(account_id, &response)?)
    }

    async fn fetch_event_registrations(
        &self,
        account_id: i64,
        cache: &EventCache,
    ) -> Result<Vec<EventRegistration>, CrmError> {
        let items = self
            .get_list(
                &format!("/v2/accounts/{}/eventRegistrations", account_id),
                "eventRegistrations",
                "registrationDateTime",
            )
            .await?;

        let mut registrations = Vec::new();
        for item in &items {
            let row = match RegistrationRow::from_json(item) {
                Ok(Some(row)) => row,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(account_id, error = %e, "Skipping malformed event registration");
                    continue;
                }
            };
            let event = self.resolve_event(row.event_id, cache).await?;
            registrations.push(EventRegistration {
                event_id: row.event_id,
                amount: row.amount,
                event,
            });
        }
        Ok(registrations)
    }

    async fn fetch_donations(&self, account_id: i64) -> Result<Vec<Donation>, CrmError> {
        let items = self
            .get_list(
                &format!("/v2/accounts/{}/donations", account_id),
                "donations",
                "date",
            )
            .await?;

        let mut donations = Vec::with_capacity(items.len());
        for item in &items {
            match Donation::from_json(item) {
                Ok(d) => donations.push(d),
                Err(e) => tracing::warn!(account_id, error = %e, "Skipping malformed donation"),
            }
        }
        Ok(donations)
    }
}
