//! NeonClient against an in-process stub of the Neon API

mod helpers;

use asmbly_common::config::CrmConfig;
use asmbly_sync::crm::{
    AccountDetailSource, AccountSearch, CrmError, CrmSource, EventCache, NeonClient,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use helpers::date;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Accounts whose membership endpoint answers 429 twice before succeeding
const THROTTLED_ACCOUNT: i64 = 429;
/// Accounts whose membership endpoint always answers 502
const DOWN_ACCOUNT: i64 = 502;

#[derive(Clone, Default)]
struct Stub {
    auth_headers: Arc<Mutex<Vec<String>>>,
    search_pages: Arc<Mutex<Vec<u64>>>,
    membership_calls: Arc<AtomicUsize>,
    event_calls: Arc<AtomicUsize>,
}

async fn search(State(stub): State<Stub>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        stub.auth_headers.lock().unwrap().push(auth.to_string());
    }
    let page = body["pagination"]["currentPage"].as_u64().unwrap_or(0);
    stub.search_pages.lock().unwrap().push(page);

    let results = match page {
        0 => json!([{"Account ID": "1"}, {"Account ID": 2}]),
        1 => json!([{"Account ID": "3"}, {"Zip Code": "78754"}]),
        _ => json!([]),
    };
    Json(json!({
        "searchResults": results,
        "pagination": {"currentPage": page, "pageSize": 2, "totalPages": 2, "totalResults": 4}
    }))
}

async fn memberships(State(stub): State<Stub>, Path(id): Path<i64>) -> Response {
    let call = stub.membership_calls.fetch_add(1, Ordering::SeqCst);
    if id == DOWN_ACCOUNT {
        return (StatusCode::BAD_GATEWAY, "upstream down").into_response();
    }
    if id == THROTTLED_ACCOUNT && call < 2 {
        return (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response();
    }
    if id == 404 {
        return (StatusCode::NOT_FOUND, "no such account").into_response();
    }
    Json(json!({
        "memberships": [
            {"id": "10", "termStartDate": "2024-01-01", "termEndDate": "2024-01-31",
             "fee": 95.0, "termUnit": "MONTH", "status": "SUCCEEDED"},
            {"id": "11", "termStartDate": "2024-02-01", "termEndDate": "2024-02-29",
             "fee": "not money", "termUnit": "MONTH", "status": "SUCCEEDED"}
        ],
        "pagination": {"currentPage": 0, "totalPages": 1}
    }))
    .into_response()
}

async fn account(Path(id): Path<i64>) -> Json<Value> {
    Json(json!({
        "individualAccount": {
            "accountId": id.to_string(),
            "primaryContact": {
                "firstName": "Alex",
                "lastName": "Kim",
                "email1": "alex@example.com",
                "addresses": [{"isPrimaryAddress": true, "zipCode": "78701"}]
            }
        }
    }))
}

async fn registrations() -> Json<Value> {
    let succeeded = |event_id: &str, amount: f64| {
        json!({
            "eventId": event_id,
            "registrationAmount": amount,
            "tickets": [{"attendees": [{"registrationStatus": "SUCCEEDED"}]}]
        })
    };
    Json(json!({
        "eventRegistrations": [
            succeeded("900", 60.0),
            succeeded("900", 60.0),
            succeeded("901", 45.0),
            {"eventId": "902", "tickets": [{"attendees": [{"registrationStatus": "CANCELED"}]}]}
        ],
        "pagination": {"currentPage": 0, "totalPages": 1}
    }))
}

async fn event(State(stub): State<Stub>, Path(id): Path<i64>) -> Json<Value> {
    stub.event_calls.fetch_add(1, Ordering::SeqCst);
    let (name, category) = match id {
        900 => ("Woodshop Safety w/ Pat", json!({"name": "Woodshop Safety"})),
        _ => ("Laser Cutting Basics", Value::Null),
    };
    Json(json!({
        "name": name,
        "eventDates": {"startDate": "2024-01-20"},
        "category": category
    }))
}

async fn donations() -> Json<Value> {
    Json(json!({
        "donations": [{"date": "2024-03-01", "amount": 50}, {"amount": 5}],
        "pagination": {"currentPage": 0, "totalPages": 1}
    }))
}

async fn start_stub() -> (Stub, NeonClient) {
    let stub = Stub::default();
    let app = Router::new()
        .route("/v2/accounts/search", post(search))
        .route("/v2/accounts/:id", get(account))
        .route("/v2/accounts/:id/memberships", get(memberships))
        .route("/v2/accounts/:id/eventRegistrations", get(registrations))
        .route("/v2/accounts/:id/donations", get(donations))
        .route("/v2/events/:id", get(event))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = CrmConfig {
        base_url: format!("http://{}", addr),
        org_id: Some("org".to_string()),
        api_key: Some("key".to_string()),
        requests_per_second: 1000,
        max_retries: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        page_size: 2,
        timeout_secs: 5,
    };
    (stub, NeonClient::from_config(&config).unwrap())
}

#[tokio::test]
async fn test_search_follows_pagination_and_skips_bad_rows() {
    let (stub, client) = start_stub().await;

    let rows = client
        .search_accounts(&AccountSearch::membership_starts(date(2024, 3, 5)))
        .await
        .unwrap();

    let ids: Vec<i64> = rows.iter().map(|r| r.account_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(*stub.search_pages.lock().unwrap(), vec![0, 1]);
}

#[tokio::test]
async fn test_count_includes_rows_without_account_id() {
    let (_stub, client) = start_stub().await;
    let search = AccountSearch::active_members();

    let rows = client.search_accounts(&search).await.unwrap();
    let count = client.count_accounts(&search).await.unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(count, 4);
}

#[tokio::test]
async fn test_requests_use_basic_auth() {
    let (stub, client) = start_stub().await;
    client.search_accounts(&AccountSearch::active_members()).await.unwrap();

    let headers = stub.auth_headers.lock().unwrap();
    assert!(!headers.is_empty());
    assert!(headers.iter().all(|h| h == "Basic b3JnOmtleQ=="));
}

#[tokio::test]
async fn test_membership_history_skips_undecodable_items() {
    let (_stub, client) = start_stub().await;

    let history = client.fetch_membership_history(7).await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].term_start_date.as_deref(), Some("2024-01-01"));
}

#[tokio::test]
async fn test_throttled_request_is_retried() {
    let (stub, client) = start_stub().await;

    let history = client.fetch_membership_history(THROTTLED_ACCOUNT).await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(stub.membership_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_exhausted_is_transient_error() {
    let (stub, client) = start_stub().await;

    let err = client.fetch_membership_history(DOWN_ACCOUNT).await.unwrap_err();

    match err {
        CrmError::Transient { status, attempts } => {
            assert_eq!(status, 502);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected Transient, got {:?}", other),
    }
    assert_eq!(stub.membership_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let (stub, client) = start_stub().await;

    let err = client.fetch_membership_history(404).await.unwrap_err();

    assert!(matches!(err, CrmError::Status { status: 404, .. }), "{:?}", err);
    assert_eq!(stub.membership_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_account_detail_and_activity() {
    let (stub, client) = start_stub().await;
    let cache = EventCache::new(16);

    let account = client.fetch_account(55).await.unwrap();
    assert_eq!(account.first_name.as_deref(), Some("Alex"));
    assert_eq!(account.zip_code(), Some("78701"));

    let registrations = client.fetch_event_registrations(55, &cache).await.unwrap();
    assert_eq!(registrations.len(), 3);
    assert_eq!(registrations[0].event.name, "Woodshop Safety");
    assert_eq!(registrations[0].event.category, "Woodshop Safety");
    assert_eq!(registrations[2].event.category, "None");
    // Event 900 fetched once thanks to the cache
    assert_eq!(stub.event_calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 2);

    let donations = client.fetch_donations(55).await.unwrap();
    assert_eq!(donations.len(), 1);
    assert_eq!(donations[0].amount, 50.0);
}

#[test]
fn test_missing_credentials_is_config_error() {
    let config = CrmConfig::default();
    assert!(matches!(
        NeonClient::from_config(&config),
        Err(asmbly_common::Error::Config(_))
    ));
}
