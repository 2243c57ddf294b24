use super::ApiResult;
use crate::config::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use scout_core::catalog::CatalogStore;
use scout_core::{
    CatalogEntry, CompareInput, CompareOutput, DiscoverInput, DiscoverOutput, DiscoveryError,
    GetMetricsInput, GetMetricsOutput, Identifier, RateLimitResult, Tier,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Extract an API credential from `Authorization: Bearer` or `X-API-Key`
fn extract_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }
    headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

/// Resolve the caller's quota decision, failing the request when the
/// budget is exhausted or the credential is unknown
async fn check_quota(state: &AppState, headers: &HeaderMap) -> Result<RateLimitResult, DiscoveryError> {
    let credential = extract_credential(headers);
    let decision = state.limiter.check_quota(credential.as_deref()).await;

    if !decision.allowed {
        return Err(DiscoveryError::RateLimited {
            tier: decision.tier.to_string(),
            remaining: decision.remaining,
        });
    }
    Ok(decision)
}

/// Append a usage event off the request path
fn record_usage(state: &AppState, decision: &RateLimitResult, endpoint: &str, query: String, started: Instant) {
    let limiter = state.limiter.clone();
    let credential_id = decision.credential_id;
    let endpoint = endpoint.to_string();
    let elapsed = started.elapsed().as_millis() as u64;

    tokio::spawn(async move {
        limiter
            .record_usage(credential_id, &endpoint, &query, elapsed)
            .await;
    });
}

/// Find servers matching a natural-language need
pub async fn discover(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<DiscoverInput>,
) -> ApiResult<Json<DiscoverOutput>> {
    let started = Instant::now();
    let decision = check_quota(&state, &headers).await?;

    let output = state.discovery.discover(&input).await?;
    record_usage(&state, &decision, "discover", input.need.clone(), started);

    Ok(Json(output))
}

/// Metrics report for one server
pub async fn server_metrics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<GetMetricsInput>,
) -> ApiResult<Json<GetMetricsOutput>> {
    let started = Instant::now();
    let decision = check_quota(&state, &headers).await?;

    let output = state.reporter.server_metrics(&input).await?;
    record_usage(&state, &decision, "metrics", input.server_id.clone(), started);

    Ok(Json(output))
}

/// Side-by-side comparison of 2..10 servers
pub async fn compare(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<CompareInput>,
) -> ApiResult<Json<CompareOutput>> {
    let started = Instant::now();
    let decision = check_quota(&state, &headers).await?;

    let output = state.comparisons.compare(&input).await?;
    record_usage(&state, &decision, "compare", input.server_ids.join(","), started);

    Ok(Json(output))
}

#[derive(Debug, Deserialize)]
pub struct ListServersQuery {
    pub category: Option<String>,
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

fn default_list_limit() -> usize {
    50
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListServersResponse {
    pub servers: Vec<CatalogEntry>,
    pub total: usize,
}

/// List catalog entries, optionally filtered by category
pub async fn list_servers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListServersQuery>,
) -> ApiResult<Json<ListServersResponse>> {
    check_quota(&state, &headers).await?;

    let servers = state
        .catalog
        .list_servers(query.category.as_deref(), query.limit)
        .await?;
    let total = servers.len();
    Ok(Json(ListServersResponse { servers, total }))
}

/// Fetch one catalog entry by slug or UUID
pub async fn get_server(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(identifier): Path<String>,
) -> ApiResult<Json<CatalogEntry>> {
    check_quota(&state, &headers).await?;

    let entry = state
        .catalog
        .get_by_identifier(&Identifier::parse(&identifier))
        .await?
        .ok_or_else(|| DiscoveryError::not_found(&identifier))?;
    Ok(Json(entry))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub category: String,
    pub count: usize,
}

/// Distinct categories with entry counts
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<CategoryEntry>>> {
    check_quota(&state, &headers).await?;

    let categories = state
        .catalog
        .categories()
        .await?
        .into_iter()
        .map(|(category, count)| CategoryEntry { category, count })
        .collect();
    Ok(Json(categories))
}

/// Tier table for the pricing page
pub async fn pricing() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "tiers": [
            { "name": "free", "monthly_requests": Tier::Free.monthly_limit() },
            { "name": "pro", "monthly_requests": Tier::Pro.monthly_limit() },
            { "name": "enterprise", "monthly_requests": Tier::Enterprise.monthly_limit() },
        ]
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub email: String,
    #[serde(default = "default_key_tier")]
    pub tier: Tier,
}

fn default_key_tier() -> Tier {
    Tier::Free
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateKeyResponse {
    pub api_key: String,
    pub tier: Tier,
}

/// Issue a new API key. Defaults to the free tier.
pub async fn create_key(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateKeyRequest>,
) -> ApiResult<Json<CreateKeyResponse>> {
    if !request.email.contains('@') {
        return Err(DiscoveryError::validation("a valid email is required").into());
    }

    let api_key = state.quota_store.issue_key(request.tier)?;
    tracing::info!(tier = %request.tier, email = %request.email, "issued new API key");
    Ok(Json(CreateKeyResponse {
        api_key,
        tier: request.tier,
    }))
}
