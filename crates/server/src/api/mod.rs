use crate::config::{AppState, ServerConfig};
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use scout_core::catalog::CatalogStore;
use scout_core::DiscoveryError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

mod handlers;

/// Start the API server
pub async fn serve(addr: &str, config: ServerConfig) -> Result<()> {
    let state = AppState::new(&config)?;
    spawn_prune_task(&state, config.search.prune_interval_secs);

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Expired cache entries are removed by an explicit periodic sweep
fn spawn_prune_task(state: &AppState, interval_secs: u64) {
    let discovery = state.discovery.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = discovery.prune_caches();
            if removed > 0 {
                tracing::debug!(removed, "pruned expired cache entries");
            }
        }
    });
}

/// Create the API router
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/v1/pricing", get(handlers::pricing))
        .route("/api/v1/keys", post(handlers::create_key))
        .route("/api/v1/servers", get(handlers::list_servers))
        .route("/api/v1/servers/{identifier}", get(handlers::get_server))
        .route("/api/v1/categories", get(handlers::list_categories))
        .route("/api/v1/discover", post(handlers::discover))
        .route("/api/v1/metrics", post(handlers::server_metrics))
        .route("/api/v1/compare", post(handlers::compare))
        // Middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    let servers = state.catalog.count().await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "service": "scout",
        "version": env!("CARGO_PKG_VERSION"),
        "servers": servers,
    })))
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            tier: None,
            remaining: None,
        }
    }
}

/// Domain errors mapped onto HTTP statuses
pub struct ApiError(DiscoveryError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DiscoveryError::Validation(_) => StatusCode::BAD_REQUEST,
            DiscoveryError::NotFound(_) => StatusCode::NOT_FOUND,
            DiscoveryError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            DiscoveryError::EmbeddingUnavailable(_) => StatusCode::BAD_GATEWAY,
            DiscoveryError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = ErrorResponse::new(self.0.to_string());
        if let DiscoveryError::RateLimited { tier, remaining } = &self.0 {
            body.tier = Some(tier.clone());
            body.remaining = Some(*remaining);
        }

        (status, Json(body)).into_response()
    }
}

impl From<DiscoveryError> for ApiError {
    fn from(err: DiscoveryError) -> Self {
        Self(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let response = ApiError(DiscoveryError::validation("need is required")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError(DiscoveryError::not_found("ghost")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_rate_limited_maps_to_429() {
        let response = ApiError(DiscoveryError::RateLimited {
            tier: "free".to_string(),
            remaining: 0,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
