//! REST API Server for the country finance agent
//!
//! Exposes the pipeline over HTTP for a frontend to render.

use axum::extract::{rejection::JsonRejection, State};
use axum::{http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::agent::CountryFinanceAgent;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CountryRequest {
    pub country: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<CountryFinanceAgent>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Country Report Endpoint
/// =============================

async fn country_report(
    State(state): State<ApiState>,
    payload: Result<Json<CountryRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    // Body errors use the same envelope as every other failure.
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => {
            warn!("Rejected country request: {}", rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(rejection.body_text())),
            );
        }
    };

    let country = req.country.trim();
    if country.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Country name must not be empty".into())),
        );
    }

    info!("Received country request: {}", country);

    // Upstream failures are carried as notices inside the report.
    let report = state.agent.run(country).await;
    (StatusCode::OK, Json(ApiResponse::success(report)))
}

/// =============================
/// Router
/// =============================

pub fn create_router(agent: Arc<CountryFinanceAgent>) -> Router {
    let state = ApiState { agent };

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/country", post(country_report))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    agent: Arc<CountryFinanceAgent>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(agent);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
