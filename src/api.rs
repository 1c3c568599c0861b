//! REST API server for the ledger query assistant
//!
//! Authentication happens upstream: the gateway verifies the session and
//! forwards the user's id in the `x-user-id` header.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agent::Orchestrator;
use crate::error::AssistantError;
use crate::Result;

pub const USER_ID_HEADER: &str = "x-user-id";

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

const QUERY_REQUIRED_MESSAGE: &str = "Query is required";

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: String,
    pub message: String,
}

impl QueryResponse {
    pub fn success(message: String) -> Self {
        Self {
            status: "success".to_string(),
            message,
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            status: "fail".to_string(),
            message: message.to_string(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

fn authenticated_user(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
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
/// Financial Query Endpoint
/// =============================

async fn financial_query(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> (StatusCode, Json<QueryResponse>) {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "Unreadable query body");
            QueryRequest::default()
        }
    };

    let Some(query) = req.query.filter(|q| !q.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(QueryResponse::fail(QUERY_REQUIRED_MESSAGE)),
        );
    };

    let Some(user_id) = authenticated_user(&headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(QueryResponse::fail("Unauthorized")),
        );
    };

    info!(user_id = %user_id, "Received financial query");

    match state.orchestrator.answer(&query, user_id).await {
        Ok(answer) => (StatusCode::OK, Json(QueryResponse::success(answer.message))),
        Err(AssistantError::UserNotFound(id)) => {
            warn!(user_id = %id, "Authenticated user has no ledger profile");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(QueryResponse::fail(INTERNAL_ERROR_MESSAGE)),
            )
        }
        Err(e) => {
            error!(error = %e, "Financial query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(QueryResponse::fail(INTERNAL_ERROR_MESSAGE)),
            )
        }
    }
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "Request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(QueryResponse::fail(INTERNAL_ERROR_MESSAGE)),
    )
        .into_response()
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/financial-query", post(financial_query))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(orchestrator: Arc<Orchestrator>, port: u16) -> Result<()> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
