//! HTTP handlers for triggering and observing the resync pipeline
//!
//! All `/api/resync` routes share [`AppState`]; bearer auth is enforced by
//! [`require_token`] before a handler runs.

use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::application::state::AppState;
use crate::domain::pipeline_config::{PipelineConfig, SettingsUpdate};
use crate::domain::progress::ProgressState;
use crate::domain::run_result::TriggerResponse;

/// Error body shared by all non-trigger failures
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Rejects `/api` requests whose `Authorization: Bearer` token does not match
pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    if !state.is_authorized(presented) {
        warn!("Rejected {} {}: bad or missing token", request.method(), request.uri().path());
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}

/// `POST /api/resync/trigger`
///
/// Skips answer 200 like a completed run; only genuine failures answer 500.
pub async fn trigger_resync(State(state): State<AppState>) -> (StatusCode, Json<TriggerResponse>) {
    info!("Resync trigger received");
    let response = state.orchestrator.trigger().await;

    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}

/// `GET /api/resync/progress`
pub async fn get_progress(State(state): State<AppState>) -> Json<ProgressState> {
    Json(state.orchestrator.progress().await)
}

/// `GET /api/resync/status`
pub async fn get_status(State(state): State<AppState>) -> Result<Json<PipelineConfig>, ApiError> {
    state.orchestrator.status().await.map(Json).map_err(|e| {
        error!("Failed to load resync status: {:#}", e);
        ApiError::Internal(format!("Failed to load resync status: {e}"))
    })
}

/// `PUT /api/resync/settings`
pub async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<PipelineConfig>, ApiError> {
    if update.interval_minutes == Some(0) {
        return Err(ApiError::BadRequest("intervalMinutes must be at least 1".into()));
    }

    state.orchestrator.update_settings(&update).await.map(Json).map_err(|e| {
        error!("Failed to update resync settings: {:#}", e);
        ApiError::Internal(format!("Failed to update resync settings: {e}"))
    })
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
