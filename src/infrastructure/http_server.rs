//! HTTP server setup
//!
//! Routes:
//! - `POST /api/resync/trigger`
//! - `GET  /api/resync/progress`
//! - `GET  /api/resync/status`
//! - `PUT  /api/resync/settings`
//! - `GET  /health` (no auth)

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    error_handling::HandleErrorLayer,
    http::StatusCode,
    middleware,
    routing::{get, post, put},
};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tracing::info;

use crate::application::state::AppState;
use crate::commands::resync_commands::{
    ErrorBody, get_progress, get_status, health, require_token, trigger_resync, update_settings,
};

/// Upper bound for the read/settings routes; triggers run as long as the run takes
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates the application router.
pub fn build_router(state: AppState) -> Router {
    let queries = Router::new()
        .route("/progress", get(get_progress))
        .route("/status", get(get_status))
        .route("/settings", put(update_settings))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .layer(TimeoutLayer::new(QUERY_TIMEOUT)),
        );

    let api = Router::new()
        .route("/trigger", post(trigger_resync))
        .merge(queries)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .nest("/api/resync", api)
        .route("/health", get(health))
        .with_state(state)
}

async fn handle_timeout_error(_err: tower::BoxError) -> (StatusCode, Json<ErrorBody>) {
    let body = ErrorBody {
        success: false,
        error: "Request timed out".to_string(),
    };
    (StatusCode::SERVICE_UNAVAILABLE, Json(body))
}

/// Serves `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("listener has no local address")?;
    info!("🚀 Resync API listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    info!("HTTP server stopped");
    Ok(())
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::orchestrator::ResyncOrchestrator;
    use crate::domain::table_order::ResyncPlan;
    use crate::infrastructure::memory_store::InMemoryRunStatusRepository;
    use crate::test_utils::{ScriptedAdapter, immediate_settings};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn serves_until_shutdown() {
        let orchestrator = ResyncOrchestrator::new(
            ResyncPlan::storefront(),
            Arc::new(ScriptedAdapter::new()),
            Arc::new(InMemoryRunStatusRepository::default()),
            immediate_settings(),
        );
        let router = build_router(AppState::new(Arc::new(orchestrator), None));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, router, async move {
            let _ = rx.await;
        }));

        let body: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");

        let progress: serde_json::Value = reqwest::get(format!("http://{addr}/api/resync/progress"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(progress["phase"], "idle");
        assert_eq!(progress["tablesCompleted"], 0);

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
