//! Storefront Resync - bulk dataset resynchronization service
//!
//! Wipes and rebuilds a relational dataset table by table in foreign-key
//! safe order, behind a chain of scheduling gates, and exposes trigger,
//! progress and status endpoints over HTTP.

// Module declarations
pub mod application;
pub mod commands;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use crate::application::{AppState, ResyncOrchestrator};
use crate::domain::table_order::{FOREIGN_KEYS, ResyncPlan, verify_plan};
use crate::infrastructure::http_server::{build_router, serve, shutdown_signal};
use crate::infrastructure::{
    AppConfig, ConfigManager, DatabaseConnection, HttpTableAdapter, SqliteRunStatusRepository, logging,
};

/// Load configuration, wire the pipeline and serve HTTP until Ctrl-C
pub async fn run() -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let mut config = config_manager.load_config().await?;
    config.apply_env_overrides();

    logging::init_logging_with_config(&config.logging)?;
    logging::log_system_info();

    if let Err(e) = run_with_config(config).await {
        error!("❌ Resync service failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

/// Wire the pipeline from an already loaded configuration and serve
pub async fn run_with_config(config: AppConfig) -> Result<()> {
    let plan = ResyncPlan::storefront();
    verify_plan(&plan, FOREIGN_KEYS).context("Built-in table order is inconsistent")?;

    let db = DatabaseConnection::new(&config.database.url).await?;
    db.migrate(config.resync.default_interval_minutes).await?;
    let store = Arc::new(SqliteRunStatusRepository::new(db.pool().clone()));

    let adapter = Arc::new(HttpTableAdapter::new(&config.adapter)?);
    info!("Table operation adapter: {}", config.adapter.base_url);

    let orchestrator = Arc::new(ResyncOrchestrator::new(
        plan,
        adapter,
        store,
        config.resync.orchestrator_settings(),
    ));
    orchestrator.recover_interrupted_run().await?;

    let state = AppState::new(orchestrator, config.server.auth_token.clone());
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;

    serve(listener, build_router(state), shutdown_signal()).await
}
