//! Infrastructure layer for storage, configuration and external integrations
//!
//! SQLite status store, the HTTP table operation adapter, the axum server,
//! configuration loading and logging setup.

pub mod config;
pub mod database_connection;
pub mod http_server;
pub mod http_table_adapter;
pub mod logging;
pub mod memory_store;
pub mod run_status_repository;

// Re-export commonly used items
pub use config::{AppConfig, ConfigManager};
pub use database_connection::DatabaseConnection;
pub use http_server::{build_router, serve};
pub use http_table_adapter::HttpTableAdapter;
pub use memory_store::InMemoryRunStatusRepository;
pub use run_status_repository::SqliteRunStatusRepository;
