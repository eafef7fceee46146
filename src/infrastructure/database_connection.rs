// Database connection and pool management
// SQLite holds the single run status row that survives restarts

use anyhow::{Context, Result};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use tracing::info;

use crate::domain::pipeline_config::PipelineConfig;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        let db_path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);

        if db_path != ":memory:" && !db_path.is_empty() {
            if let Some(parent) = Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create database directory {parent:?}"))?;
            }
            if !Path::new(db_path).exists() {
                tokio::fs::File::create(db_path)
                    .await
                    .with_context(|| format!("Failed to create database file {db_path}"))?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to {database_url}"))?;

        info!("Connected to status database: {}", database_url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the status table and seed its single row
    ///
    /// Safe to run on every start; an existing row is left untouched.
    pub async fn migrate(&self, default_interval_minutes: u32) -> Result<()> {
        let create_status_sql = r#"
            CREATE TABLE IF NOT EXISTS resync_status (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                enabled BOOLEAN NOT NULL DEFAULT 1,
                interval_minutes INTEGER NOT NULL CHECK (interval_minutes > 0),
                last_run_at TEXT,
                last_status TEXT NOT NULL DEFAULT 'none',
                last_message TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL
            )
        "#;

        sqlx::query(create_status_sql).execute(&self.pool).await?;

        let defaults = PipelineConfig::new(true, default_interval_minutes.max(1));
        sqlx::query(
            "INSERT OR IGNORE INTO resync_status (id, enabled, interval_minutes, last_status, last_message, updated_at)
             VALUES (1, ?, ?, ?, ?, ?)",
        )
        .bind(defaults.enabled)
        .bind(i64::from(defaults.interval_minutes))
        .bind(defaults.last_status)
        .bind(&defaults.last_message)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_database_connection() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("test.db");
        let database_url = format!("sqlite:{}", db_path.to_string_lossy());

        let db = DatabaseConnection::new(&database_url).await?;

        assert!(!db.pool().is_closed());
        assert!(db_path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_database_migration_is_idempotent() -> Result<()> {
        let temp_dir = tempdir()?;
        let database_url = format!("sqlite:{}", temp_dir.path().join("status.db").display());

        let db = DatabaseConnection::new(&database_url).await?;
        db.migrate(90).await?;
        sqlx::query("UPDATE resync_status SET interval_minutes = 15 WHERE id = 1")
            .execute(db.pool())
            .await?;
        db.migrate(90).await?;

        let (count, interval): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), MAX(interval_minutes) FROM resync_status")
                .fetch_one(db.pool())
                .await?;
        assert_eq!(count, 1);
        assert_eq!(interval, 15);
        Ok(())
    }
}
