//! SQLite-backed run status store
//!
//! Holds the single `resync_status` row created by
//! [`DatabaseConnection::migrate`](crate::infrastructure::database_connection::DatabaseConnection::migrate).
//! Timestamps are stored as RFC 3339 text.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::pipeline_config::{PipelineConfig, RunStatus, SettingsUpdate};
use crate::domain::repositories::RunStatusRepository;

pub struct SqliteRunStatusRepository {
    pool: SqlitePool,
}

impl SqliteRunStatusRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Helper method to convert the status row to a `PipelineConfig`
    fn row_to_config(row: &sqlx::sqlite::SqliteRow) -> Result<PipelineConfig> {
        let last_run_at: Option<String> = row.try_get("last_run_at")?;
        let last_run_at = last_run_at
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| anyhow!("Failed to parse last_run_at '{}': {}", raw, e))
            })
            .transpose()?;

        let interval: i64 = row.try_get("interval_minutes")?;
        let interval_minutes =
            u32::try_from(interval).map_err(|_| anyhow!("interval_minutes out of range: {}", interval))?;

        Ok(PipelineConfig {
            enabled: row.try_get("enabled")?,
            interval_minutes,
            last_run_at,
            last_status: row.try_get::<RunStatus, _>("last_status")?,
            last_message: row.try_get("last_message")?,
        })
    }

    async fn write_status(
        &self,
        status: RunStatus,
        message: &str,
        last_run_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE resync_status
            SET last_status = ?, last_message = ?,
                last_run_at = COALESCE(?, last_run_at), updated_at = ?
            WHERE id = 1
            ",
        )
        .bind(status)
        .bind(message)
        .bind(last_run_at.map(|t| t.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("resync_status row is missing; run migrations first"));
        }
        Ok(())
    }
}

#[async_trait]
impl RunStatusRepository for SqliteRunStatusRepository {
    async fn load(&self) -> Result<PipelineConfig> {
        let row = sqlx::query(
            r"
            SELECT enabled, interval_minutes, last_run_at, last_status, last_message
            FROM resync_status WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_config(&row),
            None => Err(anyhow!("resync_status row is missing; run migrations first")),
        }
    }

    async fn mark_pending(&self, message: &str) -> Result<()> {
        self.write_status(RunStatus::Pending, message, None).await
    }

    async fn mark_success(&self, finished_at: DateTime<Utc>, message: &str) -> Result<()> {
        self.write_status(RunStatus::Success, message, Some(finished_at)).await
    }

    async fn mark_error(&self, message: &str) -> Result<()> {
        self.write_status(RunStatus::Error, message, None).await
    }

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<PipelineConfig> {
        if update.interval_minutes == Some(0) {
            return Err(anyhow!("interval must be at least one minute"));
        }

        sqlx::query(
            r"
            UPDATE resync_status
            SET enabled = COALESCE(?, enabled),
                interval_minutes = COALESCE(?, interval_minutes),
                updated_at = ?
            WHERE id = 1
            ",
        )
        .bind(update.enabled)
        .bind(update.interval_minutes.map(i64::from))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.load().await
    }

    async fn recover_interrupted(&self, message: &str) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE resync_status
            SET last_status = ?, last_message = ?, updated_at = ?
            WHERE id = 1 AND last_status = ?
            ",
        )
        .bind(RunStatus::Error)
        .bind(message)
        .bind(Utc::now().to_rfc3339())
        .bind(RunStatus::Pending)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
