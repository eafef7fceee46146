//! Interfaces to the pipeline's external collaborators
//!
//! Contains trait definitions for the per-table operation adapter and the
//! durable run status store.

use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::AdapterError;
use crate::domain::pipeline_config::{PipelineConfig, SettingsUpdate};

/// Body returned by the table operation adapter for both phases.
///
/// Delete calls report `recordsDeleted`, insert calls `recordsInserted`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_deleted: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_inserted: Option<u64>,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AdapterResponse {
    #[must_use]
    pub fn deleted(count: u64) -> Self {
        Self {
            success: true,
            records_deleted: Some(count),
            message: format!("Deleted {count} records"),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn inserted(count: u64) -> Self {
        Self {
            success: true,
            records_inserted: Some(count),
            message: format!("Inserted {count} records"),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            success: true,
            skipped: true,
            message: message.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Reported count, whichever direction produced it
    #[must_use]
    pub fn count(&self) -> u64 {
        self.records_deleted
            .or(self.records_inserted)
            .unwrap_or(0)
    }

    /// Best description of a failed call
    #[must_use]
    pub fn failure_cause(&self) -> String {
        match (&self.error, self.message.is_empty()) {
            (Some(error), _) => error.clone(),
            (None, false) => self.message.clone(),
            (None, true) => "adapter reported failure without details".to_string(),
        }
    }
}

/// Performs delete-all / insert-all for one table.
///
/// Both operations must be idempotent; the pipeline relies on re-running a
/// whole phase as its only recovery path.
#[async_trait]
pub trait TableOperationAdapter: Send + Sync {
    async fn delete_all(&self, table: &str) -> Result<AdapterResponse, AdapterError>;
    async fn insert_all(&self, table: &str) -> Result<AdapterResponse, AdapterError>;
}

/// Durable singleton record of pipeline settings and the last run outcome
#[async_trait]
pub trait RunStatusRepository: Send + Sync {
    async fn load(&self) -> Result<PipelineConfig>;

    /// Written before the first table is touched
    async fn mark_pending(&self, message: &str) -> Result<()>;

    /// Sets `last_run_at` together with the success status
    async fn mark_success(&self, finished_at: DateTime<Utc>, message: &str) -> Result<()>;

    /// Leaves `last_run_at` untouched
    async fn mark_error(&self, message: &str) -> Result<()>;

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<PipelineConfig>;

    /// Rewrites a `pending` row left behind by a crashed process to `error`.
    /// Returns whether a row was rewritten.
    async fn recover_interrupted(&self, message: &str) -> Result<bool>;
}
