//! Error types for the resynchronization pipeline
//!
//! Skips are not errors and live in [`crate::domain::run_result::SkipReason`].

use thiserror::Error;

use crate::domain::table_order::Direction;

/// Failures that end a run or prevent one from starting
#[derive(Error, Debug)]
pub enum ResyncError {
    #[error("{direction} failed for table '{table}': {cause}")]
    AdapterFailure {
        table: String,
        direction: Direction,
        cause: String,
    },

    #[error("run status store error while {context}: {source}")]
    StatusStore {
        context: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid resync plan: {0}")]
    InvalidPlan(String),
}

impl ResyncError {
    pub fn adapter_failure(table: impl Into<String>, direction: Direction, cause: impl Into<String>) -> Self {
        Self::AdapterFailure {
            table: table.into(),
            direction,
            cause: cause.into(),
        }
    }

    pub fn status_store(context: &'static str, source: anyhow::Error) -> Self {
        Self::StatusStore { context, source }
    }

    /// Name of the table that aborted the run, if any
    #[must_use]
    pub fn failed_table(&self) -> Option<&str> {
        match self {
            Self::AdapterFailure { table, .. } => Some(table),
            _ => None,
        }
    }
}

/// Errors raised by a [`crate::domain::repositories::TableOperationAdapter`]
/// before it could produce a contract response
#[derive(Error, Debug, Clone)]
pub enum AdapterError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode adapter response: {0}")]
    Decode(String),

    #[error("adapter rejected the request: {message}")]
    Rejected { message: String },
}
