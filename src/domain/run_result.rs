//! Run outcomes and the trigger response shape

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Totals of one completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub records_deleted: u64,
    pub records_inserted: u64,
    pub tables_processed: u32,
    pub timestamp: DateTime<Utc>,
}

impl RunResult {
    /// Text stored as the status row's `last_message`
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Resync completed: {} records deleted, {} records inserted across {} tables",
            self.records_deleted, self.records_inserted, self.tables_processed
        )
    }
}

/// Why a trigger did not start a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    RateLimited { retry_in: Duration },
    StartupCooldown { remaining: Duration },
    Disabled,
    NeverRun,
    IntervalNotElapsed { remaining: Duration },
    RunInProgress { running_for: Duration },
}

impl SkipReason {
    /// Time after which the same gate would let a trigger through, if known
    #[must_use]
    pub const fn remaining(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_in } => Some(*retry_in),
            Self::StartupCooldown { remaining } | Self::IntervalNotElapsed { remaining } => {
                Some(*remaining)
            }
            Self::Disabled | Self::NeverRun | Self::RunInProgress { .. } => None,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::StartupCooldown { .. } => "startup_cooldown",
            Self::Disabled => "disabled",
            Self::NeverRun => "never_run",
            Self::IntervalNotElapsed { .. } => "interval_not_elapsed",
            Self::RunInProgress { .. } => "run_in_progress",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited { retry_in } => write!(
                f,
                "Trigger ignored: another trigger arrived moments ago (retry in {}s)",
                retry_in.as_secs().max(1)
            ),
            Self::StartupCooldown { remaining } => write!(
                f,
                "Skipped: service started recently, cooldown ends in {} minutes",
                minutes_ceil(*remaining)
            ),
            Self::Disabled => f.write_str("Skipped: resync is disabled"),
            Self::NeverRun => f.write_str(
                "Skipped: no previous run recorded, the first run must be scheduled externally",
            ),
            Self::IntervalNotElapsed { remaining } => write!(
                f,
                "Skipped: next run allowed in {} minutes",
                minutes_ceil(*remaining)
            ),
            Self::RunInProgress { running_for } => write!(
                f,
                "Skipped: a resync is already running (started {}s ago)",
                running_for.as_secs()
            ),
        }
    }
}

fn minutes_ceil(d: Duration) -> u64 {
    d.as_secs().div_ceil(60)
}

/// Response of the trigger endpoint.
///
/// `success` is false only for genuine failures; skips are successful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RunResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TriggerResponse {
    #[must_use]
    pub fn completed(result: RunResult) -> Self {
        Self {
            success: true,
            skipped: None,
            reason: None,
            remaining_seconds: None,
            message: result.summary(),
            data: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn skipped(reason: &SkipReason) -> Self {
        Self {
            success: true,
            skipped: Some(true),
            reason: Some(reason.code().to_string()),
            remaining_seconds: reason.remaining().map(|d| d.as_secs()),
            message: reason.to_string(),
            data: None,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            skipped: None,
            reason: None,
            remaining_seconds: None,
            message: message.into(),
            data: None,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn is_skip(&self) -> bool {
        self.skipped == Some(true)
    }
}
