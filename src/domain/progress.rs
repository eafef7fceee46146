//! In-flight run progress as seen by polling clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum ResyncPhase {
    #[default]
    Idle,
    Deleting,
    DeletionComplete,
    Inserting,
    Complete,
    /// Terminal state of an aborted run; `error` carries the cause
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    pub phase: ResyncPhase,
    pub current_table: Option<String>,
    pub tables_completed: u32,
    pub total_tables: u32,
    pub records_processed: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ProgressState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.phase == ResyncPhase::Idle
    }

    /// Merges the fields present in `update`, leaving the rest untouched
    pub fn apply(&mut self, update: ProgressUpdate) {
        if let Some(phase) = update.phase {
            self.phase = phase;
        }
        if let Some(current_table) = update.current_table {
            self.current_table = current_table;
        }
        if let Some(tables_completed) = update.tables_completed {
            self.tables_completed = tables_completed;
        }
        if let Some(total_tables) = update.total_tables {
            self.total_tables = total_tables;
        }
        if let Some(records_processed) = update.records_processed {
            self.records_processed = records_processed;
        }
        if let Some(started_at) = update.started_at {
            self.started_at = Some(started_at);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
    }
}

/// Partial update of [`ProgressState`].
///
/// `current_table` is doubly optional so an update can clear it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub phase: Option<ResyncPhase>,
    pub current_table: Option<Option<String>>,
    pub tables_completed: Option<u32>,
    pub total_tables: Option<u32>,
    pub records_processed: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ProgressUpdate {
    #[must_use]
    pub fn phase(mut self, phase: ResyncPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    #[must_use]
    pub fn current_table(mut self, table: Option<String>) -> Self {
        self.current_table = Some(table);
        self
    }

    #[must_use]
    pub const fn tables_completed(mut self, n: u32) -> Self {
        self.tables_completed = Some(n);
        self
    }

    #[must_use]
    pub const fn total_tables(mut self, n: u32) -> Self {
        self.total_tables = Some(n);
        self
    }

    #[must_use]
    pub const fn records_processed(mut self, n: u64) -> Self {
        self.records_processed = Some(n);
        self
    }

    #[must_use]
    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    #[must_use]
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_keeps_fields_missing_from_the_update() {
        let started = Utc::now();
        let mut state = ProgressState::default();
        state.apply(
            ProgressUpdate::default()
                .phase(ResyncPhase::Deleting)
                .started_at(started)
                .total_tables(5),
        );
        state.apply(
            ProgressUpdate::default()
                .phase(ResyncPhase::Inserting)
                .tables_completed(0),
        );

        assert_eq!(state.phase, ResyncPhase::Inserting);
        assert_eq!(state.started_at, Some(started));
        assert_eq!(state.total_tables, 5);
    }

    #[test]
    fn apply_can_clear_the_current_table() {
        let mut state = ProgressState {
            current_table: Some("orders".into()),
            ..ProgressState::default()
        };
        state.apply(ProgressUpdate::default().current_table(None));
        assert!(state.current_table.is_none());
    }

    #[test]
    fn failed_state_serializes_the_cause() {
        let mut state = ProgressState {
            phase: ResyncPhase::Inserting,
            current_table: Some("orders".into()),
            ..ProgressState::default()
        };
        state.apply(
            ProgressUpdate::default()
                .phase(ResyncPhase::Failed)
                .current_table(None)
                .error("insert failed for orders"),
        );

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["phase"], "failed");
        assert!(json["currentTable"].is_null());
        assert_eq!(json["error"], "insert failed for orders");
    }

    #[test]
    fn phase_serializes_kebab_case() {
        let json = serde_json::to_string(&ResyncPhase::DeletionComplete).unwrap();
        assert_eq!(json, "\"deletion-complete\"");
    }
}
