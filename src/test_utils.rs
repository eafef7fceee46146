//! Test helpers shared by unit and integration tests
//!
//! `ScriptedAdapter` stands in for the remote table operation service: every
//! table answers with a scripted count, failure or skip, and every call is
//! recorded in order.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::application::orchestrator::OrchestratorSettings;
use crate::application::scheduler_guard::{GuardSettings, InitialRunPolicy};
use crate::domain::errors::AdapterError;
use crate::domain::repositories::{AdapterResponse, TableOperationAdapter};
use crate::domain::table_order::Direction;

#[derive(Debug, Clone)]
enum Script {
    Respond(AdapterResponse),
    Fail(AdapterError),
}

#[derive(Debug, Default)]
struct Inner {
    scripts: HashMap<(Direction, String), Script>,
    calls: Vec<(Direction, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedAdapter {
    inner: Arc<Mutex<Inner>>,
    delay: Option<Duration>,
}

impl ScriptedAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(self, direction: Direction, table: &str, script: Script) -> Self {
        self.lock().scripts.insert((direction, table.to_string()), script);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn delete(self, table: &str, count: u64) -> Self {
        self.script(Direction::Delete, table, Script::Respond(AdapterResponse::deleted(count)))
    }

    #[must_use]
    pub fn insert(self, table: &str, count: u64) -> Self {
        self.script(Direction::Insert, table, Script::Respond(AdapterResponse::inserted(count)))
    }

    /// Responds `success: false`
    #[must_use]
    pub fn fail_delete(self, table: &str, error: &str) -> Self {
        self.script(Direction::Delete, table, Script::Respond(AdapterResponse::failure(error)))
    }

    #[must_use]
    pub fn fail_insert(self, table: &str, error: &str) -> Self {
        self.script(Direction::Insert, table, Script::Respond(AdapterResponse::failure(error)))
    }

    /// Fails before producing a response, like a dropped connection
    #[must_use]
    pub fn transport_error(self, direction: Direction, table: &str) -> Self {
        self.script(
            direction,
            table,
            Script::Fail(AdapterError::Transport("connection reset by peer".into())),
        )
    }

    #[must_use]
    pub fn skip_insert(self, table: &str) -> Self {
        self.script(
            Direction::Insert,
            table,
            Script::Respond(AdapterResponse::skipped("source table empty")),
        )
    }

    /// Every call sleeps this long before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Calls received so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<(Direction, String)> {
        self.lock().calls.clone()
    }

    #[must_use]
    pub fn calls_for(&self, direction: Direction) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(d, _)| *d == direction)
            .map(|(_, t)| t)
            .collect()
    }

    async fn answer(&self, direction: Direction, table: &str) -> Result<AdapterResponse, AdapterError> {
        let script = {
            let mut inner = self.lock();
            inner.calls.push((direction, table.to_string()));
            inner.scripts.get(&(direction, table.to_string())).cloned()
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match script {
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::Fail(error)) => Err(error),
            None => Ok(match direction {
                Direction::Delete => AdapterResponse::deleted(0),
                Direction::Insert => AdapterResponse::inserted(0),
            }),
        }
    }
}

#[async_trait]
impl TableOperationAdapter for ScriptedAdapter {
    async fn delete_all(&self, table: &str) -> Result<AdapterResponse, AdapterError> {
        self.answer(Direction::Delete, table).await
    }

    async fn insert_all(&self, table: &str) -> Result<AdapterResponse, AdapterError> {
        self.answer(Direction::Insert, table).await
    }
}

/// Production spacing and lock limits, but no startup cooldown
#[must_use]
pub fn immediate_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        guard: GuardSettings {
            min_trigger_spacing: Duration::from_secs(10),
            startup_cooldown: Duration::ZERO,
            initial_run_policy: InitialRunPolicy::Defer,
        },
        max_run_duration: Duration::from_secs(600),
        progress_retention: Duration::from_secs(600),
    }
}
