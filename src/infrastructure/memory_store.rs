//! In-memory run status store
//!
//! Loses its state on restart, so the interval gate starts from scratch
//! every time the process starts. Suitable for single-process setups
//! without a database and for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::domain::pipeline_config::{PipelineConfig, RunStatus, SettingsUpdate};
use crate::domain::repositories::RunStatusRepository;

#[derive(Debug, Default)]
pub struct InMemoryRunStatusRepository {
    config: Mutex<PipelineConfig>,
    fail_reads: AtomicBool,
}

impl InMemoryRunStatusRepository {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: Mutex::new(config),
            fail_reads: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_last_run(enabled: bool, interval_minutes: u32, last_run_at: Option<DateTime<Utc>>) -> Self {
        Self::new(PipelineConfig {
            last_run_at,
            last_status: if last_run_at.is_some() { RunStatus::Success } else { RunStatus::None },
            ..PipelineConfig::new(enabled, interval_minutes)
        })
    }

    /// Makes `load` fail, simulating an unreachable store
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn with_config<T>(&self, f: impl FnOnce(&mut PipelineConfig) -> T) -> T {
        let mut config = self
            .config
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut config)
    }
}

#[async_trait]
impl RunStatusRepository for InMemoryRunStatusRepository {
    async fn load(&self) -> Result<PipelineConfig> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("status store unavailable"));
        }
        Ok(self.with_config(|c| c.clone()))
    }

    async fn mark_pending(&self, message: &str) -> Result<()> {
        self.with_config(|c| {
            c.last_status = RunStatus::Pending;
            c.last_message = message.to_string();
        });
        Ok(())
    }

    async fn mark_success(&self, finished_at: DateTime<Utc>, message: &str) -> Result<()> {
        self.with_config(|c| {
            c.last_run_at = Some(finished_at);
            c.last_status = RunStatus::Success;
            c.last_message = message.to_string();
        });
        Ok(())
    }

    async fn mark_error(&self, message: &str) -> Result<()> {
        self.with_config(|c| {
            c.last_status = RunStatus::Error;
            c.last_message = message.to_string();
        });
        Ok(())
    }

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<PipelineConfig> {
        if update.interval_minutes == Some(0) {
            return Err(anyhow!("interval must be at least one minute"));
        }
        Ok(self.with_config(|c| {
            if let Some(enabled) = update.enabled {
                c.enabled = enabled;
            }
            if let Some(interval) = update.interval_minutes {
                c.interval_minutes = interval;
            }
            c.clone()
        }))
    }

    async fn recover_interrupted(&self, message: &str) -> Result<bool> {
        Ok(self.with_config(|c| {
            if c.last_status == RunStatus::Pending {
                c.last_status = RunStatus::Error;
                c.last_message = message.to_string();
                true
            } else {
                false
            }
        }))
    }
}
