//! Scheduler guard: the gates a trigger passes before a run may start
//!
//! Gate order for every trigger:
//! 1. rate limiter (minimum spacing between triggers)
//! 2. startup cooldown
//! 3. interval since the last successful run (persisted)
//! 4. run lock, see [`crate::application::run_lock`]
//!
//! Every gate answers with a [`SkipReason`] rather than an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::pipeline_config::PipelineConfig;
use crate::domain::run_result::SkipReason;

/// What the interval gate does when no run was ever recorded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialRunPolicy {
    /// Decline; an external scheduler seeds the first run
    #[default]
    Defer,
    /// Treat the interval as already elapsed
    RunImmediately,
}

#[derive(Debug, Clone, Copy)]
pub struct GuardSettings {
    pub min_trigger_spacing: Duration,
    pub startup_cooldown: Duration,
    pub initial_run_policy: InitialRunPolicy,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            min_trigger_spacing: Duration::from_secs(10),
            startup_cooldown: Duration::from_secs(60 * 60),
            initial_run_policy: InitialRunPolicy::Defer,
        }
    }
}

#[derive(Debug)]
pub struct SchedulerGuard {
    settings: GuardSettings,
    process_started: Instant,
    last_trigger: Mutex<Option<Instant>>,
}

impl SchedulerGuard {
    /// The startup cooldown is measured from this call.
    #[must_use]
    pub fn new(settings: GuardSettings) -> Self {
        Self {
            settings,
            process_started: Instant::now(),
            last_trigger: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    /// Gate 1. Records the trigger time only when the trigger passes, so a
    /// caller retrying faster than the spacing is not locked out forever.
    pub fn check_rate_limit(&self) -> Result<(), SkipReason> {
        let now = Instant::now();
        let mut last = self
            .last_trigger
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(previous) = *last {
            let elapsed = now.saturating_duration_since(previous);
            if elapsed < self.settings.min_trigger_spacing {
                return Err(SkipReason::RateLimited {
                    retry_in: self.settings.min_trigger_spacing - elapsed,
                });
            }
        }
        *last = Some(now);
        Ok(())
    }

    /// Gate 2
    pub fn check_startup_cooldown(&self) -> Result<(), SkipReason> {
        let uptime = Instant::now().saturating_duration_since(self.process_started);
        if uptime < self.settings.startup_cooldown {
            return Err(SkipReason::StartupCooldown {
                remaining: self.settings.startup_cooldown - uptime,
            });
        }
        Ok(())
    }

    /// Gate 3, evaluated against the persisted status row
    pub fn check_interval(&self, config: &PipelineConfig, now: DateTime<Utc>) -> Result<(), SkipReason> {
        let Some(last_run_at) = config.last_run_at else {
            return match self.settings.initial_run_policy {
                InitialRunPolicy::Defer => Err(SkipReason::NeverRun),
                InitialRunPolicy::RunImmediately => Ok(()),
            };
        };

        let elapsed = now.signed_duration_since(last_run_at);
        let interval = config.interval();
        if elapsed < interval {
            let remaining = (interval - elapsed).to_std().unwrap_or_default();
            return Err(SkipReason::IntervalNotElapsed { remaining });
        }
        Ok(())
    }
}
