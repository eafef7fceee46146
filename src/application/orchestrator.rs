//! Resync orchestrator
//!
//! Owns every piece of mutable pipeline state (lock, progress, guard
//! clocks) so independent instances never share anything. Control flow per
//! trigger:
//!
//! gates -> mark pending -> delete phase -> insert phase -> record outcome
//! -> schedule progress reset -> release lock
//!
//! Everything after the lock is acquired runs on its own task, so a caller
//! that stops waiting (client disconnect, proxy timeout) does not cut the
//! run short or leave the status row at `pending`.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::application::executor::{AdapterRunner, OperationRunner, PipelineExecutor};
use crate::application::progress_tracker::ProgressTracker;
use crate::application::run_lock::{RunLock, RunLockState};
use crate::application::scheduler_guard::{GuardSettings, SchedulerGuard};
use crate::domain::errors::ResyncError;
use crate::domain::pipeline_config::{PipelineConfig, SettingsUpdate};
use crate::domain::progress::{ProgressState, ProgressUpdate, ResyncPhase};
use crate::domain::repositories::{RunStatusRepository, TableOperationAdapter};
use crate::domain::run_result::{RunResult, SkipReason, TriggerResponse};
use crate::domain::table_order::ResyncPlan;

pub const INTERRUPTED_RUN_MESSAGE: &str = "Previous run was interrupted before completion";

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub guard: GuardSettings,
    pub max_run_duration: Duration,
    pub progress_retention: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            guard: GuardSettings::default(),
            max_run_duration: Duration::from_secs(10 * 60),
            progress_retention: Duration::from_secs(10 * 60),
        }
    }
}

pub struct ResyncOrchestrator {
    guard: SchedulerGuard,
    lock: RunLock,
    run: RunContext,
}

/// Owned handles for one accepted run, moved onto the run task
#[derive(Clone)]
struct RunContext {
    plan: Arc<ResyncPlan>,
    tracker: ProgressTracker,
    store: Arc<dyn RunStatusRepository>,
    executor: Arc<PipelineExecutor>,
    progress_retention: Duration,
}

impl ResyncOrchestrator {
    #[must_use]
    pub fn new(
        plan: ResyncPlan,
        adapter: Arc<dyn TableOperationAdapter>,
        store: Arc<dyn RunStatusRepository>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self::with_runner(plan, Arc::new(AdapterRunner::new(adapter)), store, settings)
    }

    /// Same as [`Self::new`] but with an arbitrary operation runner
    #[must_use]
    pub fn with_runner(
        plan: ResyncPlan,
        runner: Arc<dyn OperationRunner>,
        store: Arc<dyn RunStatusRepository>,
        settings: OrchestratorSettings,
    ) -> Self {
        let tracker = ProgressTracker::new();
        Self {
            guard: SchedulerGuard::new(settings.guard),
            lock: RunLock::new(settings.max_run_duration),
            run: RunContext {
                plan: Arc::new(plan),
                executor: Arc::new(PipelineExecutor::new(runner, tracker.clone())),
                tracker,
                store,
                progress_retention: settings.progress_retention,
            },
        }
    }

    #[must_use]
    pub fn plan(&self) -> &ResyncPlan {
        &self.run.plan
    }

    #[must_use]
    pub const fn tracker(&self) -> &ProgressTracker {
        &self.run.tracker
    }

    pub async fn progress(&self) -> ProgressState {
        self.run.tracker.snapshot().await
    }

    pub async fn lock_state(&self) -> RunLockState {
        self.lock.state().await
    }

    pub async fn status(&self) -> Result<PipelineConfig> {
        self.run.store.load().await
    }

    pub async fn update_settings(&self, update: &SettingsUpdate) -> Result<PipelineConfig> {
        let updated = self.run.store.update_settings(update).await?;
        info!(
            "Resync settings updated: enabled={}, interval={}min",
            updated.enabled, updated.interval_minutes
        );
        Ok(updated)
    }

    /// Call once at startup, before serving triggers.
    pub async fn recover_interrupted_run(&self) -> Result<bool> {
        let recovered = self.run.store.recover_interrupted(INTERRUPTED_RUN_MESSAGE).await?;
        if recovered {
            warn!("Found a resync left pending by a previous process; marked it as error");
        }
        Ok(recovered)
    }

    /// Evaluates the gates and, if they all pass, performs a full run.
    pub async fn trigger(&self) -> TriggerResponse {
        if let Err(reason) = self.guard.check_rate_limit() {
            return Self::skip(&reason);
        }
        if let Err(reason) = self.guard.check_startup_cooldown() {
            return Self::skip(&reason);
        }

        let config = match self.run.store.load().await {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to read resync status: {e:#}");
                return TriggerResponse::failed("Failed to read resync status", format!("{e:#}"));
            }
        };
        if !config.enabled {
            return Self::skip(&SkipReason::Disabled);
        }
        if let Err(reason) = self.guard.check_interval(&config, Utc::now()) {
            return Self::skip(&reason);
        }

        let lock = match self.lock.try_acquire().await {
            Ok(lock) => lock,
            Err(reason) => return Self::skip(&reason),
        };

        let plan = &self.run.plan;
        info!("Resync starting ({} delete / {} insert tables)", plan.deletion().len(), plan.insertion().len());

        let run = self.run.clone();
        let task = tokio::spawn(async move {
            let outcome = run.execute().await;
            // Registered before the lock is released so a run that acquires
            // it next always cancels this reset.
            run.tracker.schedule_reset(run.progress_retention).await;
            lock.release().await;
            outcome
        });

        match task.await {
            Ok(Ok(result)) => TriggerResponse::completed(result),
            Ok(Err(e)) => TriggerResponse::failed("Resync failed", e.to_string()),
            Err(e) => {
                error!("Resync task ended abnormally: {e}");
                TriggerResponse::failed("Resync failed", e.to_string())
            }
        }
    }

    fn skip(reason: &SkipReason) -> TriggerResponse {
        info!("Resync trigger skipped: {reason}");
        TriggerResponse::skipped(reason)
    }
}

impl RunContext {
    /// Runs both phases and records the outcome. The caller holds the lock.
    async fn execute(&self) -> Result<RunResult, ResyncError> {
        self.store
            .mark_pending("Resync in progress")
            .await
            .map_err(|e| ResyncError::status_store("marking run pending", e))?;

        self.tracker
            .begin(ProgressState {
                phase: ResyncPhase::Deleting,
                current_table: None,
                tables_completed: 0,
                total_tables: u32::try_from(self.plan.deletion().len()).unwrap_or(u32::MAX),
                records_processed: 0,
                started_at: Some(Utc::now()),
                error: None,
            })
            .await;

        match self.executor.execute(&self.plan).await {
            Ok(result) => {
                self.tracker
                    .update(
                        ProgressUpdate::default()
                            .phase(ResyncPhase::Complete)
                            .current_table(None),
                    )
                    .await;
                self.store
                    .mark_success(result.timestamp, &result.summary())
                    .await
                    .map_err(|e| ResyncError::status_store("recording successful run", e))?;
                info!("{}", result.summary());
                Ok(result)
            }
            Err(e) => {
                self.tracker
                    .update(
                        ProgressUpdate::default()
                            .phase(ResyncPhase::Failed)
                            .current_table(None)
                            .error(e.to_string()),
                    )
                    .await;
                let message = format!("Resync failed: {e}");
                if let Err(store_err) = self.store.mark_error(&message).await {
                    error!("Could not record failed run: {store_err:#}");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pipeline_config::RunStatus;
    use crate::infrastructure::memory_store::InMemoryRunStatusRepository;
    use crate::test_utils::{ScriptedAdapter, immediate_settings};

    fn orchestrator(adapter: ScriptedAdapter, store: Arc<InMemoryRunStatusRepository>) -> ResyncOrchestrator {
        ResyncOrchestrator::new(
            ResyncPlan::new(["A", "B", "C"], ["C", "B", "A"]),
            Arc::new(adapter),
            store,
            immediate_settings(),
        )
    }

    #[tokio::test]
    async fn disabled_config_is_a_skip() {
        let store = Arc::new(InMemoryRunStatusRepository::with_last_run(false, 60, Some(Utc::now() - chrono::Duration::hours(2))));
        let adapter = ScriptedAdapter::new();
        let orch = orchestrator(adapter.clone(), store);

        let resp = orch.trigger().await;
        assert!(resp.success);
        assert!(resp.is_skip());
        assert_eq!(resp.reason.as_deref(), Some("disabled"));
        assert!(adapter.calls().is_empty());
    }

    #[tokio::test]
    async fn store_read_failure_is_a_failure() {
        let store = Arc::new(InMemoryRunStatusRepository::default());
        store.fail_reads(true);
        let orch = orchestrator(ScriptedAdapter::new(), store);

        let resp = orch.trigger().await;
        assert!(!resp.success);
        assert!(resp.error.is_some());
    }

    #[tokio::test]
    async fn failed_run_keeps_last_run_at() {
        let last = Utc::now() - chrono::Duration::hours(2);
        let store = Arc::new(InMemoryRunStatusRepository::with_last_run(true, 60, Some(last)));
        let adapter = ScriptedAdapter::new().fail_delete("B", "constraint violation");
        let orch = orchestrator(adapter, store.clone());

        let resp = orch.trigger().await;
        assert!(!resp.success);
        assert!(resp.error.as_deref().unwrap_or_default().contains("'B'"));

        let cfg = store.load().await.unwrap();
        assert_eq!(cfg.last_status, RunStatus::Error);
        assert_eq!(cfg.last_run_at, Some(last));
        assert!(cfg.last_message.contains("B"));
    }

    #[tokio::test]
    async fn failed_run_leaves_a_terminal_progress_state() {
        let store = Arc::new(InMemoryRunStatusRepository::with_last_run(true, 60, Some(Utc::now() - chrono::Duration::hours(2))));
        let orch = orchestrator(ScriptedAdapter::new().fail_insert("B", "FK violation"), store);

        assert!(!orch.trigger().await.success);

        let progress = orch.progress().await;
        assert_eq!(progress.phase, ResyncPhase::Failed);
        assert!(progress.current_table.is_none());
        let cause = progress.error.expect("failure recorded in progress");
        assert!(cause.contains("'B'") && cause.contains("FK violation"), "{cause}");
    }

    #[tokio::test(start_paused = true)]
    async fn run_started_as_soon_as_the_lock_frees_keeps_its_progress() {
        let store = Arc::new(InMemoryRunStatusRepository::with_last_run(true, 60, Some(Utc::now() - chrono::Duration::hours(2))));
        let adapter = ScriptedAdapter::new()
            .fail_delete("A", "boom")
            .with_delay(Duration::from_secs(5));
        let orch = Arc::new(orchestrator(adapter, store));

        let failing = tokio::spawn({
            let orch = orch.clone();
            async move { orch.trigger().await }
        });
        while !orch.lock_state().await.held {
            tokio::task::yield_now().await;
        }
        while orch.lock_state().await.held {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        // A newer run begins the moment the lock is observed free.
        orch.tracker()
            .begin(ProgressState {
                phase: ResyncPhase::Deleting,
                total_tables: 3,
                ..ProgressState::default()
            })
            .await;
        assert!(!failing.await.unwrap().success);

        tokio::time::sleep(Duration::from_secs(700)).await;
        assert_eq!(orch.progress().await.phase, ResyncPhase::Deleting);
    }

    #[tokio::test]
    async fn recovers_a_pending_row_left_by_a_crash() {
        let store = Arc::new(InMemoryRunStatusRepository::default());
        store.mark_pending("Resync in progress").await.unwrap();
        let orch = orchestrator(ScriptedAdapter::new(), store.clone());

        assert!(orch.recover_interrupted_run().await.unwrap());
        let cfg = store.load().await.unwrap();
        assert_eq!(cfg.last_status, RunStatus::Error);
        assert_eq!(cfg.last_message, INTERRUPTED_RUN_MESSAGE);

        assert!(!orch.recover_interrupted_run().await.unwrap());
    }
}
