//! End-to-end behavior of the resync orchestrator against scripted adapters

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use storefront_resync::application::ResyncOrchestrator;
use storefront_resync::domain::{
    Direction, ProgressState, ResyncPhase, ResyncPlan, RunStatus, RunStatusRepository,
};
use storefront_resync::infrastructure::InMemoryRunStatusRepository;
use storefront_resync::test_utils::{ScriptedAdapter, immediate_settings};

fn store_due() -> Arc<InMemoryRunStatusRepository> {
    Arc::new(InMemoryRunStatusRepository::with_last_run(
        true,
        60,
        Some(Utc::now() - ChronoDuration::hours(2)),
    ))
}

fn orchestrator(
    plan: ResyncPlan,
    adapter: &ScriptedAdapter,
    store: &Arc<InMemoryRunStatusRepository>,
) -> Arc<ResyncOrchestrator> {
    Arc::new(ResyncOrchestrator::new(
        plan,
        Arc::new(adapter.clone()),
        store.clone(),
        immediate_settings(),
    ))
}

fn five_tables() -> ResyncPlan {
    ResyncPlan::new(["t0", "t1", "t2", "t3", "t4"], ["t4", "t3", "t2", "t1", "t0"])
}

#[tokio::test]
async fn end_to_end_success_reports_totals() {
    let adapter = ScriptedAdapter::new()
        .delete("A", 10)
        .delete("B", 5)
        .delete("C", 2)
        .insert("C", 2)
        .insert("B", 5)
        .insert("A", 10);
    let store = store_due();
    let orch = orchestrator(ResyncPlan::new(["A", "B", "C"], ["C", "B", "A"]), &adapter, &store);

    let response = orch.trigger().await;

    assert!(response.success, "{response:?}");
    assert!(!response.is_skip());
    let data = response.data.expect("run result");
    assert_eq!(data.records_deleted, 17);
    assert_eq!(data.records_inserted, 17);
    assert_eq!(data.tables_processed, 3);

    let config = store.load().await.unwrap();
    assert_eq!(config.last_status, RunStatus::Success);
    assert_eq!(config.last_run_at, Some(data.timestamp));

    assert_eq!(adapter.calls_for(Direction::Delete), ["A", "B", "C"]);
    assert_eq!(adapter.calls_for(Direction::Insert), ["C", "B", "A"]);

    let progress = orch.progress().await;
    assert_eq!(progress.phase, ResyncPhase::Complete);
    assert_eq!(progress.records_processed, 34);
}

#[tokio::test]
async fn deletion_failure_aborts_the_rest_of_the_run() {
    let adapter = ScriptedAdapter::new().fail_delete("t3", "foreign key constraint failed");
    let store = store_due();
    let orch = orchestrator(five_tables(), &adapter, &store);

    let response = orch.trigger().await;

    assert!(!response.success);
    assert!(response.error.as_deref().unwrap_or_default().contains("t3"));
    assert_eq!(adapter.calls_for(Direction::Delete), ["t0", "t1", "t2", "t3"]);
    assert!(adapter.calls_for(Direction::Insert).is_empty());

    let config = store.load().await.unwrap();
    assert_eq!(config.last_status, RunStatus::Error);
    assert!(config.last_message.contains("t3"));
}

#[tokio::test]
async fn transport_error_is_fatal_like_a_reported_failure() {
    let adapter = ScriptedAdapter::new().transport_error(Direction::Insert, "t1");
    let store = store_due();
    let orch = orchestrator(five_tables(), &adapter, &store);

    let response = orch.trigger().await;

    assert!(!response.success);
    assert_eq!(adapter.calls_for(Direction::Insert), ["t4", "t3", "t2", "t1"]);
    assert_eq!(store.load().await.unwrap().last_status, RunStatus::Error);
}

#[tokio::test]
async fn skipped_tables_count_as_zero_and_continue() {
    let adapter = ScriptedAdapter::new().delete("A", 3).skip_insert("A").insert("B", 4);
    let store = store_due();
    let orch = orchestrator(ResyncPlan::new(["A"], ["B", "A"]), &adapter, &store);

    let response = orch.trigger().await;

    let data = response.data.expect("run result");
    assert_eq!(data.records_deleted, 3);
    assert_eq!(data.records_inserted, 4);
    assert_eq!(data.tables_processed, 2);
}

#[tokio::test(start_paused = true)]
async fn lock_is_released_after_a_failed_run() {
    let adapter = ScriptedAdapter::new().fail_delete("t2", "boom");
    let store = store_due();
    let orch = orchestrator(five_tables(), &adapter, &store);

    assert!(!orch.trigger().await.success);
    assert!(!orch.lock_state().await.held);

    tokio::time::advance(Duration::from_secs(11)).await;
    let retry = orch.trigger().await;

    assert!(!retry.is_skip(), "{retry:?}");
    assert_eq!(adapter.calls_for(Direction::Delete), ["t0", "t1", "t2", "t0", "t1", "t2"]);
}

#[tokio::test]
async fn back_to_back_triggers_run_once() {
    let adapter = ScriptedAdapter::new().delete("A", 1).insert("A", 1);
    let store = store_due();
    let orch = orchestrator(ResyncPlan::new(["A"], ["A"]), &adapter, &store);

    let first = orch.trigger().await;
    let after_first = store.load().await.unwrap();
    let second = orch.trigger().await;

    assert!(first.success && !first.is_skip());
    assert!(second.success && second.is_skip());
    assert_eq!(second.reason.as_deref(), Some("rate_limited"));
    assert_eq!(adapter.calls().len(), 2);
    assert_eq!(store.load().await.unwrap(), after_first);
}

#[tokio::test(start_paused = true)]
async fn trigger_during_a_run_is_skipped_by_the_lock() {
    let adapter = ScriptedAdapter::new().with_delay(Duration::from_secs(30));
    let store = store_due();
    let orch = orchestrator(ResyncPlan::new(["A"], ["A"]), &adapter, &store);

    let running = tokio::spawn({
        let orch = orch.clone();
        async move { orch.trigger().await }
    });
    while !orch.lock_state().await.held {
        tokio::task::yield_now().await;
    }

    tokio::time::advance(Duration::from_secs(11)).await;
    let concurrent = orch.trigger().await;
    assert!(concurrent.success && concurrent.is_skip());
    assert_eq!(concurrent.reason.as_deref(), Some("run_in_progress"));

    let finished = running.await.unwrap();
    assert!(finished.success && !finished.is_skip());
    assert_eq!(adapter.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn run_completes_when_the_caller_stops_waiting() {
    let adapter = ScriptedAdapter::new().with_delay(Duration::from_secs(30));
    let store = store_due();
    let orch = orchestrator(ResyncPlan::new(["A", "B", "C"], ["C", "B", "A"]), &adapter, &store);

    let waited = tokio::time::timeout(Duration::from_secs(45), orch.trigger()).await;
    assert!(waited.is_err(), "run should still be in flight at 45s");
    assert_eq!(store.load().await.unwrap().last_status, RunStatus::Pending);

    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(adapter.calls_for(Direction::Delete), ["A", "B", "C"]);
    assert_eq!(adapter.calls_for(Direction::Insert), ["C", "B", "A"]);
    let config = store.load().await.unwrap();
    assert_eq!(config.last_status, RunStatus::Success);
    assert!(config.last_run_at.is_some());
    assert!(!orch.lock_state().await.held);
    assert!(orch.progress().await.is_idle());
}

#[tokio::test(start_paused = true)]
async fn failed_run_is_visible_until_the_retention_window_ends() {
    let adapter = ScriptedAdapter::new().fail_delete("t2", "constraint violation");
    let store = store_due();
    let orch = orchestrator(five_tables(), &adapter, &store);

    assert!(!orch.trigger().await.success);
    let progress = orch.progress().await;
    assert_eq!(progress.phase, ResyncPhase::Failed);
    assert_eq!(progress.current_table, None);
    assert!(progress.error.as_deref().unwrap_or_default().contains("t2"));

    tokio::time::sleep(Duration::from_secs(601)).await;
    let progress = orch.progress().await;
    assert!(progress.is_idle());
    assert_eq!(progress.error, None);
}

#[tokio::test]
async fn interval_skip_reports_remaining_wait_without_locking() {
    let adapter = ScriptedAdapter::new();
    let store = Arc::new(InMemoryRunStatusRepository::with_last_run(
        true,
        60,
        Some(Utc::now() - ChronoDuration::minutes(30)),
    ));
    let orch = orchestrator(ResyncPlan::storefront(), &adapter, &store);

    let response = orch.trigger().await;

    assert!(response.success);
    assert_eq!(response.skipped, Some(true));
    let remaining = response.remaining_seconds.expect("remaining wait");
    assert!((29 * 60..=30 * 60).contains(&remaining), "remaining = {remaining}");
    assert!(response.message.contains("30 minutes"));
    assert!(!orch.lock_state().await.held);
    assert!(adapter.calls().is_empty());
    assert_eq!(store.load().await.unwrap().last_status, RunStatus::Success);
}

#[tokio::test]
async fn progress_counts_each_table_once_per_phase() {
    let adapter = ScriptedAdapter::new();
    let store = store_due();
    let orch = orchestrator(five_tables(), &adapter, &store);
    let mut events = orch.tracker().subscribe();

    assert!(orch.trigger().await.success);

    let mut seen: Vec<ProgressState> = Vec::new();
    while let Ok(state) = events.try_recv() {
        seen.push(state);
    }

    for phase in [ResyncPhase::Deleting, ResyncPhase::Inserting] {
        let mut completed: Vec<u32> = seen
            .iter()
            .filter(|s| s.phase == phase)
            .map(|s| s.tables_completed)
            .collect();
        assert!(completed.windows(2).all(|w| w[0] <= w[1]), "{phase:?}: {completed:?}");
        completed.dedup();
        assert_eq!(completed, [0, 1, 2, 3, 4, 5], "{phase:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn progress_is_retained_then_reset() {
    let adapter = ScriptedAdapter::new();
    let store = store_due();
    let orch = orchestrator(ResyncPlan::new(["A"], ["A"]), &adapter, &store);

    assert!(orch.trigger().await.success);
    assert_eq!(orch.progress().await.phase, ResyncPhase::Complete);

    tokio::time::sleep(Duration::from_secs(599)).await;
    assert_eq!(orch.progress().await.phase, ResyncPhase::Complete);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(orch.progress().await.is_idle());
}
