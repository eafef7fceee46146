//! Two-phase pipeline executor
//!
//! Each table of a phase becomes an [`Operation`]; operations run strictly
//! one after another and the first failure aborts everything after it.
//! There is no per-table retry and no partial resume.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::application::progress_tracker::ProgressTracker;
use crate::domain::errors::ResyncError;
use crate::domain::progress::{ProgressUpdate, ResyncPhase};
use crate::domain::repositories::TableOperationAdapter;
use crate::domain::run_result::RunResult;
use crate::domain::table_order::{Direction, ResyncPlan};

/// One table's delete-all or insert-all
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operation {
    pub table: String,
    pub direction: Direction,
}

impl Operation {
    pub fn new(table: impl Into<String>, direction: Direction) -> Self {
        Self {
            table: table.into(),
            direction,
        }
    }
}

/// Executes a single operation and reports how many records it touched
#[async_trait]
pub trait OperationRunner: Send + Sync {
    async fn run(&self, operation: &Operation) -> Result<u64, ResyncError>;
}

/// Hooks invoked around each operation by [`run_ordered_operations`]
#[async_trait]
pub trait OperationObserver: Send + Sync {
    async fn starting(&self, index: usize, operation: &Operation);
    async fn finished(&self, index: usize, operation: &Operation, count: u64, total: u64);
}

/// Observer that ignores everything
pub struct NoopObserver;

#[async_trait]
impl OperationObserver for NoopObserver {
    async fn starting(&self, _index: usize, _operation: &Operation) {}
    async fn finished(&self, _index: usize, _operation: &Operation, _count: u64, _total: u64) {}
}

/// Runs `operations` in order and returns the summed count.
///
/// Stops at the first failing operation; nothing after it is attempted.
pub async fn run_ordered_operations<R, O>(
    operations: &[Operation],
    runner: &R,
    observer: &O,
) -> Result<u64, ResyncError>
where
    R: OperationRunner + ?Sized,
    O: OperationObserver + ?Sized,
{
    let mut total = 0_u64;
    for (index, operation) in operations.iter().enumerate() {
        observer.starting(index, operation).await;
        let count = runner.run(operation).await?;
        total += count;
        observer.finished(index, operation, count, total).await;
    }
    Ok(total)
}

/// Adapts a [`TableOperationAdapter`] to the [`OperationRunner`] contract.
///
/// `success: false` and transport errors are failures; `skipped: true`
/// counts as a zero-record success.
pub struct AdapterRunner {
    adapter: Arc<dyn TableOperationAdapter>,
}

impl AdapterRunner {
    #[must_use]
    pub fn new(adapter: Arc<dyn TableOperationAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl OperationRunner for AdapterRunner {
    async fn run(&self, operation: &Operation) -> Result<u64, ResyncError> {
        let table = operation.table.as_str();
        let response = match operation.direction {
            Direction::Delete => self.adapter.delete_all(table).await,
            Direction::Insert => self.adapter.insert_all(table).await,
        }
        .map_err(|e| ResyncError::adapter_failure(table, operation.direction, e.to_string()))?;

        if !response.success {
            return Err(ResyncError::adapter_failure(
                table,
                operation.direction,
                response.failure_cause(),
            ));
        }
        if response.skipped {
            debug!("{} skipped for {}: {}", operation.direction, table, response.message);
        }
        Ok(response.count())
    }
}

/// Feeds per-table progress into the tracker
struct TrackerObserver<'a> {
    tracker: &'a ProgressTracker,
    records_before_phase: u64,
}

#[async_trait]
impl<'a> OperationObserver for TrackerObserver<'a> {
    async fn starting(&self, _index: usize, operation: &Operation) {
        debug!("{} starting for table {}", operation.direction, operation.table);
        self.tracker
            .update(ProgressUpdate::default().current_table(Some(operation.table.clone())))
            .await;
    }

    async fn finished(&self, index: usize, operation: &Operation, count: u64, total: u64) {
        debug!("{} finished for table {} ({count} records)", operation.direction, operation.table);
        let completed = u32::try_from(index + 1).unwrap_or(u32::MAX);
        self.tracker
            .update(
                ProgressUpdate::default()
                    .tables_completed(completed)
                    .records_processed(self.records_before_phase + total),
            )
            .await;
    }
}

/// Drives deletion then insertion for one accepted run
pub struct PipelineExecutor {
    runner: Arc<dyn OperationRunner>,
    tracker: ProgressTracker,
}

impl PipelineExecutor {
    #[must_use]
    pub fn new(runner: Arc<dyn OperationRunner>, tracker: ProgressTracker) -> Self {
        Self { runner, tracker }
    }

    #[must_use]
    pub fn operations(plan: &ResyncPlan, direction: Direction) -> Vec<Operation> {
        plan.tables(direction)
            .iter()
            .map(|spec| Operation::new(spec.name.clone(), direction))
            .collect()
    }

    /// Runs both phases. The tracker must already be in the `deleting`
    /// phase (see `ProgressTracker::begin`).
    pub async fn execute(&self, plan: &ResyncPlan) -> Result<RunResult, ResyncError> {
        let deletions = Self::operations(plan, Direction::Delete);
        let insertions = Self::operations(plan, Direction::Insert);

        info!("Deletion phase: {} tables", deletions.len());
        let records_deleted = self.run_phase(&deletions, 0).await?;
        self.tracker
            .update(
                ProgressUpdate::default()
                    .phase(ResyncPhase::DeletionComplete)
                    .current_table(None),
            )
            .await;
        info!("Deletion phase complete: {records_deleted} records deleted");

        self.tracker
            .update(
                ProgressUpdate::default()
                    .phase(ResyncPhase::Inserting)
                    .tables_completed(0)
                    .total_tables(count_u32(insertions.len())),
            )
            .await;
        info!("Insertion phase: {} tables", insertions.len());
        let records_inserted = self.run_phase(&insertions, records_deleted).await?;
        info!("Insertion phase complete: {records_inserted} records inserted");

        let tables: HashSet<&str> = deletions
            .iter()
            .chain(insertions.iter())
            .map(|op| op.table.as_str())
            .collect();

        Ok(RunResult {
            records_deleted,
            records_inserted,
            tables_processed: count_u32(tables.len()),
            timestamp: Utc::now(),
        })
    }

    async fn run_phase(&self, operations: &[Operation], records_before_phase: u64) -> Result<u64, ResyncError> {
        let observer = TrackerObserver {
            tracker: &self.tracker,
            records_before_phase,
        };
        run_ordered_operations(operations, self.runner.as_ref(), &observer)
            .await
            .inspect_err(|e| error!("Resync aborted: {e}"))
    }
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
