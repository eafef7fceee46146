//! Application layer module
//!
//! Scheduling policy, run lock, progress tracking and the two-phase
//! executor, composed by the orchestrator.

pub mod executor;
pub mod orchestrator;
pub mod progress_tracker;
pub mod run_lock;
pub mod scheduler_guard;
pub mod state;

pub use executor::{run_ordered_operations, AdapterRunner, Operation, OperationRunner, PipelineExecutor};
pub use orchestrator::{OrchestratorSettings, ResyncOrchestrator};
pub use progress_tracker::ProgressTracker;
pub use run_lock::{RunLock, RunLockGuard};
pub use scheduler_guard::{GuardSettings, InitialRunPolicy, SchedulerGuard};
pub use state::AppState;
