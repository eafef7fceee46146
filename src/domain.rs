//! Domain module - pipeline data model and collaborator interfaces
//!
//! Each module is its own file in the domain/ directory; commonly used
//! items are re-exported here.

pub mod errors;
pub mod pipeline_config;
pub mod progress;
pub mod repositories;
pub mod run_result;
pub mod table_order;

pub use errors::{AdapterError, ResyncError};
pub use pipeline_config::{PipelineConfig, RunStatus, SettingsUpdate};
pub use progress::{ProgressState, ProgressUpdate, ResyncPhase};
pub use repositories::{AdapterResponse, RunStatusRepository, TableOperationAdapter};
pub use run_result::{RunResult, SkipReason, TriggerResponse};
pub use table_order::{Direction, ResyncPlan, TableSpec, DELETION_ORDER, FOREIGN_KEYS, INSERTION_ORDER};
