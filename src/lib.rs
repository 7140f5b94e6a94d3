// Runbook Library - process revisioning and execution tracking
// This exposes the core components for testing and integration

pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod marking;
pub mod model;
pub mod server;
pub mod store;
pub mod telemetry;
pub mod tracker;
pub mod view;

// Re-export key types for easy access
pub use clock::{Clock, ManualClock, SystemClock};
pub use self::config::{config, RunbookConfig};
pub use error::TrackerError;
pub use history::{execution_state, step_info, ExecutionState, StepExecutionInfo};
pub use lifecycle::{step_phase, StepPhase};
pub use marking::{plan_mark, plan_start, PlannedMark};
pub use model::{
    Execution, ExecutionId, HistoryItem, HistoryKind, NewHistoryItem, ProcessDefinition,
    ProcessId, ProcessIdentity, Revision, RevisionId, Step, StepKind, UserId,
};
pub use server::{router, start_server, AppState};
pub use store::{open_store, Datastore, MemoryStore, StoreError};
#[cfg(feature = "database")]
pub use store::SqliteStore;
pub use telemetry::{create_request_span, generate_correlation_id, init_telemetry};
pub use tracker::Tracker;
pub use view::{ExecutionSummary, ExecutionView, RevisionView};
