//! Persistence seam for process revisions, executions and history.
//!
//! Every trait method is one transaction: multi-row writes commit together or
//! not at all, and readers never observe a partial batch.

mod error;
pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteStore;

use crate::config::RunbookConfig;
use crate::model::{
    Execution, ExecutionId, HistoryItem, NewHistoryItem, ProcessId, ProcessIdentity, Revision,
    RevisionId,
};

#[async_trait]
pub trait Datastore: Send + Sync + 'static {
    /// Insert a new identity together with its first revision.
    async fn insert_process(
        &self,
        identity: &ProcessIdentity,
        revision: &Revision,
    ) -> Result<(), StoreError>;

    /// Insert a further revision. Fails with `NotFound` when the identity
    /// referenced by `revision.process` does not exist.
    async fn insert_revision(&self, revision: &Revision) -> Result<(), StoreError>;

    async fn get_identity(&self, id: ProcessId) -> Result<Option<ProcessIdentity>, StoreError>;

    /// Revision of `id` with the latest `created_at`, ties broken by the most
    /// recent insert.
    async fn latest_revision(&self, id: ProcessId) -> Result<Option<Revision>, StoreError>;

    async fn get_revision(&self, revision: RevisionId) -> Result<Option<Revision>, StoreError>;

    /// Latest revision of every identity, ordered by identity creation.
    async fn list_latest_revisions(&self)
        -> Result<Vec<(ProcessIdentity, Revision)>, StoreError>;

    /// All revisions of one identity, newest first.
    async fn list_revisions(&self, id: ProcessId) -> Result<Vec<Revision>, StoreError>;

    /// Insert an execution and its initial history items in one transaction.
    async fn insert_execution(
        &self,
        execution: &Execution,
        initial_history: &[NewHistoryItem],
    ) -> Result<Vec<HistoryItem>, StoreError>;

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError>;

    /// Executions of any revision of `process`, newest first.
    async fn list_executions(&self, process: ProcessId) -> Result<Vec<Execution>, StoreError>;

    /// Append all `items` to the execution's log, or none of them. Returns the
    /// stored items with their assigned sequence numbers.
    async fn append_history(
        &self,
        execution: ExecutionId,
        items: &[NewHistoryItem],
    ) -> Result<Vec<HistoryItem>, StoreError>;

    /// The execution's history in insertion order.
    async fn history(&self, execution: ExecutionId) -> Result<Vec<HistoryItem>, StoreError>;

    /// Release connections on shutdown. Stores without external resources
    /// have nothing to do.
    async fn close(&self) {}
}

/// Open the datastore described by the configuration: SQLite when a database
/// is configured, otherwise an in-memory store.
#[cfg(feature = "database")]
pub async fn open_store(config: &RunbookConfig) -> anyhow::Result<Arc<dyn Datastore>> {
    if let Some(db_config) = &config.database {
        info!("Opening database at {}", db_config.url);
        let store = SqliteStore::connect(
            &db_config.url,
            db_config.max_connections,
            db_config.auto_migrate,
        )
        .await?;
        Ok(Arc::new(store))
    } else {
        info!("Database not configured, using in-memory store");
        Ok(Arc::new(MemoryStore::new()))
    }
}

#[cfg(not(feature = "database"))]
pub async fn open_store(config: &RunbookConfig) -> anyhow::Result<Arc<dyn Datastore>> {
    if config.database.is_some() {
        tracing::warn!("Database feature not enabled, ignoring database configuration");
    }
    info!("Using in-memory store");
    Ok(Arc::new(MemoryStore::new()))
}
