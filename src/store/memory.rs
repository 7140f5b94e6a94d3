use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Datastore, StoreError};
use crate::model::{
    Execution, ExecutionId, HistoryItem, NewHistoryItem, ProcessId, ProcessIdentity, Revision,
    RevisionId,
};

#[derive(Default)]
struct Tables {
    identities: Vec<ProcessIdentity>,
    // insertion order doubles as the tie-break sequence
    revisions: Vec<Revision>,
    executions: Vec<Execution>,
    history: Vec<HistoryItem>,
    next_seq: i64,
}

impl Tables {
    fn has_identity(&self, id: ProcessId) -> bool {
        self.identities.iter().any(|identity| identity.id == id)
    }

    fn latest_revision(&self, id: ProcessId) -> Option<&Revision> {
        self.revisions
            .iter()
            .enumerate()
            .filter(|(_, revision)| revision.process == id)
            .max_by(|(a_seq, a), (b_seq, b)| a.created_at.cmp(&b.created_at).then(a_seq.cmp(b_seq)))
            .map(|(_, revision)| revision)
    }

    fn append(&mut self, execution: ExecutionId, items: &[NewHistoryItem]) -> Vec<HistoryItem> {
        let stored: Vec<HistoryItem> = items
            .iter()
            .map(|item| {
                self.next_seq += 1;
                HistoryItem {
                    seq: self.next_seq,
                    execution,
                    kind: item.kind,
                    step_idx: item.step_idx,
                    at: item.at,
                    by: item.by.clone(),
                }
            })
            .collect();
        self.history.extend(stored.iter().cloned());
        stored
    }
}

/// Datastore kept entirely in process memory. Each call holds the table lock
/// for its whole batch, which makes every call atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn insert_process(
        &self,
        identity: &ProcessIdentity,
        revision: &Revision,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.has_identity(identity.id) {
            return Err(StoreError::Conflict(format!("process {} already exists", identity.id)));
        }
        tables.identities.push(identity.clone());
        tables.revisions.push(revision.clone());
        Ok(())
    }

    async fn insert_revision(&self, revision: &Revision) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.has_identity(revision.process) {
            return Err(StoreError::not_found("process", revision.process));
        }
        if tables.revisions.iter().any(|r| r.revision == revision.revision) {
            return Err(StoreError::Conflict(format!(
                "revision {} already exists",
                revision.revision
            )));
        }
        tables.revisions.push(revision.clone());
        Ok(())
    }

    async fn get_identity(&self, id: ProcessId) -> Result<Option<ProcessIdentity>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.identities.iter().find(|identity| identity.id == id).cloned())
    }

    async fn latest_revision(&self, id: ProcessId) -> Result<Option<Revision>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.latest_revision(id).cloned())
    }

    async fn get_revision(&self, revision: RevisionId) -> Result<Option<Revision>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.revisions.iter().find(|r| r.revision == revision).cloned())
    }

    async fn list_latest_revisions(
        &self,
    ) -> Result<Vec<(ProcessIdentity, Revision)>, StoreError> {
        let tables = self.tables.read().await;
        let mut identities: Vec<(usize, &ProcessIdentity)> =
            tables.identities.iter().enumerate().collect();
        identities.sort_by(|(a_seq, a), (b_seq, b)| {
            a.created_at.cmp(&b.created_at).then(a_seq.cmp(b_seq))
        });

        Ok(identities
            .into_iter()
            .filter_map(|(_, identity)| {
                tables
                    .latest_revision(identity.id)
                    .map(|revision| (identity.clone(), revision.clone()))
            })
            .collect())
    }

    async fn list_revisions(&self, id: ProcessId) -> Result<Vec<Revision>, StoreError> {
        let tables = self.tables.read().await;
        let mut revisions: Vec<(usize, &Revision)> = tables
            .revisions
            .iter()
            .enumerate()
            .filter(|(_, revision)| revision.process == id)
            .collect();
        revisions.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });
        Ok(revisions.into_iter().map(|(_, revision)| revision.clone()).collect())
    }

    async fn insert_execution(
        &self,
        execution: &Execution,
        initial_history: &[NewHistoryItem],
    ) -> Result<Vec<HistoryItem>, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.revisions.iter().any(|r| r.revision == execution.revision) {
            return Err(StoreError::not_found("revision", execution.revision));
        }
        tables.executions.push(execution.clone());
        Ok(tables.append(execution.id, initial_history))
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.executions.iter().find(|execution| execution.id == id).cloned())
    }

    async fn list_executions(&self, process: ProcessId) -> Result<Vec<Execution>, StoreError> {
        let tables = self.tables.read().await;
        let mut executions: Vec<(usize, &Execution)> = tables
            .executions
            .iter()
            .enumerate()
            .filter(|(_, execution)| {
                tables
                    .revisions
                    .iter()
                    .any(|r| r.revision == execution.revision && r.process == process)
            })
            .collect();
        executions.sort_by(|(a_seq, a), (b_seq, b)| {
            b.initiated_at.cmp(&a.initiated_at).then(b_seq.cmp(a_seq))
        });
        Ok(executions.into_iter().map(|(_, execution)| execution.clone()).collect())
    }

    async fn append_history(
        &self,
        execution: ExecutionId,
        items: &[NewHistoryItem],
    ) -> Result<Vec<HistoryItem>, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.executions.iter().any(|e| e.id == execution) {
            return Err(StoreError::not_found("execution", execution));
        }
        Ok(tables.append(execution, items))
    }

    async fn history(&self, execution: ExecutionId) -> Result<Vec<HistoryItem>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .history
            .iter()
            .filter(|item| item.execution == execution)
            .cloned()
            .collect())
    }
}
