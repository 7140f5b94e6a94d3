//! Process revisioning and execution tracking over a [`Datastore`].
//!
//! Caller identity is passed explicitly to every mutating operation. Each
//! write is a single datastore call, so a mark and its cascade are committed
//! together, and any validation failure happens before anything is written.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::TrackerError;
use crate::marking::{plan_mark, plan_start, PlannedMark};
use crate::model::{
    Execution, ExecutionId, HistoryKind, NewHistoryItem, ProcessDefinition, ProcessId,
    ProcessIdentity, Revision, RevisionId, UserId,
};
use crate::store::Datastore;
use crate::view::{ExecutionSummary, ExecutionView, RevisionView};

#[derive(Clone)]
pub struct Tracker {
    store: Arc<dyn Datastore>,
    clock: Arc<dyn Clock>,
}

impl Tracker {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn Datastore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn Datastore> {
        &self.store
    }

    /// Create a new process identity and its first revision.
    pub async fn create_process(
        &self,
        definition: ProcessDefinition,
        creator: &UserId,
    ) -> Result<RevisionView, TrackerError> {
        definition.validate()?;
        let now = self.clock.now();

        let identity = ProcessIdentity {
            id: ProcessId::new(),
            created_by: creator.clone(),
            created_at: now,
        };
        let revision = Revision {
            revision: RevisionId::new(),
            process: identity.id,
            title: definition.title,
            created_by: creator.clone(),
            created_at: now,
            steps: definition.steps,
        };

        self.store.insert_process(&identity, &revision).await?;
        Ok(RevisionView::new(&identity, &revision))
    }

    /// Record a new revision under an existing identity. Earlier revisions
    /// are left untouched.
    pub async fn update_process(
        &self,
        id: ProcessId,
        definition: ProcessDefinition,
        editor: &UserId,
    ) -> Result<RevisionView, TrackerError> {
        let identity = self.identity(id).await?;
        definition.validate()?;

        let revision = Revision {
            revision: RevisionId::new(),
            process: id,
            title: definition.title,
            created_by: editor.clone(),
            created_at: self.clock.now(),
            steps: definition.steps,
        };

        self.store.insert_revision(&revision).await?;
        Ok(RevisionView::new(&identity, &revision))
    }

    pub async fn get_current(&self, id: ProcessId) -> Result<RevisionView, TrackerError> {
        let identity = self.identity(id).await?;
        let revision = self.current_revision(id).await?;
        Ok(RevisionView::new(&identity, &revision))
    }

    pub async fn list_current_all(&self) -> Result<Vec<RevisionView>, TrackerError> {
        let current = self.store.list_latest_revisions().await?;
        Ok(current
            .iter()
            .map(|(identity, revision)| RevisionView::new(identity, revision))
            .collect())
    }

    pub async fn get_revision(&self, revision: RevisionId) -> Result<RevisionView, TrackerError> {
        let revision = self
            .store
            .get_revision(revision)
            .await?
            .ok_or_else(|| TrackerError::not_found("revision", revision))?;
        let identity = self.identity(revision.process).await?;
        Ok(RevisionView::new(&identity, &revision))
    }

    /// Every revision of a process, newest first.
    pub async fn list_revisions(&self, id: ProcessId) -> Result<Vec<RevisionView>, TrackerError> {
        let identity = self.identity(id).await?;
        let revisions = self.store.list_revisions(id).await?;
        Ok(revisions
            .iter()
            .map(|revision| RevisionView::new(&identity, revision))
            .collect())
    }

    /// Start an execution of the process's current revision.
    pub async fn start_execution(
        &self,
        id: ProcessId,
        initiator: &UserId,
    ) -> Result<ExecutionView, TrackerError> {
        let identity = self.identity(id).await?;
        let revision = self.current_revision(id).await?;
        let now = self.clock.now();

        let execution = Execution {
            id: ExecutionId::new(),
            revision: revision.revision,
            initiated_by: initiator.clone(),
            initiated_at: now,
        };
        let initial = stamp(plan_start(&revision.steps), initiator, &now);

        let history = self.store.insert_execution(&execution, &initial).await?;
        Ok(ExecutionView::derive(&execution, &identity, &revision, &history))
    }

    pub async fn get_execution(&self, id: ExecutionId) -> Result<ExecutionView, TrackerError> {
        let execution = self.execution(id).await?;
        self.execution_view(&execution).await
    }

    /// Shallow listing of a process's executions, newest first.
    pub async fn list_executions(
        &self,
        id: ProcessId,
    ) -> Result<Vec<ExecutionSummary>, TrackerError> {
        self.identity(id).await?;
        let executions = self.store.list_executions(id).await?;

        let mut summaries = Vec::with_capacity(executions.len());
        for execution in &executions {
            let view = self.execution_view(execution).await?;
            summaries.push(ExecutionSummary::from(&view));
        }
        Ok(summaries)
    }

    /// Mark one step of an execution as started or done.
    pub async fn mark_step(
        &self,
        id: ExecutionId,
        step_idx: i64,
        mark_as: HistoryKind,
        actor: &UserId,
    ) -> Result<ExecutionView, TrackerError> {
        let execution = self.execution(id).await?;
        let revision = self.revision_of(&execution).await?;

        let marks = plan_mark(&revision.steps, step_idx, mark_as)?;
        let items = stamp(marks, actor, &self.clock.now());
        self.store.append_history(execution.id, &items).await?;

        let identity = self.identity(revision.process).await?;
        let history = self.store.history(execution.id).await?;
        Ok(ExecutionView::derive(&execution, &identity, &revision, &history))
    }

    async fn identity(&self, id: ProcessId) -> Result<ProcessIdentity, TrackerError> {
        self.store
            .get_identity(id)
            .await?
            .ok_or_else(|| TrackerError::not_found("process", id))
    }

    async fn current_revision(&self, id: ProcessId) -> Result<Revision, TrackerError> {
        self.store
            .latest_revision(id)
            .await?
            .ok_or_else(|| TrackerError::not_found("process", id))
    }

    async fn execution(&self, id: ExecutionId) -> Result<Execution, TrackerError> {
        self.store
            .get_execution(id)
            .await?
            .ok_or_else(|| TrackerError::not_found("execution", id))
    }

    async fn revision_of(&self, execution: &Execution) -> Result<Revision, TrackerError> {
        self.store
            .get_revision(execution.revision)
            .await?
            .ok_or_else(|| TrackerError::not_found("revision", execution.revision))
    }

    async fn execution_view(&self, execution: &Execution) -> Result<ExecutionView, TrackerError> {
        let revision = self.revision_of(execution).await?;
        let identity = self.identity(revision.process).await?;
        let history = self.store.history(execution.id).await?;
        Ok(ExecutionView::derive(execution, &identity, &revision, &history))
    }
}

fn stamp(
    marks: Vec<PlannedMark>,
    actor: &UserId,
    at: &chrono::DateTime<chrono::Utc>,
) -> Vec<NewHistoryItem> {
    marks
        .into_iter()
        .map(|mark| NewHistoryItem {
            kind: mark.kind,
            step_idx: mark.step_idx,
            at: *at,
            by: actor.clone(),
        })
        .collect()
}
