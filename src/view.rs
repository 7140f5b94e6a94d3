//! Response shapes returned by the tracker to the API and CLI layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::{execution_state, step_info, ExecutionState, StepExecutionInfo};
use crate::lifecycle::{step_phase, StepPhase};
use crate::model::{
    Execution, ExecutionId, HistoryItem, ProcessId, ProcessIdentity, Revision, RevisionId, Step,
    StepKind, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaView {
    pub id: ProcessId,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
}

impl From<&ProcessIdentity> for MetaView {
    fn from(identity: &ProcessIdentity) -> Self {
        Self {
            id: identity.id,
            created_at: identity.created_at,
            created_by: identity.created_by.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionView {
    pub revision: RevisionId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub meta: MetaView,
    pub steps: Vec<Step>,
}

impl RevisionView {
    pub fn new(identity: &ProcessIdentity, revision: &Revision) -> Self {
        Self {
            revision: revision.revision,
            title: revision.title.clone(),
            created_at: revision.created_at,
            created_by: revision.created_by.clone(),
            meta: identity.into(),
            steps: revision.steps.clone(),
        }
    }
}

/// A step annotated with its derived execution info. Sections carry no info
/// and no phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecutionView {
    #[serde(flatten)]
    pub step: Step,
    #[serde(flatten)]
    pub info: StepExecutionInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StepPhase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessExecutionView {
    pub revision: RevisionId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub meta: MetaView,
    pub steps: Vec<StepExecutionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionView {
    pub id: ExecutionId,
    pub initiated_at: DateTime<Utc>,
    pub initiated_by: UserId,
    pub state: ExecutionState,
    pub process: ProcessExecutionView,
}

impl ExecutionView {
    /// Derive the full view of an execution from its revision and history.
    pub fn derive(
        execution: &Execution,
        identity: &ProcessIdentity,
        revision: &Revision,
        history: &[HistoryItem],
    ) -> Self {
        let steps = revision
            .steps
            .iter()
            .enumerate()
            .map(|(idx, step)| match step.kind {
                StepKind::Step => StepExecutionView {
                    step: step.clone(),
                    info: step_info(history, idx),
                    state: Some(step_phase(history, idx)),
                },
                StepKind::Section => StepExecutionView {
                    step: step.clone(),
                    info: StepExecutionInfo::default(),
                    state: None,
                },
            })
            .collect();

        Self {
            id: execution.id,
            initiated_at: execution.initiated_at,
            initiated_by: execution.initiated_by.clone(),
            state: execution_state(&revision.steps, history),
            process: ProcessExecutionView {
                revision: revision.revision,
                title: revision.title.clone(),
                created_at: revision.created_at,
                meta: identity.into(),
                steps,
            },
        }
    }

    pub fn step(&self, idx: usize) -> Option<&StepExecutionView> {
        self.process.steps.get(idx)
    }
}

/// Shallow execution listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub id: ExecutionId,
    pub initiated_at: DateTime<Utc>,
    pub initiated_by: UserId,
    pub state: ExecutionState,
}

impl From<&ExecutionView> for ExecutionSummary {
    fn from(view: &ExecutionView) -> Self {
        Self {
            id: view.id,
            initiated_at: view.initiated_at,
            initiated_by: view.initiated_by.clone(),
            state: view.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HistoryKind;

    #[test]
    fn section_steps_serialize_with_null_info_and_no_state() {
        let now = Utc::now();
        let identity = ProcessIdentity {
            id: ProcessId::new(),
            created_by: UserId::new("alice"),
            created_at: now,
        };
        let revision = Revision {
            revision: RevisionId::new(),
            process: identity.id,
            title: "Deploy".to_string(),
            created_by: UserId::new("alice"),
            created_at: now,
            steps: vec![Step::section("Intro"), Step::step("A")],
        };
        let execution = Execution {
            id: ExecutionId::new(),
            revision: revision.revision,
            initiated_by: UserId::new("bob"),
            initiated_at: now,
        };
        let history = vec![HistoryItem {
            seq: 1,
            execution: execution.id,
            kind: HistoryKind::StepStarted,
            step_idx: 1,
            at: now,
            by: UserId::new("bob"),
        }];

        let json = serde_json::to_value(ExecutionView::derive(&execution, &identity, &revision, &history))
            .unwrap();

        let section = &json["process"]["steps"][0];
        assert_eq!(section["type"], "SE");
        assert!(section["startedAt"].is_null());
        assert!(section.get("state").is_none());

        let step = &json["process"]["steps"][1];
        assert_eq!(step["startedBy"], "bob");
        assert!(step["doneAt"].is_null());
        assert_eq!(step["state"], "active");
        assert_eq!(json["state"], "started");
    }
}
