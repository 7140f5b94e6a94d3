//! Derivation of step and execution state from an execution's history log.
//!
//! Everything here is a pure function over an ordered slice of
//! [`HistoryItem`]s, so it can be exercised without a datastore.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{HistoryItem, HistoryKind, Step, UserId};

/// Who started and finished one step, and when
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecutionInfo {
    pub started_at: Option<DateTime<Utc>>,
    pub started_by: Option<UserId>,
    pub done_at: Option<DateTime<Utc>>,
    pub done_by: Option<UserId>,
}

impl StepExecutionInfo {
    pub fn is_complete(&self) -> bool {
        self.started_at.is_some() && self.done_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    Started,
    Done,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Started => "started",
            ExecutionState::Done => "done",
        }
    }
}

/// Most recent item of `kind` for the step, by timestamp then insertion sequence.
pub fn latest_event(
    history: &[HistoryItem],
    step_idx: usize,
    kind: HistoryKind,
) -> Option<&HistoryItem> {
    history
        .iter()
        .filter(|item| item.step_idx == step_idx && item.kind == kind)
        .max_by(|a, b| a.at.cmp(&b.at).then(a.seq.cmp(&b.seq)))
}

pub fn step_info(history: &[HistoryItem], step_idx: usize) -> StepExecutionInfo {
    let mut info = StepExecutionInfo::default();

    if let Some(started) = latest_event(history, step_idx, HistoryKind::StepStarted) {
        info.started_at = Some(started.at);
        info.started_by = Some(started.by.clone());
    }

    if let Some(done) = latest_event(history, step_idx, HistoryKind::StepDone) {
        info.done_at = Some(done.at);
        info.done_by = Some(done.by.clone());
    }

    info
}

/// `Done` iff every actionable step has been both started and finished.
/// A revision without actionable steps is vacuously done.
pub fn execution_state(steps: &[Step], history: &[HistoryItem]) -> ExecutionState {
    let all_complete = steps
        .iter()
        .enumerate()
        .filter(|(_, step)| step.is_actionable())
        .all(|(idx, _)| step_info(history, idx).is_complete());

    if all_complete {
        ExecutionState::Done
    } else {
        ExecutionState::Started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExecutionId;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn item(seq: i64, kind: HistoryKind, step_idx: usize, secs: i64, by: &str) -> HistoryItem {
        HistoryItem {
            seq,
            execution: ExecutionId::new(),
            kind,
            step_idx,
            at: at(secs),
            by: UserId::new(by),
        }
    }

    #[test]
    fn empty_history_yields_absent_info() {
        assert_eq!(step_info(&[], 0), StepExecutionInfo::default());
    }

    #[test]
    fn later_timestamp_wins_over_insertion_order() {
        let history = vec![
            item(1, HistoryKind::StepStarted, 0, 20, "bob"),
            item(2, HistoryKind::StepStarted, 0, 10, "alice"),
        ];

        let info = step_info(&history, 0);
        assert_eq!(info.started_at, Some(at(20)));
        assert_eq!(info.started_by, Some(UserId::new("bob")));
        assert_eq!(info.done_at, None);
    }

    #[test]
    fn equal_timestamps_fall_back_to_latest_insert() {
        let history = vec![
            item(1, HistoryKind::StepDone, 2, 5, "alice"),
            item(2, HistoryKind::StepDone, 2, 5, "carol"),
        ];

        assert_eq!(step_info(&history, 2).done_by, Some(UserId::new("carol")));
    }

    #[test]
    fn events_for_other_steps_are_ignored() {
        let history = vec![item(1, HistoryKind::StepStarted, 1, 0, "alice")];
        assert_eq!(step_info(&history, 0), StepExecutionInfo::default());
    }

    #[test]
    fn state_requires_start_and_done_for_every_step() {
        let steps = vec![Step::section("Intro"), Step::step("A"), Step::step("B")];

        let mut history = vec![
            item(1, HistoryKind::StepStarted, 1, 0, "alice"),
            item(2, HistoryKind::StepDone, 1, 1, "alice"),
            item(3, HistoryKind::StepDone, 2, 2, "alice"),
        ];
        // B is done but was never started
        assert_eq!(execution_state(&steps, &history), ExecutionState::Started);

        history.push(item(4, HistoryKind::StepStarted, 2, 3, "alice"));
        assert_eq!(execution_state(&steps, &history), ExecutionState::Done);
    }

    #[test]
    fn sections_only_revision_is_vacuously_done() {
        let steps = vec![Step::section("Intro"), Step::section("Outro")];
        assert_eq!(execution_state(&steps, &[]), ExecutionState::Done);
        assert_eq!(execution_state(&[], &[]), ExecutionState::Done);
    }
}
