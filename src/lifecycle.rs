use serde::{Deserialize, Serialize};
use statig::prelude::*;

use crate::model::{HistoryItem, HistoryKind};

/// Display phase of one actionable step within an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepPhase {
    NotStarted,
    Active,
    Done,
}

/// Per-step lifecycle, driven purely by history events.
///
/// Nothing is rejected here: a `StepDone` without a prior `StepStarted` moves
/// straight to done, and a restart after completion leaves the step done.
#[derive(Default)]
pub struct StepLifecycle;

#[state_machine(initial = "State::not_started()")]
impl StepLifecycle {
    #[state]
    fn not_started(&mut self, event: &HistoryKind) -> Outcome<State> {
        match event {
            HistoryKind::StepStarted => Transition(State::active()),
            HistoryKind::StepDone => Transition(State::done()),
        }
    }

    #[state]
    fn active(&mut self, event: &HistoryKind) -> Outcome<State> {
        match event {
            HistoryKind::StepDone => Transition(State::done()),
            HistoryKind::StepStarted => Handled,
        }
    }

    #[state]
    fn done(&mut self, event: &HistoryKind) -> Outcome<State> {
        match event {
            HistoryKind::StepStarted | HistoryKind::StepDone => Handled,
        }
    }
}

/// Fold one step's events, in log order, into its phase.
pub fn step_phase(history: &[HistoryItem], step_idx: usize) -> StepPhase {
    let mut events: Vec<&HistoryItem> = history
        .iter()
        .filter(|item| item.step_idx == step_idx)
        .collect();
    events.sort_by_key(|item| item.seq);

    let mut machine = StepLifecycle.state_machine();
    for item in events {
        machine.handle(&item.kind);
    }

    match machine.state() {
        State::NotStarted { .. } => StepPhase::NotStarted,
        State::Active { .. } => StepPhase::Active,
        State::Done { .. } => StepPhase::Done,
    }
}
