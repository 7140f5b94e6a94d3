//! Step marking rules: which history items a mark produces.
//!
//! Planning is separated from persistence. The tracker stamps the planned
//! marks with the caller and the current time and appends them as one batch.

use crate::error::TrackerError;
use crate::model::{HistoryKind, Step};

/// A history item to append, before actor and timestamp are known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedMark {
    pub kind: HistoryKind,
    pub step_idx: usize,
}

/// Position of the first actionable step after `idx`, skipping sections.
pub fn next_actionable(steps: &[Step], idx: usize) -> Option<usize> {
    steps
        .iter()
        .enumerate()
        .skip(idx + 1)
        .find(|(_, step)| step.is_actionable())
        .map(|(pos, _)| pos)
}

pub fn first_actionable(steps: &[Step]) -> Option<usize> {
    steps.iter().position(Step::is_actionable)
}

fn resolve_index(steps: &[Step], step_idx: i64) -> Result<usize, TrackerError> {
    usize::try_from(step_idx)
        .ok()
        .filter(|idx| steps.get(*idx).is_some_and(Step::is_actionable))
        .ok_or_else(|| TrackerError::invalid("step_idx", "step_idx must address an actionable step"))
}

/// Plan the items appended by marking `step_idx` as `mark_as`.
///
/// Marking a step done also starts the next actionable step when that step
/// has `start_with_previous` set. Only the immediate next step is considered;
/// the cascade does not chain.
pub fn plan_mark(
    steps: &[Step],
    step_idx: i64,
    mark_as: HistoryKind,
) -> Result<Vec<PlannedMark>, TrackerError> {
    let idx = resolve_index(steps, step_idx)?;

    let mut marks = vec![PlannedMark {
        kind: mark_as,
        step_idx: idx,
    }];

    if mark_as == HistoryKind::StepDone {
        if let Some(next) = next_actionable(steps, idx) {
            if steps[next].start_with_previous {
                marks.push(PlannedMark {
                    kind: HistoryKind::StepStarted,
                    step_idx: next,
                });
            }
        }
    }

    Ok(marks)
}

/// Items appended when an execution begins: the start of the execution acts
/// as the predecessor of the first actionable step.
pub fn plan_start(steps: &[Step]) -> Vec<PlannedMark> {
    first_actionable(steps)
        .filter(|idx| steps[*idx].start_with_previous)
        .map(|idx| PlannedMark {
            kind: HistoryKind::StepStarted,
            step_idx: idx,
        })
        .into_iter()
        .collect()
}
