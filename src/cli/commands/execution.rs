use anyhow::Result;

use super::{parse_id, print_execution, print_json};
use crate::history::ExecutionState;
use crate::model::{ExecutionId, HistoryKind, ProcessId, UserId};
use crate::tracker::Tracker;

pub enum ExecutionAction {
    Start { process: String, user: UserId },
    Show { id: String },
    List { process: String },
    Mark {
        id: String,
        step: i64,
        mark_as: HistoryKind,
        user: UserId,
    },
}

pub struct ExecutionCommand {
    pub tracker: Tracker,
    pub action: ExecutionAction,
    pub json: bool,
}

impl ExecutionCommand {
    pub fn new(tracker: Tracker, action: ExecutionAction) -> Self {
        Self {
            tracker,
            action,
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.action {
            ExecutionAction::Start { process, user } => {
                let process: ProcessId = parse_id("process", process)?;
                let view = self.tracker.start_execution(process, user).await?;
                if self.json {
                    return print_json(&view);
                }
                println!("🚀 Started execution {}", view.id);
                println!();
                print_execution(&view);
                Ok(())
            }
            ExecutionAction::Show { id } => {
                let id: ExecutionId = parse_id("execution", id)?;
                let view = self.tracker.get_execution(id).await?;
                if self.json {
                    return print_json(&view);
                }
                print_execution(&view);
                Ok(())
            }
            ExecutionAction::List { process } => self.list(process).await,
            ExecutionAction::Mark {
                id,
                step,
                mark_as,
                user,
            } => {
                let id: ExecutionId = parse_id("execution", id)?;
                let view = self.tracker.mark_step(id, *step, *mark_as, user).await?;
                if self.json {
                    return print_json(&view);
                }
                let verb = match mark_as {
                    HistoryKind::StepStarted => "started",
                    HistoryKind::StepDone => "done",
                };
                println!("✅ Step {step} marked {verb}");
                if view.state == ExecutionState::Done {
                    println!("🎉 Execution complete!");
                }
                println!();
                print_execution(&view);
                Ok(())
            }
        }
    }

    async fn list(&self, process: &str) -> Result<()> {
        let process: ProcessId = parse_id("process", process)?;
        let executions = self.tracker.list_executions(process).await?;
        if self.json {
            return print_json(&executions);
        }

        if executions.is_empty() {
            println!("📭 No executions of {process}");
            println!("   💡 Start one with: runbook execution start {process}");
            return Ok(());
        }

        println!("🏃 EXECUTIONS OF {} ({}):", process, executions.len());
        for summary in &executions {
            let state = match summary.state {
                ExecutionState::Done => "✅ done",
                ExecutionState::Started => "🔄 started",
            };
            println!(
                "   {}  {}  by {} at {}",
                summary.id,
                state,
                summary.initiated_by,
                summary.initiated_at.to_rfc3339()
            );
        }
        Ok(())
    }
}
