use std::path::PathBuf;

use anyhow::Result;

use super::{load_definition, parse_id, print_json, print_revision};
use crate::model::{ProcessId, UserId};
use crate::tracker::Tracker;

pub enum ProcessAction {
    List,
    Show { id: String },
    History { id: String },
    Create { file: PathBuf, user: UserId },
    Update { id: String, file: PathBuf, user: UserId },
}

pub struct ProcessCommand {
    pub tracker: Tracker,
    pub action: ProcessAction,
    pub json: bool,
}

impl ProcessCommand {
    pub fn new(tracker: Tracker, action: ProcessAction) -> Self {
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
            ProcessAction::List => self.list().await,
            ProcessAction::Show { id } => {
                let id: ProcessId = parse_id("process", id)?;
                let view = self.tracker.get_current(id).await?;
                if self.json {
                    return print_json(&view);
                }
                print_revision(&view);
                Ok(())
            }
            ProcessAction::History { id } => self.history(id).await,
            ProcessAction::Create { file, user } => {
                let definition = load_definition(file)?;
                let view = self.tracker.create_process(definition, user).await?;
                if self.json {
                    return print_json(&view);
                }
                println!("✅ Created process {}", view.meta.id);
                println!();
                print_revision(&view);
                Ok(())
            }
            ProcessAction::Update { id, file, user } => {
                let id: ProcessId = parse_id("process", id)?;
                let definition = load_definition(file)?;
                let view = self.tracker.update_process(id, definition, user).await?;
                if self.json {
                    return print_json(&view);
                }
                println!("✅ Recorded revision {}", view.revision);
                println!();
                print_revision(&view);
                Ok(())
            }
        }
    }

    async fn list(&self) -> Result<()> {
        let processes = self.tracker.list_current_all().await?;
        if self.json {
            return print_json(&processes);
        }

        if processes.is_empty() {
            println!("📭 No processes defined");
            println!("   💡 Create one with: runbook process create --file <definition.json>");
            return Ok(());
        }

        println!("📚 PROCESSES ({}):", processes.len());
        println!("─────────────────");
        for view in &processes {
            let actionable = view.steps.iter().filter(|s| s.is_actionable()).count();
            println!("📋 {}  {}", view.meta.id, view.title);
            println!(
                "   {} steps, last revised {} by {}",
                actionable,
                view.created_at.to_rfc3339(),
                view.created_by
            );
        }
        Ok(())
    }

    async fn history(&self, id: &str) -> Result<()> {
        let id: ProcessId = parse_id("process", id)?;
        let revisions = self.tracker.list_revisions(id).await?;
        if self.json {
            return print_json(&revisions);
        }

        println!("🕰️  REVISIONS OF {} ({}):", id, revisions.len());
        for (n, view) in revisions.iter().enumerate() {
            let marker = if n == 0 { "👉" } else { "  " };
            println!(
                "{marker} {}  {}  ({} by {}, {} steps)",
                view.revision,
                view.title,
                view.created_at.to_rfc3339(),
                view.created_by,
                view.steps.len()
            );
        }
        Ok(())
    }
}
