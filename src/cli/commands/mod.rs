use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::RunbookConfig;
use crate::error::TrackerError;
use crate::history::ExecutionState;
use crate::lifecycle::StepPhase;
use crate::model::{ProcessDefinition, StepKind, UserId};
use crate::view::{ExecutionView, RevisionView};

pub mod execution;
pub mod process;
pub mod serve;

/// Resolve who is acting: `--user`, then `cli.user` from config, then `$USER`.
pub fn resolve_user(flag: Option<&str>, config: &RunbookConfig) -> Result<UserId> {
    flag.map(str::to_string)
        .or_else(|| config.cli.user.clone())
        .or_else(|| std::env::var("USER").ok())
        .filter(|user| !user.trim().is_empty())
        .map(UserId::new)
        .context("No user identity: pass --user, set cli.user in runbook.toml, or set $USER")
}

/// Parse an id argument. A malformed id cannot name anything, so it reports
/// the same way an unknown one does.
pub fn parse_id<T: FromStr>(entity: &'static str, raw: &str) -> Result<T, TrackerError> {
    raw.parse().map_err(|_| TrackerError::not_found(entity, raw))
}

/// Read a process definition. Files ending in `.toml` are parsed as TOML,
/// everything else as JSON.
pub fn load_definition(path: &Path) -> Result<ProcessDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read definition file {}", path.display()))?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let definition = if is_toml {
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML definition in {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON definition in {}", path.display()))?
    };
    Ok(definition)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_revision(view: &RevisionView) {
    println!("📋 {}", view.title);
    println!("   🆔 Process:  {}", view.meta.id);
    println!("   🔖 Revision: {}", view.revision);
    println!(
        "   👤 Created by {} at {}",
        view.meta.created_by,
        view.meta.created_at.to_rfc3339()
    );
    if view.created_at != view.meta.created_at {
        println!(
            "   ✏️  Revised by {} at {}",
            view.created_by,
            view.created_at.to_rfc3339()
        );
    }
    println!();

    if view.steps.is_empty() {
        println!("   (no steps)");
        return;
    }
    for (idx, step) in view.steps.iter().enumerate() {
        match step.kind {
            StepKind::Section => println!("  [{idx}] § {}", step.title),
            StepKind::Step => {
                let chained = if step.start_with_previous {
                    "  ⛓️  starts with previous"
                } else {
                    ""
                };
                println!("  [{idx}] • {}{chained}", step.title);
            }
        }
        if !step.description.is_empty() {
            println!("        {}", step.description);
        }
    }
}

pub fn print_execution(view: &ExecutionView) {
    let state = match view.state {
        ExecutionState::Done => "✅ done",
        ExecutionState::Started => "🔄 started",
    };
    println!("🏃 Execution {}", view.id);
    println!("   📋 {} (revision {})", view.process.title, view.process.revision);
    println!(
        "   👤 Initiated by {} at {}",
        view.initiated_by,
        view.initiated_at.to_rfc3339()
    );
    println!("   📊 State: {state}");
    println!();

    for (idx, step) in view.process.steps.iter().enumerate() {
        let Some(phase) = step.state else {
            println!("  [{idx}] § {}", step.step.title);
            continue;
        };
        let marker = match phase {
            StepPhase::NotStarted => "⬜",
            StepPhase::Active => "🔄",
            StepPhase::Done => "✅",
        };
        println!("  [{idx}] {marker} {}", step.step.title);
        if let (Some(at), Some(by)) = (&step.info.started_at, &step.info.started_by) {
            println!("        started {} by {}", at.to_rfc3339(), by);
        }
        if let (Some(at), Some(by)) = (&step.info.done_at, &step.info.done_by) {
            println!("        done    {} by {}", at.to_rfc3339(), by);
        }
    }
}

pub fn show_how_to_get_started() -> Result<()> {
    println!("📋 Runbook - versioned process checklists");
    println!();
    println!("To get started:");
    println!("  📝 runbook process create --file release.json   # Define a process");
    println!("  📚 runbook process list                          # See current processes");
    println!("  🏃 runbook execution start <process>             # Run a process");
    println!("  ✅ runbook execution mark <id> --step 1 --as done");
    println!();
    println!("Server:");
    println!("  🌐 runbook serve                                 # Start the HTTP API");
    Ok(())
}
