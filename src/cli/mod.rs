use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::model::HistoryKind;

pub mod commands;

#[derive(Parser)]
#[command(name = "runbook")]
#[command(about = "Versioned process checklists with tracked executions")]
#[command(long_about = "Runbook keeps every revision of a process checklist and tracks who \
                       started and finished each step of every execution. Get started with \
                       'runbook process create --file <definition.json>'.")]
pub struct Cli {
    /// Identity recorded for changes (falls back to cli.user in config, then $USER)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Print machine-readable JSON instead of the human summary
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Address to bind (defaults to server.host from config)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (defaults to server.port from config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create, revise and inspect process definitions
    #[command(subcommand)]
    Process(ProcessCommands),
    /// Start executions and mark their steps
    #[command(subcommand)]
    Execution(ExecutionCommands),
}

#[derive(Subcommand)]
pub enum ProcessCommands {
    /// List the current revision of every process
    List,
    /// Show the current revision of a process
    Show {
        /// Process id
        id: String,
    },
    /// Show every revision of a process, newest first
    History {
        /// Process id
        id: String,
    },
    /// Create a process from a JSON or TOML definition file
    Create {
        #[arg(long, help = "Definition file with a title and a list of steps")]
        file: PathBuf,
    },
    /// Record a new revision of a process from a definition file
    Update {
        /// Process id
        id: String,
        #[arg(long, help = "Definition file with a title and a list of steps")]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ExecutionCommands {
    /// Start an execution of the current revision of a process
    Start {
        /// Process id
        process: String,
    },
    /// Show an execution with per-step progress
    Show {
        /// Execution id
        id: String,
    },
    /// List executions of a process, newest first
    List {
        /// Process id
        process: String,
    },
    /// Mark a step as started or done
    Mark {
        /// Execution id
        id: String,
        /// Position of the step in the revision
        #[arg(long, allow_negative_numbers = true)]
        step: i64,
        /// started or done
        #[arg(long = "as", value_name = "MARK")]
        mark_as: HistoryKind,
    },
}
