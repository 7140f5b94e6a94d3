use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::TrackerError;

/// Maximum length of process and step titles
pub const MAX_TITLE_LEN: usize = 200;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Stable identity of a process across all of its revisions
    ProcessId
);
uuid_id!(
    /// Token of one immutable revision of a process
    RevisionId
);
uuid_id!(ExecutionId);

/// Opaque caller identity supplied by the authentication layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    /// Non-actionable header grouping the steps that follow it
    #[serde(rename = "SE", alias = "Section")]
    Section,
    #[serde(rename = "ST", alias = "Step")]
    Step,
}

impl StepKind {
    /// Storage and wire code
    pub fn code(&self) -> &'static str {
        match self {
            StepKind::Section => "SE",
            StepKind::Step => "ST",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "SE" | "Section" => Some(StepKind::Section),
            "ST" | "Step" => Some(StepKind::Step),
            _ => None,
        }
    }
}

/// One entry of a revision's ordered step list. Its position in that list is
/// the address used by history items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_with_previous: bool,
}

impl Step {
    pub fn section(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: StepKind::Section,
            description: String::new(),
            start_with_previous: false,
        }
    }

    pub fn step(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: StepKind::Step,
            description: String::new(),
            start_with_previous: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn starting_with_previous(mut self) -> Self {
        self.start_with_previous = true;
        self
    }

    pub fn is_actionable(&self) -> bool {
        self.kind == StepKind::Step
    }
}

/// Title and steps submitted when creating or editing a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub title: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl ProcessDefinition {
    pub fn new(title: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            title: title.into(),
            steps,
        }
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.title.trim().is_empty() {
            return Err(TrackerError::invalid("title", "title must not be blank"));
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(TrackerError::invalid(
                "title",
                format!("title must be at most {MAX_TITLE_LEN} characters"),
            ));
        }
        for (idx, step) in self.steps.iter().enumerate() {
            if step.title.trim().is_empty() {
                return Err(TrackerError::invalid(
                    format!("steps[{idx}].title"),
                    "title must not be blank",
                ));
            }
            if step.title.chars().count() > MAX_TITLE_LEN {
                return Err(TrackerError::invalid(
                    format!("steps[{idx}].title"),
                    format!("title must be at most {MAX_TITLE_LEN} characters"),
                ));
            }
        }
        Ok(())
    }
}

/// The stable identity ("meta") of a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessIdentity {
    pub id: ProcessId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Immutable snapshot of a process definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub revision: RevisionId,
    pub process: ProcessId,
    pub title: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub steps: Vec<Step>,
}

/// One tracked run of a revision. Its state is derived from history on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub revision: RevisionId,
    pub initiated_by: UserId,
    pub initiated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryKind {
    StepStarted,
    StepDone,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::StepStarted => "StepStarted",
            HistoryKind::StepDone => "StepDone",
        }
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "StepStarted" | "started" | "start" => Ok(HistoryKind::StepStarted),
            "StepDone" | "done" => Ok(HistoryKind::StepDone),
            other => Err(format!(
                "unknown mark '{other}', expected StepStarted or StepDone"
            )),
        }
    }
}

/// Append-only event in an execution's history log. `seq` is assigned by the
/// datastore and orders items by insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub seq: i64,
    pub execution: ExecutionId,
    pub kind: HistoryKind,
    pub step_idx: usize,
    pub at: DateTime<Utc>,
    pub by: UserId,
}

/// History item not yet appended to a log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryItem {
    pub kind: HistoryKind,
    pub step_idx: usize,
    pub at: DateTime<Utc>,
    pub by: UserId,
}
