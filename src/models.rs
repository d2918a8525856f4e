//! Data models shared by the analysis tools.
//!
//! Issue snapshots, the entries they hold, and the status-tagged result
//! envelope every entry point returns.

use crate::error::{TaskError, TaskOutput};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::error;

/// Label used when an issue has no milestone.
pub const NO_MILESTONE: &str = "No Milestone";

/// Label used when an issue is not on the project board.
pub const NOT_ON_BOARD: &str = "Not on board";

/// Lifecycle state of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "UPPERCASE")]
pub enum IssueState {
    Open,
    Closed,
}

impl fmt::Display for IssueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueState::Open => write!(f, "OPEN"),
            IssueState::Closed => write!(f, "CLOSED"),
        }
    }
}

impl TryFrom<String> for IssueState {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "open" => Ok(IssueState::Open),
            "closed" => Ok(IssueState::Closed),
            _ => Err(format!("invalid issue state '{}'", s)),
        }
    }
}

/// Identity of an issue inside a snapshot: repository (if any) and number.
pub type IssueKey = (Option<String>, u64);

/// A single issue record as captured in a snapshot or export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueEntry {
    /// Issue number.
    #[serde(alias = "id")]
    pub number: u64,
    /// Issue title.
    #[serde(default)]
    pub title: String,
    /// Open or closed.
    pub state: IssueState,
    /// Milestone title, if assigned.
    #[serde(default, deserialize_with = "deserialize_milestone")]
    pub milestone: Option<String>,
    /// Column on the project board, if the issue is on one.
    #[serde(default, alias = "status")]
    pub project_status: Option<String>,
    /// Repository the issue belongs to (`owner/name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl IssueEntry {
    pub fn key(&self) -> IssueKey {
        (self.repository.clone(), self.number)
    }

    /// Milestone label with the sentinel applied.
    pub fn milestone_label(&self) -> &str {
        non_empty(self.milestone.as_deref()).unwrap_or(NO_MILESTONE)
    }

    /// Board status label with the sentinel applied.
    pub fn board_status(&self) -> &str {
        non_empty(self.project_status.as_deref()).unwrap_or(NOT_ON_BOARD)
    }

    pub fn is_open(&self) -> bool {
        self.state == IssueState::Open
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

/// Milestones come either as a plain title or as a GitHub milestone object.
#[derive(Deserialize)]
#[serde(untagged)]
enum MilestoneField {
    Title(String),
    Object { title: String },
}

fn deserialize_milestone<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let field: Option<MilestoneField> = Option::deserialize(deserializer)?;
    Ok(field.map(|m| match m {
        MilestoneField::Title(t) => t,
        MilestoneField::Object { title } => title,
    }))
}

/// Pre-computed totals carried by an issue export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub total: usize,
    pub open: usize,
    pub closed: usize,
}

impl ExportSummary {
    pub fn from_issues(issues: &[IssueEntry]) -> Self {
        let open = issues.iter().filter(|i| i.is_open()).count();
        Self {
            total: issues.len(),
            open,
            closed: issues.len() - open,
        }
    }

    /// Completion percentage; zero when there are no issues.
    pub fn completion_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.closed as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotDocument {
    issues: Vec<IssueEntry>,
    #[serde(default)]
    summary: Option<ExportSummary>,
}

/// A point-in-time capture of issue records.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub label: String,
    pub issues: Vec<IssueEntry>,
    pub summary: Option<ExportSummary>,
}

impl Snapshot {
    /// Parse a snapshot document; missing required fields are `Malformed`.
    pub fn from_json(label: &str, content: &str) -> TaskOutput<Self> {
        let doc: SnapshotDocument = serde_json::from_str(content).map_err(|e| {
            TaskError::Malformed(format!("Malformed snapshot {}: {}", label, e))
        })?;

        Ok(Self {
            label: label.to_string(),
            issues: doc.issues,
            summary: doc.summary,
        })
    }

    /// The export summary, or one computed from the issues.
    pub fn summary(&self) -> ExportSummary {
        self.summary
            .unwrap_or_else(|| ExportSummary::from_issues(&self.issues))
    }
}

/// Result envelope returned by every entry point.
///
/// Serializes as `{"status": "success", ...payload}` or
/// `{"status": "error", "message": "..."}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskResult<T> {
    Success(T),
    Error { message: String },
}

impl<T> TaskResult<T> {
    /// Convert a handler outcome, logging the error if there is one.
    pub fn from_output(output: TaskOutput<T>) -> Self {
        match output {
            Ok(payload) => TaskResult::Success(payload),
            Err(e) => {
                error!(kind = e.kind(), error = ?e, "Task failed: {}", e);
                TaskResult::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        TaskResult::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskResult::Success(_))
    }

    /// The payload, if the task succeeded.
    pub fn success(&self) -> Option<&T> {
        match self {
            TaskResult::Success(payload) => Some(payload),
            TaskResult::Error { .. } => None,
        }
    }

    /// The error message, if the task failed.
    pub fn message(&self) -> Option<&str> {
        match self {
            TaskResult::Success(_) => None,
            TaskResult::Error { message } => Some(message),
        }
    }
}
