//! Error types shared by the task handlers.
//!
//! Handlers return `Result<_, TaskError>`; entry points turn the error into
//! a `TaskResult::Error` so nothing crosses the boundary as a crash.

use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    /// A referenced input (snapshot, config file, prompt) does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A parameter is missing or out of range.
    #[error("{0}")]
    Validation(String),

    /// An input document exists but cannot be understood.
    #[error("{0}")]
    Malformed(String),

    /// An external collaborator (API, git) failed.
    #[error("{0}")]
    Collaborator(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl TaskError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TaskError::Io {
            context: context.into(),
            source,
        }
    }

    /// Short machine-friendly name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::NotFound(_) => "not_found",
            TaskError::Validation(_) => "validation",
            TaskError::Malformed(_) => "malformed",
            TaskError::Collaborator(_) => "collaborator",
            TaskError::Io { .. } => "io",
        }
    }
}

impl From<git2::Error> for TaskError {
    fn from(e: git2::Error) -> Self {
        TaskError::Collaborator(format!("git: {}", e.message()))
    }
}

pub type TaskOutput<T> = std::result::Result<T, TaskError>;

/// Read a file to a string, mapping a missing file to `NotFound`.
pub fn read_input(path: &Path, what: &str) -> TaskOutput<String> {
    if !path.exists() {
        return Err(TaskError::NotFound(format!(
            "{} not found: {}",
            what,
            path.display()
        )));
    }
    std::fs::read_to_string(path)
        .map_err(|e| TaskError::io(format!("Failed to read {}", path.display()), e))
}

/// Read a JSON request document from a file, or stdin for `-`.
pub fn read_request<T: DeserializeOwned>(path: &Path) -> TaskOutput<T> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| TaskError::io("Failed to read request from stdin", e))?;
        buf
    } else {
        read_input(path, "Request file")?
    };

    parse_request(&content)
}

pub fn parse_request<T: DeserializeOwned>(content: &str) -> TaskOutput<T> {
    serde_json::from_str(content)
        .map_err(|e| TaskError::Malformed(format!("Request is not valid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_input_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = read_input(&temp_dir.path().join("nope.json"), "Snapshot").unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().starts_with("Snapshot not found:"));
    }

    #[test]
    fn test_request_file_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = read_request::<serde_json::Value>(&temp_dir.path().join("req.json")).unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().starts_with("Request file not found:"));
    }

    #[test]
    fn test_invalid_request_json_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("req.json");
        std::fs::write(&path, "{\"task\": ").unwrap();

        let err = read_request::<serde_json::Value>(&path).unwrap_err();
        assert_eq!(err.kind(), "malformed");
        assert!(err.to_string().starts_with("Request is not valid JSON"));
    }

    #[test]
    fn test_io_error_display_includes_context() {
        let err = TaskError::io(
            "Failed to write note",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "Failed to write note: denied");
    }
}
