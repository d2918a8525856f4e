//! Snapshot storage: `<data_dir>/<label>/raw.json`.

use crate::error::{TaskError, TaskOutput};
use crate::models::Snapshot;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SNAPSHOT_FILE: &str = "raw.json";

/// Which side of a comparison a snapshot is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotRole {
    Baseline,
    Current,
}

impl fmt::Display for SnapshotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotRole::Baseline => write!(f, "Baseline"),
            SnapshotRole::Current => write!(f, "Current"),
        }
    }
}

pub fn snapshot_path(data_dir: &Path, label: &str) -> PathBuf {
    data_dir.join(label).join(SNAPSHOT_FILE)
}

/// Labels name a single directory under the data dir.
fn validate_label(label: &str, role: SnapshotRole) -> TaskOutput<()> {
    if label.is_empty() || label == "." || label == ".." || label.contains(['/', '\\']) {
        return Err(TaskError::Validation(format!(
            "Invalid {} snapshot label: {}",
            role.to_string().to_lowercase(),
            label
        )));
    }
    Ok(())
}

/// Load and parse the snapshot stored under `label`.
pub fn load_snapshot(data_dir: &Path, label: &str, role: SnapshotRole) -> TaskOutput<Snapshot> {
    validate_label(label, role)?;

    let path = snapshot_path(data_dir, label);
    if !path.exists() {
        return Err(TaskError::NotFound(format!(
            "{} snapshot not found: {}",
            role, label
        )));
    }

    debug!("Loading {} snapshot from {}", label, path.display());
    let content = fs::read_to_string(&path)
        .map_err(|e| TaskError::io(format!("Failed to read {}", path.display()), e))?;

    Snapshot::from_json(label, &content)
}

/// Labels of every directory holding a snapshot, newest label first.
pub fn list_snapshots(data_dir: &Path) -> TaskOutput<Vec<String>> {
    if !data_dir.is_dir() {
        return Err(TaskError::NotFound("Data directory not found".to_string()));
    }

    let entries = fs::read_dir(data_dir)
        .map_err(|e| TaskError::io(format!("Failed to read {}", data_dir.display()), e))?;

    let mut labels: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().join(SNAPSHOT_FILE).is_file())
        .filter_map(|entry| entry.file_name().to_str().map(String::from))
        .collect();

    labels.sort_unstable_by(|a, b| b.cmp(a));
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_snapshot(data_dir: &Path, label: &str, content: &str) {
        let dir = data_dir.join(label);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(SNAPSHOT_FILE), content).unwrap();
    }

    #[test]
    fn test_list_snapshots_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        write_snapshot(temp_dir.path(), "2025-01-06", r#"{"issues": []}"#);
        write_snapshot(temp_dir.path(), "2025-01-13", r#"{"issues": []}"#);
        fs::create_dir_all(temp_dir.path().join("scratch")).unwrap();

        let labels = list_snapshots(temp_dir.path()).unwrap();
        assert_eq!(labels, vec!["2025-01-13", "2025-01-06"]);
    }

    #[test]
    fn test_list_snapshots_without_data_dir() {
        let err = list_snapshots(Path::new("/nonexistent/data")).unwrap_err();
        assert_eq!(err.to_string(), "Data directory not found");
    }

    #[test]
    fn test_missing_snapshot_names_role() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_snapshot(temp_dir.path(), "2025-02-01", SnapshotRole::Current).unwrap_err();
        assert_eq!(err.to_string(), "Current snapshot not found: 2025-02-01");
    }

    #[test]
    fn test_label_cannot_escape_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_snapshot(temp_dir.path(), "../etc", SnapshotRole::Baseline).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_malformed_snapshot_names_label() {
        let temp_dir = TempDir::new().unwrap();
        write_snapshot(temp_dir.path(), "broken", r#"{"items": []}"#);

        let err = load_snapshot(temp_dir.path(), "broken", SnapshotRole::Baseline).unwrap_err();
        assert_eq!(err.kind(), "malformed");
        assert!(err.to_string().contains("broken"));
    }
}
