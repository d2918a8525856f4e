//! Repository collection document.
//!
//! The YAML list of repositories the activity task reads and the sync task
//! writes.

use crate::config::expand_home;
use crate::error::{read_input, TaskError, TaskOutput};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// One tracked repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub owner: String,
    pub name: String,
    /// Branch to walk; HEAD when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Local checkout; `<root>/repos/<owner>/<name>` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl RepositoryEntry {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Where the local clone lives, relative paths resolved against `root`.
    pub fn checkout_path(&self, root: &Path) -> PathBuf {
        match self.path {
            Some(ref path) => {
                let path = expand_home(path);
                if path.is_absolute() {
                    path
                } else {
                    root.join(path)
                }
            }
            None => root.join("repos").join(&self.owner).join(&self.name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

impl RepositoryConfig {
    pub fn load(path: &Path) -> TaskOutput<Self> {
        let content = read_input(path, "Config file")?;
        Self::from_yaml(&content, path)
    }

    fn from_yaml(content: &str, path: &Path) -> TaskOutput<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            TaskError::Malformed(format!(
                "Malformed repository config {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Render the document with the generated-file header.
    pub fn to_yaml(&self, generated_at: DateTime<Local>) -> TaskOutput<String> {
        let body = serde_yaml::to_string(self).map_err(|e| {
            TaskError::Malformed(format!("Failed to serialize repository config: {}", e))
        })?;

        Ok(format!(
            "# Auto-generated by pmagents sync\n# Generated: {}\n\n{}",
            generated_at.to_rfc3339(),
            body
        ))
    }

    pub fn save(&self, path: &Path, generated_at: DateTime<Local>) -> TaskOutput<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TaskError::io(format!("Failed to create {}", parent.display()), e)
            })?;
        }

        fs::write(path, self.to_yaml(generated_at)?)
            .map_err(|e| TaskError::io(format!("Failed to write {}", path.display()), e))?;

        info!(
            "Wrote {} repositories to {}",
            self.repositories.len(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_collection() {
        let yaml = r#"
repositories:
  - owner: acme
    name: api
    branch: main
  - owner: acme
    name: web
    path: /srv/checkouts/web
"#;
        let config = RepositoryConfig::from_yaml(yaml, Path::new("production.yaml")).unwrap();

        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.repositories[0].full_name(), "acme/api");
        assert_eq!(config.repositories[0].branch.as_deref(), Some("main"));
        assert_eq!(
            config.repositories[1].checkout_path(Path::new("/root")),
            PathBuf::from("/srv/checkouts/web")
        );
        assert_eq!(
            config.repositories[0].checkout_path(Path::new("/root")),
            PathBuf::from("/root/repos/acme/api")
        );
    }

    #[test]
    fn test_missing_config_is_not_found() {
        let err = RepositoryConfig::load(Path::new("/nonexistent/production.yaml")).unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().starts_with("Config file not found"));
    }

    #[test]
    fn test_malformed_config() {
        let err = RepositoryConfig::from_yaml("repositories: 12", Path::new("bad.yaml")).unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn test_save_writes_header_and_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config/collection/production.yaml");
        let config = RepositoryConfig {
            repositories: vec![RepositoryEntry {
                owner: "acme".to_string(),
                name: "api".to_string(),
                branch: Some("main".to_string()),
                path: None,
            }],
        };

        config.save(&path, Local::now()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Auto-generated by pmagents sync\n# Generated: "));
        assert_eq!(RepositoryConfig::load(&path).unwrap(), config);
    }
}
