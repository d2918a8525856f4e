//! GitHub project-management task dispatcher.
//!
//! A request names one of four tasks; `PmAgent` routes it to the matching
//! handler and wraps the outcome in a `TaskResult`. Handlers check their own
//! parameters and inputs, so every failure comes back as an error result.

pub mod activity;
pub mod collection;
pub mod snapshots;
pub mod sync;

use crate::analysis::comparator::{OverallChanges, RepositoryChange, StateChanges};
use crate::analysis::{compare, ComparisonResult};
use crate::config::{Config, InsightThresholds, PmConfig};
use crate::error::{TaskError, TaskOutput};
use crate::models::TaskResult;
use crate::report::{activity::render_activity_report, trend::render_trend_report};
use activity::{collect_activity, ActivityMetadata, ActivityTotals, ActivityWindow, RepositoryActivity};
use chrono::{Local, Utc};
use collection::{RepositoryConfig, RepositoryEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snapshots::SnapshotRole;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use sync::{RepoFilters, RepoSource, SyncStats};
use tracing::info;

pub use sync::GitHubSource;

/// Task names accepted by the dispatcher.
pub const VALID_TASKS: [&str; 4] = [
    "trend_analysis",
    "daily_activity",
    "sync_repos",
    "list_snapshots",
];

const DEFAULT_DAYS: i64 = 7;

/// A dispatcher request, tagged by its `task` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskRequest {
    TrendAnalysis {
        baseline_snapshot: Option<String>,
        current_snapshot: Option<String>,
    },
    DailyActivity {
        days: Option<i64>,
        config_file: Option<PathBuf>,
    },
    SyncRepos {
        dry_run: Option<bool>,
        filters_file: Option<PathBuf>,
    },
    ListSnapshots {},
}

impl TaskRequest {
    /// Parse a raw request object, rejecting unknown task names first.
    pub fn from_value(value: Value) -> TaskOutput<Self> {
        let task = match value.get("task").and_then(Value::as_str) {
            Some(task) if VALID_TASKS.contains(&task) => task.to_string(),
            other => {
                return Err(TaskError::Validation(format!(
                    "Unknown task: {}. Valid tasks: {}",
                    other.unwrap_or("<missing>"),
                    VALID_TASKS.join(", ")
                )))
            }
        };

        serde_json::from_value(value).map_err(|e| {
            TaskError::Validation(format!("Invalid parameters for {}: {}", task, e))
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendPayload {
    pub baseline_snapshot: String,
    pub current_snapshot: String,
    pub insights: Vec<String>,
    pub overall_changes: OverallChanges,
    pub state_changes: StateChanges,
    pub repository_changes: BTreeMap<String, RepositoryChange>,
    pub report: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityPayload {
    pub days: u32,
    pub metadata: ActivityMetadata,
    pub totals: ActivityTotals,
    pub repositories: Vec<String>,
    pub activity: BTreeMap<String, RepositoryActivity>,
    pub report: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncPayload {
    pub dry_run: bool,
    pub stats: SyncStats,
    pub repositories: Vec<RepositoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotList {
    pub snapshots: Vec<String>,
    pub total: usize,
}

/// Successful task output, tagged by `task`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskPayload {
    TrendAnalysis(TrendPayload),
    DailyActivity(ActivityPayload),
    SyncRepos(SyncPayload),
    ListSnapshots(SnapshotList),
}

impl TaskPayload {
    /// Rendered Markdown report, for tasks that produce one.
    pub fn report(&self) -> Option<&str> {
        match self {
            TaskPayload::TrendAnalysis(p) => Some(&p.report),
            TaskPayload::DailyActivity(p) => Some(&p.report),
            TaskPayload::SyncRepos(_) | TaskPayload::ListSnapshots(_) => None,
        }
    }
}

/// Routes dispatcher requests against one github-pm checkout.
pub struct PmAgent<S> {
    root: PathBuf,
    pm: PmConfig,
    thresholds: InsightThresholds,
    source: S,
}

impl<S: RepoSource> PmAgent<S> {
    pub fn new(root: PathBuf, pm: PmConfig, thresholds: InsightThresholds, source: S) -> Self {
        Self {
            root,
            pm,
            thresholds,
            source,
        }
    }

    pub fn from_config(config: &Config, source: S) -> Self {
        Self::new(
            config.paths.github_pm_root.clone(),
            config.pm.clone(),
            config.insights,
            source,
        )
    }

    fn data_path(&self) -> PathBuf {
        self.root.join(&self.pm.data_dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub async fn execute(&self, request: TaskRequest) -> TaskResult<TaskPayload> {
        TaskResult::from_output(self.dispatch(request).await)
    }

    /// Execute a raw JSON request object.
    pub async fn execute_value(&self, value: Value) -> TaskResult<TaskPayload> {
        match TaskRequest::from_value(value) {
            Ok(request) => self.execute(request).await,
            Err(e) => TaskResult::from_output(Err(e)),
        }
    }

    async fn dispatch(&self, request: TaskRequest) -> TaskOutput<TaskPayload> {
        match request {
            TaskRequest::TrendAnalysis {
                baseline_snapshot,
                current_snapshot,
            } => self
                .trend_analysis(baseline_snapshot, current_snapshot)
                .map(TaskPayload::TrendAnalysis),
            TaskRequest::DailyActivity { days, config_file } => self
                .daily_activity(days, config_file)
                .map(TaskPayload::DailyActivity),
            TaskRequest::SyncRepos {
                dry_run,
                filters_file,
            } => self
                .sync_repos(dry_run, filters_file)
                .await
                .map(TaskPayload::SyncRepos),
            TaskRequest::ListSnapshots {} => self.list_snapshots().map(TaskPayload::ListSnapshots),
        }
    }

    fn trend_analysis(
        &self,
        baseline: Option<String>,
        current: Option<String>,
    ) -> TaskOutput<TrendPayload> {
        let (baseline, current) = match (baseline, current) {
            (Some(b), Some(c)) if !b.is_empty() && !c.is_empty() => (b, c),
            _ => {
                return Err(TaskError::Validation(
                    "Both baseline_snapshot and current_snapshot are required".to_string(),
                ))
            }
        };

        let data_path = self.data_path();
        let baseline_snapshot = snapshots::load_snapshot(&data_path, &baseline, SnapshotRole::Baseline)?;
        let current_snapshot = snapshots::load_snapshot(&data_path, &current, SnapshotRole::Current)?;

        info!("Comparing snapshot {} against {}", current, baseline);
        let ComparisonResult {
            overall_changes,
            state_changes,
            repository_changes,
            insights,
        } = compare(&baseline_snapshot, &current_snapshot, &self.thresholds);

        let mut payload = TrendPayload {
            baseline_snapshot: baseline,
            current_snapshot: current,
            insights,
            overall_changes,
            state_changes,
            repository_changes,
            report: String::new(),
        };
        payload.report = render_trend_report(&payload);

        Ok(payload)
    }

    fn daily_activity(
        &self,
        days: Option<i64>,
        config_file: Option<PathBuf>,
    ) -> TaskOutput<ActivityPayload> {
        let days = days.unwrap_or(DEFAULT_DAYS);
        let days = u32::try_from(days)
            .ok()
            .filter(|d| *d >= 1)
            .ok_or_else(|| {
                TaskError::Validation(format!("Invalid days: {}. Must be positive integer.", days))
            })?;

        let config_path = self.resolve(config_file.as_deref().unwrap_or(&self.pm.activity_config));
        let config = RepositoryConfig::load(&config_path)?;

        info!(
            "Collecting {} days of activity across {} repositories",
            days,
            config.repositories.len()
        );
        let window = ActivityWindow::ending_at(Utc::now(), days)?;
        let data = collect_activity(&self.root, &config, window);
        let report = render_activity_report(&data);

        Ok(ActivityPayload {
            days,
            metadata: data.metadata,
            totals: data.totals,
            repositories: data.repositories.keys().cloned().collect(),
            activity: data.repositories,
            report,
        })
    }

    async fn sync_repos(
        &self,
        dry_run: Option<bool>,
        filters_file: Option<PathBuf>,
    ) -> TaskOutput<SyncPayload> {
        let dry_run = dry_run.unwrap_or(true);
        let filters_path = self.resolve(filters_file.as_deref().unwrap_or(&self.pm.filters_file));
        let filters = RepoFilters::load(&filters_path)?;

        let (repo_config, stats) = sync::discover(&self.source, &filters, Utc::now()).await?;
        info!(
            "Sync kept {} of {} repositories",
            stats.kept, stats.considered
        );

        let output_file = if dry_run {
            None
        } else {
            let output_path = self.resolve(&self.pm.output_config);
            repo_config.save(&output_path, Local::now())?;
            Some(output_path)
        };

        Ok(SyncPayload {
            dry_run,
            stats,
            repositories: repo_config.repositories,
            output_file,
        })
    }

    fn list_snapshots(&self) -> TaskOutput<SnapshotList> {
        let snapshots = snapshots::list_snapshots(&self.data_path())?;
        Ok(SnapshotList {
            total: snapshots.len(),
            snapshots,
        })
    }
}
