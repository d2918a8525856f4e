//! Commit activity across local repository checkouts.

use crate::error::{TaskError, TaskOutput};
use crate::pm::collection::{RepositoryConfig, RepositoryEntry};
use chrono::{DateTime, Duration, Utc};
use git2::{Repository, Sort};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

/// Half-open lookback window `[since, until)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityWindow {
    pub days: u32,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl ActivityWindow {
    /// Window of `days` days ending at `until`. Fails when the start falls
    /// outside the representable date range.
    pub fn ending_at(until: DateTime<Utc>, days: u32) -> TaskOutput<Self> {
        let since = Duration::try_days(i64::from(days))
            .and_then(|span| until.checked_sub_signed(span))
            .ok_or_else(|| {
                TaskError::Validation(format!("Invalid days: {}. Must be positive integer.", days))
            })?;

        Ok(Self { days, since, until })
    }

    fn contains(&self, epoch_seconds: i64) -> bool {
        epoch_seconds >= self.since.timestamp() && epoch_seconds < self.until.timestamp()
    }
}

/// Commits in the window for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryActivity {
    pub commits: usize,
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityMetadata {
    pub days: u32,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivityTotals {
    pub commits: usize,
    pub repositories: usize,
    pub active_repositories: usize,
    /// Distinct authors across all repositories.
    pub authors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityData {
    pub metadata: ActivityMetadata,
    pub totals: ActivityTotals,
    /// Keyed by `owner/name`.
    pub repositories: BTreeMap<String, RepositoryActivity>,
}

/// Walk every configured repository and count commits inside `window`.
///
/// A repository that cannot be read is recorded with its error and zero
/// counts; the others still report.
pub fn collect_activity(
    root: &Path,
    config: &RepositoryConfig,
    window: ActivityWindow,
) -> ActivityData {
    let mut repositories = BTreeMap::new();
    let mut all_authors = BTreeSet::new();

    for entry in &config.repositories {
        let activity = match repository_activity(root, entry, &window) {
            Ok((commits, authors)) => {
                debug!("{}: {} commits", entry.full_name(), commits);
                all_authors.extend(authors.iter().cloned());
                RepositoryActivity {
                    commits,
                    authors: authors.into_iter().collect(),
                    error: None,
                }
            }
            Err(e) => {
                warn!("Skipping {}: {}", entry.full_name(), e);
                RepositoryActivity {
                    error: Some(e.to_string()),
                    ..RepositoryActivity::default()
                }
            }
        };
        repositories.insert(entry.full_name(), activity);
    }

    let totals = ActivityTotals {
        commits: repositories.values().map(|r| r.commits).sum(),
        repositories: repositories.len(),
        active_repositories: repositories.values().filter(|r| r.commits > 0).count(),
        authors: all_authors.len(),
    };

    ActivityData {
        metadata: ActivityMetadata {
            days: window.days,
            since: window.since,
            until: window.until,
            generated_at: Utc::now(),
        },
        totals,
        repositories,
    }
}

fn repository_activity(
    root: &Path,
    entry: &RepositoryEntry,
    window: &ActivityWindow,
) -> TaskOutput<(usize, BTreeSet<String>)> {
    let repo = Repository::open(entry.checkout_path(root))?;

    let mut revwalk = repo.revwalk()?;
    revwalk.set_sorting(Sort::TIME)?;
    match entry.branch {
        Some(ref branch) => {
            let commit = repo.revparse_single(branch)?.peel_to_commit()?;
            revwalk.push(commit.id())?;
        }
        None => revwalk.push_head()?,
    }

    let mut commits = 0;
    let mut authors = BTreeSet::new();

    for oid in revwalk {
        let commit = repo.find_commit(oid?)?;
        if !window.contains(commit.time().seconds()) {
            continue;
        }

        commits += 1;
        let author = commit.author();
        authors.insert(author.name().unwrap_or("unknown").to_string());
    }

    Ok((commits, authors))
}
