//! Repository discovery and filtering.
//!
//! Candidates come from a `RepoSource` (the GitHub REST API in production),
//! pass through the filter rules in a fixed order, and the survivors become
//! the repository collection document.

use crate::config::PmConfig;
use crate::error::{read_input, TaskError, TaskOutput};
use crate::pm::collection::{RepositoryConfig, RepositoryEntry};
use chrono::{DateTime, Utc};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const PAGE_SIZE: usize = 100;

/// Filter document read from `repo_filters.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoFilters {
    /// Organizations or users to discover repositories under.
    #[serde(default)]
    pub owners: Vec<String>,

    /// Glob patterns on `owner/name` or `name`; empty keeps everything.
    #[serde(default)]
    pub include_patterns: Vec<String>,

    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Primary languages to keep (case-insensitive); empty keeps everything.
    #[serde(default)]
    pub include_languages: Vec<String>,

    #[serde(default = "default_true")]
    pub exclude_archived: bool,

    #[serde(default = "default_true")]
    pub exclude_forks: bool,

    /// Drop repositories with no push in this many days.
    #[serde(default)]
    pub max_inactive_days: Option<i64>,
}

fn default_true() -> bool {
    true
}

impl RepoFilters {
    pub fn load(path: &Path) -> TaskOutput<Self> {
        let content = read_input(path, "Filters file")?;
        Self::from_yaml(&content, path)
    }

    fn from_yaml(content: &str, path: &Path) -> TaskOutput<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            TaskError::Malformed(format!("Malformed filters file {}: {}", path.display(), e))
        })
    }
}

/// A candidate repository reported by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredRepo {
    pub owner: String,
    pub name: String,
    pub archived: bool,
    pub fork: bool,
    pub language: Option<String>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub default_branch: Option<String>,
}

impl DiscoveredRepo {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// First filter rule a repository failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Archived,
    Fork,
    NotIncluded,
    Excluded,
    Language,
    Inactive,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub considered: usize,
    pub kept: usize,
    pub dropped: usize,
    pub drop_reasons: BTreeMap<DropReason, usize>,
}

/// Filter rules with their glob patterns compiled.
pub struct CompiledFilters {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    languages: Vec<String>,
    exclude_archived: bool,
    exclude_forks: bool,
    max_inactive_days: Option<i64>,
}

impl CompiledFilters {
    pub fn new(filters: &RepoFilters) -> TaskOutput<Self> {
        Ok(Self {
            include: compile_patterns(&filters.include_patterns)?,
            exclude: compile_patterns(&filters.exclude_patterns)?,
            languages: filters
                .include_languages
                .iter()
                .map(|l| l.to_lowercase())
                .collect(),
            exclude_archived: filters.exclude_archived,
            exclude_forks: filters.exclude_forks,
            max_inactive_days: filters.max_inactive_days,
        })
    }

    /// The reason `repo` is dropped, or `None` when it is kept.
    pub fn check(&self, repo: &DiscoveredRepo, now: DateTime<Utc>) -> Option<DropReason> {
        let full_name = repo.full_name();
        let matches = |p: &Pattern| p.matches(&full_name) || p.matches(&repo.name);

        if self.exclude_archived && repo.archived {
            return Some(DropReason::Archived);
        }
        if self.exclude_forks && repo.fork {
            return Some(DropReason::Fork);
        }
        if !self.include.is_empty() && !self.include.iter().any(matches) {
            return Some(DropReason::NotIncluded);
        }
        if self.exclude.iter().any(matches) {
            return Some(DropReason::Excluded);
        }
        if !self.languages.is_empty() {
            let language = repo.language.as_deref().map(str::to_lowercase);
            if !language.is_some_and(|l| self.languages.contains(&l)) {
                return Some(DropReason::Language);
            }
        }
        if let (Some(max_days), Some(pushed_at)) = (self.max_inactive_days, repo.pushed_at) {
            if (now - pushed_at).num_days() > max_days {
                return Some(DropReason::Inactive);
            }
        }

        None
    }
}

fn compile_patterns(patterns: &[String]) -> TaskOutput<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p)
                .map_err(|e| TaskError::Malformed(format!("Invalid pattern '{}': {}", p, e)))
        })
        .collect()
}

/// Split candidates into kept repositories and drop statistics.
pub fn apply_filters(
    repos: Vec<DiscoveredRepo>,
    filters: &CompiledFilters,
    now: DateTime<Utc>,
) -> (Vec<DiscoveredRepo>, SyncStats) {
    let mut stats = SyncStats {
        considered: repos.len(),
        ..SyncStats::default()
    };
    let mut kept = Vec::new();

    for repo in repos {
        match filters.check(&repo, now) {
            Some(reason) => {
                debug!("Dropping {} ({:?})", repo.full_name(), reason);
                *stats.drop_reasons.entry(reason).or_insert(0) += 1;
                stats.dropped += 1;
            }
            None => kept.push(repo),
        }
    }

    stats.kept = kept.len();
    (kept, stats)
}

/// Somewhere repositories can be discovered.
pub trait RepoSource {
    async fn list_repositories(&self, owner: &str) -> TaskOutput<Vec<DiscoveredRepo>>;
}

/// Discover every owner's repositories and filter them.
pub async fn discover<S: RepoSource>(
    source: &S,
    filters: &RepoFilters,
    now: DateTime<Utc>,
) -> TaskOutput<(RepositoryConfig, SyncStats)> {
    if filters.owners.is_empty() {
        return Err(TaskError::Validation(
            "Filters file lists no owners".to_string(),
        ));
    }
    let compiled = CompiledFilters::new(filters)?;

    let mut candidates = Vec::new();
    for owner in &filters.owners {
        let repos = source.list_repositories(owner).await?;
        info!("Discovered {} repositories under {}", repos.len(), owner);
        candidates.extend(repos);
    }

    let (mut kept, stats) = apply_filters(candidates, &compiled, now);
    kept.sort_by_key(|r| r.full_name());

    let repositories = kept
        .into_iter()
        .map(|r| RepositoryEntry {
            owner: r.owner,
            name: r.name,
            branch: r.default_branch,
            path: None,
        })
        .collect();

    Ok((RepositoryConfig { repositories }, stats))
}

/// Repository as returned by the GitHub REST API.
#[derive(Debug, Deserialize)]
struct GitHubRepo {
    name: String,
    owner: GitHubOwner,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    fork: bool,
    language: Option<String>,
    pushed_at: Option<DateTime<Utc>>,
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubOwner {
    login: String,
}

impl From<GitHubRepo> for DiscoveredRepo {
    fn from(repo: GitHubRepo) -> Self {
        Self {
            owner: repo.owner.login,
            name: repo.name,
            archived: repo.archived,
            fork: repo.fork,
            language: repo.language,
            pushed_at: repo.pushed_at,
            default_branch: repo.default_branch,
        }
    }
}

/// Lists repositories through the GitHub REST API.
pub struct GitHubSource {
    http_client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubSource {
    pub fn new(config: &PmConfig, token: Option<String>) -> TaskOutput<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("pmagents/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TaskError::Collaborator(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_url: config.github_api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// Fetch one page; `Ok(None)` when the endpoint does not exist.
    async fn fetch_page(&self, url: &str, page: usize) -> TaskOutput<Option<Vec<GitHubRepo>>> {
        let mut request = self
            .http_client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .query(&[
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ]);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TaskError::Collaborator(format!("GitHub request timed out: {}", url))
            } else if e.is_connect() {
                TaskError::Collaborator(format!("Cannot connect to {}", self.api_url))
            } else {
                TaskError::Collaborator(format!("GitHub request failed: {}", e))
            }
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TaskError::Collaborator(format!(
                "GitHub API error {}: {}",
                status, body
            )));
        }

        let repos = response.json().await.map_err(|e| {
            TaskError::Collaborator(format!("Failed to parse GitHub response: {}", e))
        })?;
        Ok(Some(repos))
    }

    async fn list_all(&self, url: &str) -> TaskOutput<Option<Vec<DiscoveredRepo>>> {
        let repos = collect_pages(move |page| self.fetch_page(url, page)).await?;
        Ok(repos.map(|repos| repos.into_iter().map(DiscoveredRepo::from).collect()))
    }
}

impl RepoSource for GitHubSource {
    async fn list_repositories(&self, owner: &str) -> TaskOutput<Vec<DiscoveredRepo>> {
        let endpoints = [
            format!("{}/orgs/{}/repos", self.api_url, owner),
            format!("{}/users/{}/repos", self.api_url, owner),
        ];
        first_listing(owner, &endpoints, move |url| self.list_all(url)).await
    }
}

/// Fetch pages from 1 until a short page or a missing page.
///
/// `Ok(None)` when the first page is missing (the listing does not exist).
async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> TaskOutput<Option<Vec<T>>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = TaskOutput<Option<Vec<T>>>>,
{
    let mut all = Vec::new();
    let mut page = 1;

    loop {
        let items = match fetch_page(page).await? {
            Some(items) => items,
            None if page == 1 => return Ok(None),
            None => break,
        };

        let done = items.len() < PAGE_SIZE;
        all.extend(items);
        if done {
            break;
        }
        page += 1;
    }

    Ok(Some(all))
}

/// List from the first endpoint that exists (organization, then user).
async fn first_listing<'a, T, F, Fut>(
    owner: &str,
    endpoints: &'a [String],
    mut list: F,
) -> TaskOutput<Vec<T>>
where
    F: FnMut(&'a str) -> Fut,
    Fut: Future<Output = TaskOutput<Option<Vec<T>>>>,
{
    for url in endpoints {
        if let Some(items) = list(url.as_str()).await? {
            return Ok(items);
        }
        debug!("{} has no listing at {}", owner, url);
    }

    Err(TaskError::NotFound(format!("GitHub owner not found: {}", owner)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    pub(crate) fn repo(owner: &str, name: &str) -> DiscoveredRepo {
        DiscoveredRepo {
            owner: owner.to_string(),
            name: name.to_string(),
            archived: false,
            fork: false,
            language: Some("Rust".to_string()),
            pushed_at: Some(Utc::now() - ChronoDuration::days(1)),
            default_branch: Some("main".to_string()),
        }
    }

    /// Serves a fixed list per owner.
    pub(crate) struct FakeSource {
        pub(crate) repos: Vec<DiscoveredRepo>,
    }

    impl RepoSource for FakeSource {
        async fn list_repositories(&self, owner: &str) -> TaskOutput<Vec<DiscoveredRepo>> {
            Ok(self
                .repos
                .iter()
                .filter(|r| r.owner == owner)
                .cloned()
                .collect())
        }
    }

    fn filters(yaml: &str) -> RepoFilters {
        RepoFilters::from_yaml(yaml, Path::new("repo_filters.yaml")).unwrap()
    }

    #[test]
    fn test_filter_defaults() {
        let f = filters("owners: [acme]");
        assert!(f.exclude_archived);
        assert!(f.exclude_forks);
        assert!(f.include_patterns.is_empty());
        assert_eq!(f.max_inactive_days, None);
    }

    #[test]
    fn test_first_failing_rule_names_reason() {
        let compiled = CompiledFilters::new(&filters(
            r#"
owners: [acme]
include_patterns: ["acme/*"]
exclude_patterns: ["*-sandbox"]
include_languages: [rust, python]
max_inactive_days: 90
"#,
        ))
        .unwrap();
        let now = Utc::now();

        let archived_fork = DiscoveredRepo {
            archived: true,
            fork: true,
            ..repo("acme", "old")
        };
        assert_eq!(compiled.check(&archived_fork, now), Some(DropReason::Archived));

        let fork = DiscoveredRepo {
            fork: true,
            ..repo("acme", "fork")
        };
        assert_eq!(compiled.check(&fork, now), Some(DropReason::Fork));
        assert_eq!(
            compiled.check(&repo("other", "api"), now),
            Some(DropReason::NotIncluded)
        );
        assert_eq!(
            compiled.check(&repo("acme", "api-sandbox"), now),
            Some(DropReason::Excluded)
        );

        let go = DiscoveredRepo {
            language: Some("Go".to_string()),
            ..repo("acme", "cli")
        };
        assert_eq!(compiled.check(&go, now), Some(DropReason::Language));

        let stale = DiscoveredRepo {
            pushed_at: Some(now - ChronoDuration::days(200)),
            ..repo("acme", "legacy")
        };
        assert_eq!(compiled.check(&stale, now), Some(DropReason::Inactive));

        assert_eq!(compiled.check(&repo("acme", "api"), now), None);
    }

    #[test]
    fn test_bad_pattern_is_malformed() {
        let err = CompiledFilters::new(&filters("owners: [acme]\ninclude_patterns: [\"[\"]"))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn test_discover_counts_and_sorts() {
        let source = FakeSource {
            repos: vec![
                repo("acme", "web"),
                repo("acme", "api"),
                DiscoveredRepo {
                    archived: true,
                    ..repo("acme", "old")
                },
                DiscoveredRepo {
                    fork: true,
                    ..repo("acme", "fork")
                },
                repo("elsewhere", "ignored"),
            ],
        };

        let (config, stats) =
            tokio_test::block_on(discover(&source, &filters("owners: [acme]"), Utc::now())).unwrap();

        assert_eq!(stats.considered, 4);
        assert_eq!(stats.kept, 2);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.drop_reasons[&DropReason::Archived], 1);
        assert_eq!(stats.drop_reasons[&DropReason::Fork], 1);

        let names: Vec<String> = config.repositories.iter().map(|r| r.full_name()).collect();
        assert_eq!(names, vec!["acme/api", "acme/web"]);
        assert_eq!(config.repositories[0].branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_discover_requires_owners() {
        let source = FakeSource { repos: vec![] };
        let err = tokio_test::block_on(discover(&source, &filters("{}"), Utc::now())).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    /// Canned page sizes; `None` answers 404.
    fn pages(
        sizes: &[Option<usize>],
    ) -> impl FnMut(usize) -> std::future::Ready<TaskOutput<Option<Vec<usize>>>> + '_ {
        move |page| {
            let body = sizes
                .get(page - 1)
                .copied()
                .flatten()
                .map(|n| (0..n).map(|i| (page - 1) * PAGE_SIZE + i).collect());
            std::future::ready(Ok(body))
        }
    }

    #[test]
    fn test_paging_stops_on_short_page() {
        let items = tokio_test::block_on(collect_pages(pages(&[Some(100), Some(100), Some(7)])))
            .unwrap()
            .unwrap();

        assert_eq!(items.len(), 207);
        assert_eq!(items[206], 206);
    }

    #[test]
    fn test_paging_full_page_then_missing() {
        let items = tokio_test::block_on(collect_pages(pages(&[Some(100), None])))
            .unwrap()
            .unwrap();
        assert_eq!(items.len(), 100);

        let empty = tokio_test::block_on(collect_pages(pages(&[Some(100), Some(0)])))
            .unwrap()
            .unwrap();
        assert_eq!(empty.len(), 100);
    }

    #[test]
    fn test_paging_missing_first_page_is_none() {
        let items = tokio_test::block_on(collect_pages(pages(&[None])));
        assert!(items.unwrap().is_none());
    }

    #[test]
    fn test_paging_error_propagates() {
        let result = tokio_test::block_on(collect_pages(|page| {
            std::future::ready(if page == 1 {
                Ok(Some(vec![0usize; PAGE_SIZE]))
            } else {
                Err(TaskError::Collaborator("GitHub API error 500".to_string()))
            })
        }));

        assert_eq!(result.unwrap_err().kind(), "collaborator");
    }

    #[test]
    fn test_owner_falls_back_to_user_listing() {
        let endpoints = ["orgs/ada".to_string(), "users/ada".to_string()];
        let mut asked = Vec::new();

        let repos = tokio_test::block_on(first_listing("ada", &endpoints, |url| {
            asked.push(url.to_string());
            std::future::ready(Ok(url.starts_with("users/").then(|| vec![repo("ada", "notes")])))
        }))
        .unwrap();

        assert_eq!(asked, endpoints);
        assert_eq!(repos[0].full_name(), "ada/notes");
    }

    #[test]
    fn test_organization_listing_wins() {
        let endpoints = ["orgs/acme".to_string(), "users/acme".to_string()];
        let mut asked = 0;

        let repos = tokio_test::block_on(first_listing("acme", &endpoints, |_| {
            asked += 1;
            std::future::ready(Ok(Some(vec![repo("acme", "api")])))
        }))
        .unwrap();

        assert_eq!(asked, 1);
        assert_eq!(repos.len(), 1);
    }

    #[test]
    fn test_unknown_owner_is_not_found() {
        let endpoints = ["orgs/ghost".to_string(), "users/ghost".to_string()];
        let err = tokio_test::block_on(first_listing("ghost", &endpoints, |_| {
            std::future::ready(Ok::<Option<Vec<DiscoveredRepo>>, TaskError>(None))
        }))
        .unwrap_err();

        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.to_string(), "GitHub owner not found: ghost");
    }

    #[test]
    fn test_github_repo_shape() {
        let json = r#"{
            "name": "api",
            "full_name": "acme/api",
            "owner": {"login": "acme"},
            "archived": false,
            "fork": false,
            "language": "Rust",
            "pushed_at": "2025-01-10T12:00:00Z",
            "default_branch": "main"
        }"#;

        let repo: DiscoveredRepo = serde_json::from_str::<GitHubRepo>(json).unwrap().into();
        assert_eq!(repo.full_name(), "acme/api");
        assert_eq!(repo.language.as_deref(), Some("Rust"));
        assert!(repo.pushed_at.is_some());
    }
}
