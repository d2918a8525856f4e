//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.pmagents.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".pmagents.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Where the tools find their inputs.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Task dispatcher settings.
    #[serde(default)]
    pub pm: PmConfig,

    /// Note generator settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Trend insight thresholds.
    #[serde(default)]
    pub insights: InsightThresholds,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Root directories of the data the tools work on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Checkout holding issue snapshots and collection configs.
    #[serde(default = "default_github_pm_root")]
    pub github_pm_root: PathBuf,

    /// Checkout holding `prompts/` and `output/` for note generation.
    #[serde(default = "default_synthetic_notes_root")]
    pub synthetic_notes_root: PathBuf,

    /// Issue export read by the static reporter.
    #[serde(default = "default_issues_export")]
    pub issues_export: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            github_pm_root: default_github_pm_root(),
            synthetic_notes_root: default_synthetic_notes_root(),
            issues_export: default_issues_export(),
        }
    }
}

fn workspace_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join("workspace")
}

fn default_github_pm_root() -> PathBuf {
    workspace_dir().join("github-pm")
}

fn default_synthetic_notes_root() -> PathBuf {
    workspace_dir().join("synthetic-notes")
}

fn default_issues_export() -> PathBuf {
    PathBuf::from("dat/github-issues-export.json")
}

/// Locations relative to `github_pm_root` and the GitHub endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmConfig {
    /// Directory containing one folder per snapshot.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Repository list read by the daily activity task.
    #[serde(default = "default_collection_config")]
    pub activity_config: PathBuf,

    /// Filter rules read by the repository sync task.
    #[serde(default = "default_filters_file")]
    pub filters_file: PathBuf,

    /// Where a non-dry-run sync writes the repository list.
    #[serde(default = "default_collection_config")]
    pub output_config: PathBuf,

    /// GitHub REST API base URL.
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// HTTP timeout for GitHub requests.
    #[serde(default = "default_pm_timeout")]
    pub timeout_seconds: u64,
}

impl Default for PmConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            activity_config: default_collection_config(),
            filters_file: default_filters_file(),
            output_config: default_collection_config(),
            github_api_url: default_github_api_url(),
            timeout_seconds: default_pm_timeout(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_collection_config() -> PathBuf {
    PathBuf::from("config/collection/production.yaml")
}

fn default_filters_file() -> PathBuf {
    PathBuf::from("config/collection/repo_filters.yaml")
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_pm_timeout() -> u64 {
    60
}

/// Text-generation API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Model identifier sent with each request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Messages API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Maximum tokens per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_generator_timeout")]
    pub timeout_seconds: u64,

    /// USD per million input tokens.
    #[serde(default = "default_price_input")]
    pub price_per_million_input: f64,

    /// USD per million output tokens.
    #[serde(default = "default_price_output")]
    pub price_per_million_output: f64,

    /// Token separating notes in a response.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_url: default_api_url(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_generator_timeout(),
            price_per_million_input: default_price_input(),
            price_per_million_output: default_price_output(),
            delimiter: default_delimiter(),
        }
    }
}

fn default_model() -> String {
    "claude-opus-4-1-20250805".to_string()
}

fn default_api_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_max_tokens() -> u32 {
    8000
}

fn default_generator_timeout() -> u64 {
    600
}

fn default_price_input() -> f64 {
    15.0
}

fn default_price_output() -> f64 {
    75.0
}

fn default_delimiter() -> String {
    "---NEXT NOTE---".to_string()
}

/// Thresholds for the heuristic trend insights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InsightThresholds {
    /// Minimum count for a transition pair to be called out.
    #[serde(default = "default_transition_threshold")]
    pub transition_threshold: usize,

    /// Minimum increase in a repository's closed count.
    #[serde(default = "default_closed_spike_threshold")]
    pub closed_spike_threshold: usize,

    /// Minimum net growth or shrink of the backlog.
    #[serde(default = "default_net_change_threshold")]
    pub net_change_threshold: usize,

    /// Minimum number of reopened issues.
    #[serde(default = "default_reopened_threshold")]
    pub reopened_threshold: usize,

    /// Minimum increase in `Blocked` issues.
    #[serde(default = "default_blocked_increase_threshold")]
    pub blocked_increase_threshold: usize,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            transition_threshold: default_transition_threshold(),
            closed_spike_threshold: default_closed_spike_threshold(),
            net_change_threshold: default_net_change_threshold(),
            reopened_threshold: default_reopened_threshold(),
            blocked_increase_threshold: default_blocked_increase_threshold(),
        }
    }
}

fn default_transition_threshold() -> usize {
    3
}

fn default_closed_spike_threshold() -> usize {
    5
}

fn default_net_change_threshold() -> usize {
    5
}

fn default_reopened_threshold() -> usize {
    2
}

fn default_blocked_increase_threshold() -> usize {
    2
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.expand_paths();

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    fn expand_paths(&mut self) {
        self.paths.github_pm_root = expand_home(&self.paths.github_pm_root);
        self.paths.synthetic_notes_root = expand_home(&self.paths.synthetic_notes_root);
        self.paths.issues_export = expand_home(&self.paths.issues_export);
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref root) = args.github_pm_root {
            self.paths.github_pm_root = expand_home(root);
        }
        if let Some(ref root) = args.notes_root {
            self.paths.synthetic_notes_root = expand_home(root);
        }
        if let Some(ref model) = args.model {
            self.generator.model = model.clone();
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
