//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pmagents - GitHub issue analysis and synthetic note generation
///
/// Examples:
///   pmagents pm trend --baseline 2025-01-06 --current 2025-01-13
///   pmagents pm activity --days 14
///   pmagents pm sync --apply
///   pmagents notes --category adult_neck_pain --total 10 --batch-size 2
///   pmagents notes --request note-request.json
///   pmagents issues docs/issues/github-issues-export.json
///   pmagents init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .pmagents.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Root of the github-pm checkout (snapshots and collection configs)
    #[arg(long, value_name = "DIR", env = "GITHUB_PM_ROOT", global = true)]
    pub github_pm_root: Option<PathBuf>,

    /// Root of the synthetic-notes checkout (prompts and output)
    #[arg(long, value_name = "DIR", env = "SYNTHETIC_NOTES_ROOT", global = true)]
    pub notes_root: Option<PathBuf>,

    /// Text-generation model to use for notes
    #[arg(short, long, env = "PMAGENTS_MODEL", global = true)]
    pub model: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run a GitHub project-management analysis task
    Pm {
        #[command(subcommand)]
        task: PmCommand,
    },

    /// Generate a batch of synthetic clinical notes
    Notes {
        /// Note category (e.g. adult_neck_pain, torticollis)
        #[arg(long, alias = "prompt-type", value_name = "CATEGORY")]
        category: Option<String>,

        /// Total number of notes to generate [default: 10]
        #[arg(long, value_name = "COUNT")]
        total: Option<i64>,

        /// Notes requested per API call [default: 2]
        #[arg(long, value_name = "COUNT")]
        batch_size: Option<i64>,

        /// JSON request object (`-` reads stdin); flags override its fields
        #[arg(long, value_name = "FILE")]
        request: Option<PathBuf>,

        /// API key for the text-generation service
        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Print milestone and board reports from an issue export
    Issues {
        /// Issue export JSON (defaults to the configured export path)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,
    },

    /// Generate a default .pmagents.toml configuration file
    InitConfig,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PmCommand {
    /// Compare two issue snapshots
    Trend {
        /// Baseline snapshot label
        #[arg(long, value_name = "LABEL")]
        baseline: String,

        /// Current snapshot label
        #[arg(long, value_name = "LABEL")]
        current: String,

        /// Print only the rendered Markdown report
        #[arg(long)]
        report_only: bool,
    },

    /// Summarize commit activity across configured repositories
    Activity {
        /// Lookback window in days
        #[arg(long, default_value = "7", value_name = "DAYS")]
        days: i64,

        /// Repository list, relative to the github-pm root
        #[arg(long, value_name = "FILE")]
        config_file: Option<PathBuf>,

        /// Print only the rendered Markdown report
        #[arg(long)]
        report_only: bool,
    },

    /// Discover repositories and apply filter rules
    Sync {
        /// Filter rules, relative to the github-pm root
        #[arg(long, value_name = "FILE")]
        filters_file: Option<PathBuf>,

        /// Write the resulting repository list (default is a dry run)
        #[arg(long)]
        apply: bool,

        /// GitHub token for API requests
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,
    },

    /// List available issue snapshots
    Snapshots,

    /// Execute a raw JSON request object (`-` reads stdin)
    Run {
        #[arg(long, value_name = "FILE")]
        request: PathBuf,

        /// GitHub token for API requests
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,
    },
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref root) = self.github_pm_root {
            if root.exists() && !root.is_dir() {
                return Err(format!(
                    "github-pm root is not a directory: {}",
                    root.display()
                ));
            }
        }

        if let Some(ref root) = self.notes_root {
            if root.exists() && !root.is_dir() {
                return Err(format!(
                    "synthetic-notes root is not a directory: {}",
                    root.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `verbose_by_default` comes from `[general] verbose`; `--quiet` wins over it.
    pub fn log_level(&self, verbose_by_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_by_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
