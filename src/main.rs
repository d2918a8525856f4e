//! pmagents - GitHub project analysis and synthetic note generation
//!
//! Three tools behind one CLI: a task dispatcher over github-pm snapshots
//! and repositories, a batch generator for synthetic SOAP notes, and a
//! static issue report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - The task returned an error result, or a runtime error occurred

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod notes;
mod pm;
mod report;

use anyhow::{Context, Result};
use cli::{Args, Command, PmCommand};
use config::{Config, DEFAULT_CONFIG_FILE};
use error::read_request;
use models::TaskResult;
use notes::{AnthropicClient, NoteGenerator, NoteRequest};
use pm::{GitHubSource, PmAgent, TaskRequest};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    // Load configuration; `[general] verbose` feeds the log level
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("pmagents v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .pmagents.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize paths, model, pricing, and insight thresholds.");
    Ok(())
}

/// Initialize logging at the given level.
///
/// Logs go to stderr; stdout carries only results.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Dispatch the subcommand. Returns the process exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    match args.command {
        Command::Pm { ref task } => run_pm(task, &config).await,
        Command::Notes {
            ref category,
            total,
            batch_size,
            ref request,
            ref api_key,
        } => {
            let from_file = match request {
                Some(path) => match read_request::<NoteRequest>(path) {
                    Ok(request) => request,
                    Err(e) => return print_result(&TaskResult::<()>::from_output(Err(e))),
                },
                None => NoteRequest::default(),
            };
            let request = from_file.overridden_by(NoteRequest {
                category: category.clone(),
                total,
                batch_size,
            });
            run_notes(&request, api_key.clone(), &config, !args.quiet).await
        }
        Command::Issues { ref path } => run_issues(path.as_deref(), &config),
        Command::InitConfig => handle_init_config().map(|()| 0),
    }
}

async fn run_pm(task: &PmCommand, config: &Config) -> Result<i32> {
    let token = match task {
        PmCommand::Sync { github_token, .. } | PmCommand::Run { github_token, .. } => {
            github_token.clone()
        }
        _ => None,
    };

    let source = match GitHubSource::new(&config.pm, token) {
        Ok(source) => source,
        Err(e) => return print_result(&TaskResult::<()>::from_output(Err(e))),
    };
    let agent = PmAgent::from_config(config, source);
    eprintln!(
        "📂 github-pm root: {}",
        config.paths.github_pm_root.display()
    );

    let (result, report_only) = match task {
        PmCommand::Trend {
            baseline,
            current,
            report_only,
        } => {
            eprintln!("📊 Comparing {} against {}...", current, baseline);
            let request = TaskRequest::TrendAnalysis {
                baseline_snapshot: Some(baseline.clone()),
                current_snapshot: Some(current.clone()),
            };
            (agent.execute(request).await, *report_only)
        }
        PmCommand::Activity {
            days,
            config_file,
            report_only,
        } => {
            eprintln!("📈 Collecting {} days of commit activity...", days);
            let request = TaskRequest::DailyActivity {
                days: Some(*days),
                config_file: config_file.clone(),
            };
            (agent.execute(request).await, *report_only)
        }
        PmCommand::Sync {
            filters_file,
            apply,
            ..
        } => {
            if *apply {
                eprintln!("🔄 Syncing repositories (writing collection config)...");
            } else {
                eprintln!("🔄 Syncing repositories (dry run)...");
            }
            let request = TaskRequest::SyncRepos {
                dry_run: Some(!apply),
                filters_file: filters_file.clone(),
            };
            (agent.execute(request).await, false)
        }
        PmCommand::Snapshots => (agent.execute(TaskRequest::ListSnapshots {}).await, false),
        PmCommand::Run { request, .. } => match read_request::<serde_json::Value>(request) {
            Ok(value) => (agent.execute_value(value).await, false),
            Err(e) => return print_result(&TaskResult::<()>::from_output(Err(e))),
        },
    };

    if report_only {
        if let Some(report) = result.success().and_then(|p| p.report()) {
            println!("{}", report);
            return Ok(0);
        }
    }

    print_result(&result)
}

async fn run_notes(
    request: &NoteRequest,
    api_key: Option<String>,
    config: &Config,
    show_progress: bool,
) -> Result<i32> {
    let api_key = match api_key.filter(|k| !k.is_empty()) {
        Some(key) => key,
        None => {
            let result: TaskResult<()> = TaskResult::error("ANTHROPIC_API_KEY is not set");
            return print_result(&result);
        }
    };

    let client = match AnthropicClient::new(&config.generator, api_key) {
        Ok(client) => client,
        Err(e) => return print_result(&TaskResult::<()>::from_output(Err(e))),
    };

    eprintln!("📝 Generating synthetic notes...");
    eprintln!("   Model: {}", config.generator.model);
    eprintln!(
        "   Notes root: {}",
        config.paths.synthetic_notes_root.display()
    );

    let generator = NoteGenerator::new(client, &config.paths.synthetic_notes_root, &config.generator)
        .with_progress(show_progress);
    let result = generator.execute(request).await;

    if let Some(report) = result.success() {
        eprintln!(
            "\n✅ {} notes written to {} (${:.4})",
            report.notes_generated,
            report.batch_folder_path.display(),
            report.usage.total_cost
        );
    }

    print_result(&result)
}

fn run_issues(path: Option<&Path>, config: &Config) -> Result<i32> {
    let path = path.unwrap_or(&config.paths.issues_export);
    info!("Loading issue export from {}", path.display());

    match report::issues::load_export(path) {
        Ok(export) => {
            print!("{}", report::issues::render_issue_report(&export));
            Ok(0)
        }
        Err(e) => {
            error!("Issue report failed: {}", e);
            eprintln!("❌ Error: {}", e);
            Ok(1)
        }
    }
}

/// Print a result as JSON; exit code 1 when it is an error.
fn print_result<T: Serialize>(result: &TaskResult<T>) -> Result<i32> {
    println!("{}", report::to_json(result)?);
    if let Some(message) = result.message() {
        eprintln!("❌ Error: {}", message);
    }
    Ok(if result.is_success() { 0 } else { 1 })
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is initialized, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}", DEFAULT_CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
