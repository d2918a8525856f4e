//! Batch note generation.
//!
//! A run moves through a fixed sequence of phases:
//! idle, loading-prompt, allocating-folder, generating, writing,
//! reporting, done. Any phase can fail into error. Files written before
//! a failure are left in place.

pub mod category;
pub mod client;
pub mod usage;

pub use category::NoteCategory;
pub use client::{AnthropicClient, TextGenerator};
pub use usage::{Pricing, TokenUsage, UsageCounters, UsageReport};

use crate::config::GeneratorConfig;
use crate::error::{read_input, TaskError, TaskOutput};
use crate::models::TaskResult;
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Raw generation request as received from the CLI or a JSON document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteRequest {
    #[serde(alias = "prompt_type")]
    pub category: Option<String>,
    pub total: Option<i64>,
    pub batch_size: Option<i64>,
}

/// A request whose parameters passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub category: NoteCategory,
    pub total: usize,
    pub batch_size: usize,
}

const DEFAULT_TOTAL: i64 = 10;
const DEFAULT_BATCH_SIZE: i64 = 2;

impl NoteRequest {
    pub fn validate(&self) -> TaskOutput<ValidatedRequest> {
        let category = match self.category.as_deref() {
            Some(c) if !c.is_empty() => c.parse::<NoteCategory>()?,
            _ => {
                return Err(TaskError::Validation(
                    "Missing required parameter: category".to_string(),
                ))
            }
        };

        let total = self.total.unwrap_or(DEFAULT_TOTAL);
        if total <= 0 {
            return Err(TaskError::Validation(format!(
                "Invalid total: {}. Must be positive integer.",
                total
            )));
        }

        let batch_size = self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size <= 0 {
            return Err(TaskError::Validation(format!(
                "Invalid batch_size: {}. Must be positive integer.",
                batch_size
            )));
        }

        Ok(ValidatedRequest {
            category,
            total: total as usize,
            batch_size: batch_size as usize,
        })
    }

    /// Fill in fields from `overrides` wherever it sets them.
    pub fn overridden_by(self, overrides: NoteRequest) -> Self {
        Self {
            category: overrides.category.or(self.category),
            total: overrides.total.or(self.total),
            batch_size: overrides.batch_size.or(self.batch_size),
        }
    }
}

/// Phase of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    LoadingPrompt,
    AllocatingFolder,
    Generating,
    Writing,
    Reporting,
    Done,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::LoadingPrompt => "loading-prompt",
            Phase::AllocatingFolder => "allocating-folder",
            Phase::Generating => "generating",
            Phase::Writing => "writing",
            Phase::Reporting => "reporting",
            Phase::Done => "done",
            Phase::Error => "error",
        };
        f.write_str(name)
    }
}

struct PhaseTracker {
    phase: Phase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    fn advance(&mut self, next: Phase) {
        debug!("Generation phase {} -> {}", self.phase, next);
        self.phase = next;
    }
}

/// One generated note before it is written.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedNote {
    pub id: Uuid,
    pub category: NoteCategory,
    pub content: String,
}

impl GeneratedNote {
    pub fn short_id(&self) -> String {
        self.id.to_string().chars().take(8).collect()
    }

    pub fn file_name(&self) -> String {
        format!("{}_{}.md", self.category, self.short_id())
    }
}

/// Successful run summary.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub notes_generated: usize,
    pub batch_folder: String,
    pub batch_folder_path: PathBuf,
    pub files_created: Vec<String>,
    pub usage: UsageReport,
}

/// Notes and token usage produced by a single API call.
struct BatchOutput {
    notes: Vec<GeneratedNote>,
    usage: TokenUsage,
}

/// Drives a text generator to produce and store batches of notes.
pub struct NoteGenerator<G> {
    client: G,
    prompts_dir: PathBuf,
    output_dir: PathBuf,
    delimiter: String,
    pricing: Pricing,
    show_progress: bool,
}

impl<G: TextGenerator> NoteGenerator<G> {
    /// Create a generator reading `prompts/` and writing `output/` under `notes_root`.
    pub fn new(client: G, notes_root: &Path, config: &GeneratorConfig) -> Self {
        Self {
            client,
            prompts_dir: notes_root.join("prompts"),
            output_dir: notes_root.join("output"),
            delimiter: config.delimiter.clone(),
            pricing: Pricing::from(config),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run one generation request end to end.
    pub async fn execute(&self, request: &NoteRequest) -> TaskResult<GenerationReport> {
        let validated = match request.validate() {
            Ok(v) => v,
            Err(e) => return TaskResult::from_output(Err(e)),
        };

        info!(
            "Starting generation: category={} total={} batch_size={}",
            validated.category, validated.total, validated.batch_size
        );

        let mut tracker = PhaseTracker::new();
        match self.run(&validated, &mut tracker).await {
            Ok(report) => TaskResult::Success(report),
            Err(e) => {
                let failed_in = tracker.phase;
                tracker.advance(Phase::Error);
                error!(phase = %failed_in, error = ?e, "Generation failed: {}", e);
                TaskResult::error(format!("Execution failed: {}", e))
            }
        }
    }

    async fn run(
        &self,
        request: &ValidatedRequest,
        tracker: &mut PhaseTracker,
    ) -> TaskOutput<GenerationReport> {
        tracker.advance(Phase::LoadingPrompt);
        let system_prompt = load_prompts(&self.prompts_dir, request.category)?;

        tracker.advance(Phase::AllocatingFolder);
        let batch_folder = next_batch_folder(&self.output_dir)?;
        let batch_path = self.output_dir.join(&batch_folder);
        fs::create_dir_all(&batch_path).map_err(|e| {
            TaskError::io(format!("Failed to create {}", batch_path.display()), e)
        })?;
        info!("Batch folder: {}", batch_folder);

        tracker.advance(Phase::Generating);
        let (notes, counters) = self.generate_notes(&system_prompt, request).await?;

        tracker.advance(Phase::Writing);
        let mut files_created = Vec::new();
        for note in notes.iter().take(request.total) {
            files_created.push(write_note(note, &batch_path, &batch_folder)?);
        }

        tracker.advance(Phase::Reporting);
        let usage = UsageReport::new(&counters, &self.pricing);
        info!(
            "Generation complete: {} notes, {} calls, ${:.4}",
            files_created.len(),
            usage.api_calls,
            usage.total_cost
        );

        tracker.advance(Phase::Done);
        Ok(GenerationReport {
            notes_generated: files_created.len(),
            batch_folder,
            batch_folder_path: batch_path,
            files_created,
            usage,
        })
    }

    /// Call the generator until `total` notes exist or the planned calls run out.
    async fn generate_notes(
        &self,
        system_prompt: &str,
        request: &ValidatedRequest,
    ) -> TaskOutput<(Vec<GeneratedNote>, UsageCounters)> {
        let planned = request.total.div_ceil(request.batch_size);
        let progress = self.progress_bar(planned as u64);

        let mut notes: Vec<GeneratedNote> = Vec::new();
        let mut counters = UsageCounters::default();

        for batch_number in 1..=planned {
            let requested = request.batch_size.min(request.total - notes.len());
            progress.set_message(format!("batch {}/{} ({} notes)", batch_number, planned, requested));

            let batch = self
                .generate_batch(system_prompt, request.category, requested)
                .await?;
            counters = counters.record(batch.usage);

            info!(
                "Batch {}/{}: {} notes, {} in / {} out tokens",
                batch_number,
                planned,
                batch.notes.len(),
                batch.usage.input_tokens,
                batch.usage.output_tokens
            );

            notes.extend(batch.notes);
            progress.inc(1);

            if notes.len() >= request.total {
                break;
            }
        }

        progress.finish_and_clear();
        Ok((notes, counters))
    }

    async fn generate_batch(
        &self,
        system_prompt: &str,
        category: NoteCategory,
        count: usize,
    ) -> TaskOutput<BatchOutput> {
        let prompt = user_prompt(category, count, &self.delimiter);
        let completion = self.client.complete(system_prompt, &prompt).await?;

        Ok(BatchOutput {
            notes: split_notes(&completion.text, &self.delimiter, category),
            usage: completion.usage,
        })
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

/// Combine the patient-group base prompt with the category prompt.
pub fn load_prompts(prompts_dir: &Path, category: NoteCategory) -> TaskOutput<String> {
    let base_prompt = read_input(&prompts_dir.join(category.base_prompt_file()), "Base prompt")?;
    let category_prompt = read_input(&prompts_dir.join(category.prompt_file()), "Condition prompt")?;

    Ok(format!("{}\n\n---\n\n{}", base_prompt, category_prompt))
}

/// Lowest-numbered `batch_NNN` name that does not exist yet.
pub fn next_batch_folder(output_dir: &Path) -> TaskOutput<String> {
    fs::create_dir_all(output_dir).map_err(|e| {
        TaskError::io(format!("Failed to create {}", output_dir.display()), e)
    })?;

    let mut batch_num = 1u32;
    loop {
        let name = format!("batch_{:03}", batch_num);
        if !output_dir.join(&name).exists() {
            return Ok(name);
        }
        batch_num += 1;
    }
}

fn user_prompt(category: NoteCategory, count: usize, delimiter: &str) -> String {
    format!(
        "Generate {} synthetic {} chiropractic SOAP notes based on the focus areas described above.\n\n\
         Separate each note with {} delimiter.\n\
         Output ONLY the notes, nothing else.",
        count,
        category.patient_type(),
        delimiter
    )
}

/// Split a response into notes, dropping empty fragments.
pub fn split_notes(text: &str, delimiter: &str, category: NoteCategory) -> Vec<GeneratedNote> {
    text.split(delimiter)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(|fragment| GeneratedNote {
            id: Uuid::new_v4(),
            category,
            content: fragment.to_string(),
        })
        .collect()
}

/// Write one note with its metadata header; returns the file name.
fn write_note(note: &GeneratedNote, batch_path: &Path, batch_folder: &str) -> TaskOutput<String> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filename = note.file_name();
    let filepath = batch_path.join(&filename);

    let content = format!(
        "# SOAP Note\n\n\
         **ID:** {}\n\
         **Prompt Type:** {}\n\
         **Batch:** {}\n\
         **Generated:** {}\n\n\
         ---\n\n\
         {}\n",
        note.id, note.category, batch_folder, timestamp, note.content
    );

    fs::write(&filepath, content)
        .map_err(|e| TaskError::io(format!("Failed to write {}", filepath.display()), e))?;

    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::client::Completion;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const DELIMITER: &str = "---NEXT NOTE---";

    /// Returns as many notes as the prompt asks for, plus `extra` on chosen calls.
    struct FakeGenerator {
        requested: Mutex<Vec<usize>>,
        extra_on_call: Option<usize>,
        extra_every_call: usize,
        fail: bool,
    }

    impl FakeGenerator {
        fn new() -> Self {
            Self {
                requested: Mutex::new(Vec::new()),
                extra_on_call: None,
                extra_every_call: 0,
                fail: false,
            }
        }

        fn calls(&self) -> Vec<usize> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl TextGenerator for &FakeGenerator {
        async fn complete(&self, system_prompt: &str, user_prompt: &str) -> TaskOutput<Completion> {
            assert!(system_prompt.contains("\n\n---\n\n"));

            let count: usize = user_prompt
                .split_whitespace()
                .nth(1)
                .and_then(|n| n.parse().ok())
                .unwrap();

            let call_number = {
                let mut requested = self.requested.lock().unwrap();
                requested.push(count);
                requested.len()
            };

            if self.fail {
                return Err(TaskError::Collaborator("upstream unavailable".to_string()));
            }

            let mut produced = count + self.extra_every_call;
            if self.extra_on_call == Some(call_number) {
                produced += 2;
            }

            let mut text: Vec<String> = (0..produced)
                .map(|i| format!("SUBJECTIVE: call {} note {}", call_number, i))
                .collect();
            text.push("   ".to_string());

            Ok(Completion {
                text: text.join(&format!("\n{}\n", DELIMITER)),
                usage: TokenUsage {
                    input_tokens: 1_000,
                    output_tokens: 2_000,
                },
            })
        }
    }

    fn setup_notes_root() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let prompts = temp_dir.path().join("prompts");
        fs::create_dir_all(&prompts).unwrap();
        fs::write(prompts.join("adult_base_system.md"), "Adult base prompt").unwrap();
        fs::write(prompts.join("base_system.md"), "Pediatric base prompt").unwrap();
        fs::write(prompts.join("adult_neck_pain.md"), "Neck pain focus").unwrap();
        fs::write(prompts.join("torticollis.md"), "Torticollis focus").unwrap();
        temp_dir
    }

    fn request(category: &str, total: i64, batch_size: i64) -> NoteRequest {
        NoteRequest {
            category: Some(category.to_string()),
            total: Some(total),
            batch_size: Some(batch_size),
        }
    }

    fn generator<'a>(fake: &'a FakeGenerator, root: &Path) -> NoteGenerator<&'a FakeGenerator> {
        NoteGenerator::new(fake, root, &GeneratorConfig::default())
    }

    #[test]
    fn test_seven_notes_in_batches_of_three() {
        let root = setup_notes_root();
        let fake = FakeGenerator::new();

        let result = tokio_test::block_on(
            generator(&fake, root.path()).execute(&request("adult_neck_pain", 7, 3)),
        );

        let report = result.success().expect("generation succeeds");
        assert_eq!(fake.calls(), vec![3, 3, 1]);
        assert_eq!(report.notes_generated, 7);
        assert_eq!(report.files_created.len(), 7);
        assert_eq!(report.batch_folder, "batch_001");
        assert_eq!(report.usage.api_calls, 3);
        assert_eq!(report.usage.input_tokens, 3_000);
        assert_eq!(report.usage.output_tokens, 6_000);
        assert_eq!(report.usage.total_cost, 0.495);

        let written = fs::read_dir(root.path().join("output/batch_001"))
            .unwrap()
            .count();
        assert_eq!(written, 7);
    }

    #[test]
    fn test_extra_fragments_are_capped_at_total() {
        let root = setup_notes_root();
        let fake = FakeGenerator {
            extra_on_call: Some(3),
            ..FakeGenerator::new()
        };

        let result = tokio_test::block_on(
            generator(&fake, root.path()).execute(&request("adult_neck_pain", 7, 3)),
        );

        let report = result.success().unwrap();
        assert_eq!(fake.calls().len(), 3);
        assert_eq!(report.files_created.len(), 7);
    }

    #[test]
    fn test_over_producing_calls_stop_early() {
        let root = setup_notes_root();
        let fake = FakeGenerator {
            extra_every_call: 2,
            ..FakeGenerator::new()
        };

        let result = tokio_test::block_on(
            generator(&fake, root.path()).execute(&request("torticollis", 7, 3)),
        );

        let report = result.success().unwrap();
        assert_eq!(fake.calls(), vec![3, 2]);
        assert_eq!(report.notes_generated, 7);
    }

    #[test]
    fn test_folder_allocation_fills_gaps() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["batch_001", "batch_002", "batch_004"] {
            fs::create_dir_all(temp_dir.path().join(name)).unwrap();
        }

        assert_eq!(next_batch_folder(temp_dir.path()).unwrap(), "batch_003");
    }

    #[test]
    fn test_folder_allocation_creates_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("output");

        assert_eq!(next_batch_folder(&output).unwrap(), "batch_001");
        assert!(output.is_dir());
    }

    #[test]
    fn test_unknown_category_touches_nothing() {
        let root = setup_notes_root();
        let fake = FakeGenerator::new();

        let result = tokio_test::block_on(
            generator(&fake, root.path()).execute(&request("geriatric", 7, 3)),
        );

        assert!(!result.is_success());
        assert!(result.message().unwrap().contains("Invalid category"));
        assert!(fake.calls().is_empty());
        assert!(!root.path().join("output").exists());
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let err = request("feeding", 0, 2).validate().unwrap_err();
        assert!(err.to_string().contains("Invalid total: 0"));

        let err = request("feeding", 4, -1).validate().unwrap_err();
        assert!(err.to_string().contains("Invalid batch_size: -1"));

        let err = NoteRequest::default().validate().unwrap_err();
        assert!(err.to_string().contains("Missing required parameter"));
    }

    #[test]
    fn test_defaults_apply() {
        let validated = NoteRequest {
            category: Some("wellness".to_string()),
            ..NoteRequest::default()
        }
        .validate()
        .unwrap();

        assert_eq!(validated.total, 10);
        assert_eq!(validated.batch_size, 2);
    }

    #[test]
    fn test_json_request_accepts_prompt_type() {
        let parsed: NoteRequest =
            crate::error::parse_request(r#"{"prompt_type": "feeding", "total": 3}"#).unwrap();
        let validated = parsed.validate().unwrap();

        assert_eq!(validated.category, NoteCategory::Feeding);
        assert_eq!(validated.total, 3);
        assert_eq!(validated.batch_size, 2);
    }

    #[test]
    fn test_flags_override_json_request() {
        let from_file = request("feeding", 3, 1);
        let merged = from_file.overridden_by(NoteRequest {
            batch_size: Some(3),
            ..NoteRequest::default()
        });

        assert_eq!(merged.category.as_deref(), Some("feeding"));
        assert_eq!(merged.total, Some(3));
        assert_eq!(merged.batch_size, Some(3));
    }

    #[test]
    fn test_missing_prompt_is_reported() {
        let root = setup_notes_root();
        let fake = FakeGenerator::new();

        let result = tokio_test::block_on(
            generator(&fake, root.path()).execute(&request("feeding", 2, 2)),
        );

        let message = result.message().unwrap();
        assert!(message.starts_with("Execution failed:"));
        assert!(message.contains("Condition prompt not found"));
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn test_failed_call_leaves_batch_folder() {
        let root = setup_notes_root();
        let fake = FakeGenerator {
            fail: true,
            ..FakeGenerator::new()
        };

        let result = tokio_test::block_on(
            generator(&fake, root.path()).execute(&request("adult_neck_pain", 4, 2)),
        );

        assert_eq!(
            result.message(),
            Some("Execution failed: upstream unavailable")
        );
        assert!(root.path().join("output/batch_001").is_dir());
    }

    #[test]
    fn test_note_file_has_metadata_header() {
        let root = setup_notes_root();
        let fake = FakeGenerator::new();

        let result = tokio_test::block_on(
            generator(&fake, root.path()).execute(&request("torticollis", 1, 1)),
        );

        let report = result.success().unwrap();
        let filename = &report.files_created[0];
        assert!(filename.starts_with("torticollis_"));
        assert!(filename.ends_with(".md"));

        let content = fs::read_to_string(report.batch_folder_path.join(filename)).unwrap();
        assert!(content.starts_with("# SOAP Note\n\n**ID:** "));
        assert!(content.contains("**Prompt Type:** torticollis\n"));
        assert!(content.contains("**Batch:** batch_001\n"));
        assert!(content.contains("**Generated:** "));
        assert!(content.contains("SUBJECTIVE: call 1 note 0"));
    }

    #[test]
    fn test_split_notes_discards_empty_fragments() {
        let text = "First note\n---NEXT NOTE---\n\n---NEXT NOTE---\nSecond note\n---NEXT NOTE---";
        let notes = split_notes(text, DELIMITER, NoteCategory::Feeding);

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].content, "First note");
        assert_eq!(notes[1].content, "Second note");
        assert_ne!(notes[0].id, notes[1].id);
        assert_eq!(notes[0].short_id().len(), 8);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::LoadingPrompt.to_string(), "loading-prompt");
        assert_eq!(Phase::AllocatingFolder.to_string(), "allocating-folder");
        assert_eq!(Phase::Error.to_string(), "error");
    }
}
