//! Plain-text issue report.
//!
//! Milestone progress, board distribution, the blocked/in-progress/ready
//! lists and a summary, printed from a single issue export.

use crate::analysis::{board_status, issues_with_status, milestone_progress};
use crate::error::{read_input, TaskOutput};
use crate::models::{IssueEntry, Snapshot};
use std::path::Path;

const RULE_WIDTH: usize = 60;
const BAR_CELLS: usize = 20;
const MAX_BOARD_BAR: usize = 40;

/// Load an issue export (`{ issues: [...], summary: {...} }`).
pub fn load_export(path: &Path) -> TaskOutput<Snapshot> {
    let content = read_input(path, "Issue export")?;
    Snapshot::from_json(&path.display().to_string(), &content)
}

/// Render the full report for an export.
pub fn render_issue_report(export: &Snapshot) -> String {
    let issues = &export.issues;
    let mut output = String::new();

    output.push_str(&header("MILESTONE PROGRESS"));
    for (milestone, counts) in milestone_progress(issues) {
        let pct = counts.completion_pct();
        output.push_str(&format!(
            "{:<40} {:>2}/{:<2} {} {:.0}%\n",
            truncate(&milestone, 40),
            counts.closed,
            counts.total(),
            progress_bar(pct),
            pct
        ));
    }

    output.push('\n');
    output.push_str(&header("BOARD STATUS"));
    for (status, count) in board_status(issues) {
        output.push_str(&format!(
            "{:<15} {:>3} {}\n",
            status,
            count,
            "█".repeat(count.min(MAX_BOARD_BAR))
        ));
    }

    output.push('\n');
    output.push_str(&status_section(issues, "BLOCKED (Need Attention)", "Blocked", true));
    output.push('\n');
    output.push_str(&status_section(issues, "IN PROGRESS (Active Work)", "In Progress", false));
    output.push('\n');
    output.push_str(&status_section(issues, "READY (Next Up)", "Ready", true));

    let summary = export.summary();
    output.push('\n');
    output.push_str(&header("SUMMARY"));
    output.push_str(&format!("Total Issues: {}\n", summary.total));
    output.push_str(&format!(
        "Open: {} | Closed: {}\n",
        summary.open, summary.closed
    ));
    output.push_str(&format!("Completion: {:.0}%\n", summary.completion_pct()));

    output
}

fn header(title: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    format!("{}\n{}\n{}\n", rule, title, rule)
}

/// 20 cells, one per 5% complete.
fn progress_bar(pct: f64) -> String {
    let filled = ((pct / 5.0) as usize).min(BAR_CELLS);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_CELLS - filled))
}

fn status_section(issues: &[IssueEntry], title: &str, status: &str, show_none: bool) -> String {
    let mut section = header(title);
    let matching = issues_with_status(issues, status);

    if matching.is_empty() && show_none {
        section.push_str("  None\n");
    }
    for issue in matching {
        section.push_str(&format!(
            "  #{:<3} {}\n",
            issue.number,
            truncate(&issue.title, 50)
        ));
    }

    section
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
