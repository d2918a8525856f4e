//! Markdown trend report.

use crate::analysis::comparator::{OverallChanges, StateChanges};
use crate::pm::TrendPayload;

/// Render a trend comparison as Markdown.
pub fn render_trend_report(trend: &TrendPayload) -> String {
    let mut output = String::new();

    output.push_str("# Trend Analysis\n\n");
    output.push_str(&format!(
        "Comparing **{}** (baseline) with **{}** (current).\n\n",
        trend.baseline_snapshot, trend.current_snapshot
    ));

    output.push_str(&generate_insights_section(&trend.insights));
    output.push_str(&generate_overall_section(&trend.overall_changes));
    output.push_str(&generate_transitions_section(&trend.state_changes));
    output.push_str(&generate_board_section(&trend.state_changes));
    output.push_str(&generate_repository_section(trend));

    output
}

fn generate_insights_section(insights: &[String]) -> String {
    let mut section = String::new();

    section.push_str("## Insights\n\n");
    if insights.is_empty() {
        section.push_str("No notable changes.\n");
    } else {
        for insight in insights {
            section.push_str(&format!("- {}\n", insight));
        }
    }
    section.push('\n');

    section
}

fn generate_overall_section(overall: &OverallChanges) -> String {
    let mut section = String::new();

    section.push_str("## Overall Changes\n\n");
    section.push_str("| Metric | Baseline | Current |\n");
    section.push_str("|--------|----------|---------|\n");
    section.push_str(&format!(
        "| Total | {} | {} |\n",
        overall.baseline_total, overall.current_total
    ));
    section.push_str(&format!(
        "| Open | {} | {} |\n",
        overall.baseline_open, overall.current_open
    ));
    section.push_str(&format!(
        "| Closed | {} | {} |\n",
        overall.baseline_closed, overall.current_closed
    ));
    section.push('\n');
    section.push_str(&format!(
        "- **Added:** {}\n- **Removed:** {}\n- **Net change:** {:+}\n\n",
        overall.added, overall.removed, overall.net_change
    ));

    section
}

fn generate_transitions_section(changes: &StateChanges) -> String {
    if changes.transitions.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Transitions\n\n");
    section.push_str("| Kind | From | To | Count |\n");
    section.push_str("|------|------|----|-------|\n");
    for t in &changes.transitions {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            t.kind, t.from, t.to, t.count
        ));
    }
    section.push('\n');

    section
}

fn generate_board_section(changes: &StateChanges) -> String {
    if changes.board_status.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Board Status\n\n");
    section.push_str("| Status | Baseline | Current | Delta |\n");
    section.push_str("|--------|----------|---------|-------|\n");
    for (status, delta) in &changes.board_status {
        section.push_str(&format!(
            "| {} | {} | {} | {:+} |\n",
            status, delta.baseline, delta.current, delta.delta
        ));
    }
    section.push('\n');

    section
}

fn generate_repository_section(trend: &TrendPayload) -> String {
    if trend.repository_changes.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Repositories\n\n");
    section.push_str("| Repository | Baseline | Current | Added | Removed | Newly Closed | Reopened |\n");
    section.push_str("|------------|----------|---------|-------|---------|--------------|----------|\n");
    for (repo, change) in &trend.repository_changes {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            repo,
            change.baseline_total,
            change.current_total,
            change.added,
            change.removed,
            change.newly_closed,
            change.reopened
        ));
    }
    section.push('\n');

    section
}
