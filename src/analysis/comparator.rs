//! Snapshot comparison.
//!
//! Diffs a baseline snapshot against a current one: which issues appeared
//! or disappeared, which changed state or board column, how each repository
//! moved, and a short list of insights derived from those numbers.

use crate::analysis::aggregator::board_status_counts;
use crate::config::InsightThresholds;
use crate::models::{IssueEntry, IssueKey, IssueState, Snapshot};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Board column watched by the blocked-growth insight.
const BLOCKED_STATUS: &str = "Blocked";

/// What changed on a common issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    State,
    BoardStatus,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionKind::State => write!(f, "state"),
            TransitionKind::BoardStatus => write!(f, "board status"),
        }
    }
}

/// Number of common issues that moved from one label to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub kind: TransitionKind,
    pub from: String,
    pub to: String,
    pub count: usize,
}

/// Totals across the whole snapshot pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverallChanges {
    pub baseline_total: usize,
    pub current_total: usize,
    pub added: usize,
    pub removed: usize,
    pub common: usize,
    pub baseline_open: usize,
    pub current_open: usize,
    pub baseline_closed: usize,
    pub current_closed: usize,
    /// `added - removed`.
    pub net_change: i64,
}

/// Before/after count for one board status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountDelta {
    pub baseline: usize,
    pub current: usize,
    pub delta: i64,
}

/// Transitions between labels on issues present in both snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateChanges {
    /// Sum of all transition counts.
    pub total: usize,
    pub transitions: Vec<Transition>,
    /// Board status distribution before and after.
    pub board_status: BTreeMap<String, CountDelta>,
}

impl StateChanges {
    /// Count for a specific transition pair (zero if absent).
    pub fn count(&self, kind: TransitionKind, from: &str, to: &str) -> usize {
        self.transitions
            .iter()
            .find(|t| t.kind == kind && t.from == from && t.to == to)
            .map(|t| t.count)
            .unwrap_or(0)
    }
}

/// Per-repository breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryChange {
    pub baseline_total: usize,
    pub current_total: usize,
    pub added: usize,
    pub removed: usize,
    pub newly_closed: usize,
    pub reopened: usize,
    pub baseline_closed: usize,
    pub current_closed: usize,
    /// `current_closed - baseline_closed`.
    pub closed_delta: i64,
}

/// Diff summary between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    pub overall_changes: OverallChanges,
    pub state_changes: StateChanges,
    pub repository_changes: BTreeMap<String, RepositoryChange>,
    pub insights: Vec<String>,
}

type TransitionKey = (TransitionKind, String, String);

/// Compare two snapshots.
pub fn compare(
    baseline: &Snapshot,
    current: &Snapshot,
    thresholds: &InsightThresholds,
) -> ComparisonResult {
    let before = index(&baseline.issues);
    let after = index(&current.issues);

    let baseline_keys: BTreeSet<&IssueKey> = before.keys().collect();
    let current_keys: BTreeSet<&IssueKey> = after.keys().collect();

    let added: Vec<&IssueKey> = current_keys.difference(&baseline_keys).copied().collect();
    let removed: Vec<&IssueKey> = baseline_keys.difference(&current_keys).copied().collect();
    let common: Vec<&IssueKey> = baseline_keys.intersection(&current_keys).copied().collect();

    debug!(
        "Comparing {} -> {}: {} added, {} removed, {} common",
        baseline.label,
        current.label,
        added.len(),
        removed.len(),
        common.len()
    );

    let mut transitions: BTreeMap<TransitionKey, usize> = BTreeMap::new();
    let mut repositories: BTreeMap<String, RepositoryChange> = BTreeMap::new();

    for entry in before.values() {
        if let Some(ref repo) = entry.repository {
            let change = repositories.entry(repo.clone()).or_default();
            change.baseline_total += 1;
            if !entry.is_open() {
                change.baseline_closed += 1;
            }
        }
    }

    for entry in after.values() {
        if let Some(ref repo) = entry.repository {
            let change = repositories.entry(repo.clone()).or_default();
            change.current_total += 1;
            if !entry.is_open() {
                change.current_closed += 1;
            }
        }
    }

    for key in &added {
        if let Some(ref repo) = key.0 {
            repositories.entry(repo.clone()).or_default().added += 1;
        }
    }

    for key in &removed {
        if let Some(ref repo) = key.0 {
            repositories.entry(repo.clone()).or_default().removed += 1;
        }
    }

    for key in &common {
        let (old, new) = (before[*key], after[*key]);

        if old.state != new.state {
            *transitions
                .entry((
                    TransitionKind::State,
                    old.state.to_string(),
                    new.state.to_string(),
                ))
                .or_default() += 1;

            if let Some(ref repo) = key.0 {
                let change = repositories.entry(repo.clone()).or_default();
                match new.state {
                    IssueState::Closed => change.newly_closed += 1,
                    IssueState::Open => change.reopened += 1,
                }
            }
        }

        if old.board_status() != new.board_status() {
            *transitions
                .entry((
                    TransitionKind::BoardStatus,
                    old.board_status().to_string(),
                    new.board_status().to_string(),
                ))
                .or_default() += 1;
        }
    }

    for change in repositories.values_mut() {
        change.closed_delta = change.current_closed as i64 - change.baseline_closed as i64;
    }

    let overall_changes = overall(&before, &after, added.len(), removed.len(), common.len());
    let state_changes = StateChanges {
        total: transitions.values().sum(),
        transitions: transitions
            .into_iter()
            .map(|((kind, from, to), count)| Transition {
                kind,
                from,
                to,
                count,
            })
            .collect(),
        board_status: board_status_deltas(&before, &after),
    };

    let mut result = ComparisonResult {
        overall_changes,
        state_changes,
        repository_changes: repositories,
        insights: Vec::new(),
    };
    result.insights = derive_insights(&result, thresholds);
    result
}

fn index(issues: &[IssueEntry]) -> BTreeMap<IssueKey, &IssueEntry> {
    issues.iter().map(|i| (i.key(), i)).collect()
}

fn overall(
    before: &BTreeMap<IssueKey, &IssueEntry>,
    after: &BTreeMap<IssueKey, &IssueEntry>,
    added: usize,
    removed: usize,
    common: usize,
) -> OverallChanges {
    let baseline_open = before.values().filter(|i| i.is_open()).count();
    let current_open = after.values().filter(|i| i.is_open()).count();

    OverallChanges {
        baseline_total: before.len(),
        current_total: after.len(),
        added,
        removed,
        common,
        baseline_open,
        current_open,
        baseline_closed: before.len() - baseline_open,
        current_closed: after.len() - current_open,
        net_change: added as i64 - removed as i64,
    }
}

fn board_status_deltas(
    baseline: &BTreeMap<IssueKey, &IssueEntry>,
    current: &BTreeMap<IssueKey, &IssueEntry>,
) -> BTreeMap<String, CountDelta> {
    let before = board_status_counts(baseline.values().copied());
    let after = board_status_counts(current.values().copied());

    before
        .keys()
        .chain(after.keys())
        .map(|status| {
            let b = before.get(status).copied().unwrap_or(0);
            let a = after.get(status).copied().unwrap_or(0);
            (
                status.clone(),
                CountDelta {
                    baseline: b,
                    current: a,
                    delta: a as i64 - b as i64,
                },
            )
        })
        .collect()
}

fn reaches(value: usize, threshold: usize) -> bool {
    value > 0 && value >= threshold
}

/// Apply the insight rules in their fixed order.
fn derive_insights(result: &ComparisonResult, thresholds: &InsightThresholds) -> Vec<String> {
    let mut insights = Vec::new();
    let overall = &result.overall_changes;
    let net = overall.net_change;

    if net > 0 && reaches(net as usize, thresholds.net_change_threshold) {
        insights.push(format!(
            "Backlog grew by {} issues ({} added, {} removed)",
            net, overall.added, overall.removed
        ));
    }

    if net < 0 && reaches(net.unsigned_abs() as usize, thresholds.net_change_threshold) {
        insights.push(format!(
            "Backlog shrank by {} issues ({} added, {} removed)",
            net.unsigned_abs(),
            overall.added,
            overall.removed
        ));
    }

    for t in &result.state_changes.transitions {
        if reaches(t.count, thresholds.transition_threshold) {
            insights.push(format!(
                "{} issues changed {} from {} to {}",
                t.count, t.kind, t.from, t.to
            ));
        }
    }

    let reopened = result.state_changes.count(
        TransitionKind::State,
        &IssueState::Closed.to_string(),
        &IssueState::Open.to_string(),
    );
    if reaches(reopened, thresholds.reopened_threshold) {
        insights.push(format!(
            "{} previously closed issues were reopened",
            reopened
        ));
    }

    if let Some(blocked) = result.state_changes.board_status.get(BLOCKED_STATUS) {
        if blocked.delta > 0
            && reaches(blocked.delta as usize, thresholds.blocked_increase_threshold)
        {
            insights.push(format!(
                "Blocked issues increased from {} to {}",
                blocked.baseline, blocked.current
            ));
        }
    }

    for (repo, change) in &result.repository_changes {
        if change.closed_delta > 0
            && reaches(change.closed_delta as usize, thresholds.closed_spike_threshold)
        {
            insights.push(format!(
                "{} closed {} more issues than at baseline ({} -> {})",
                repo, change.closed_delta, change.baseline_closed, change.current_closed
            ));
        }
    }

    insights
}
