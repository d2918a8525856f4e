//! Issue aggregation and statistics.
//!
//! Grouping and counting helpers over issue entries, used by the static
//! issue report and by the snapshot comparator.

use crate::models::IssueEntry;
use serde::Serialize;
use std::collections::BTreeMap;

/// Open/closed counts for one milestone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MilestoneCounts {
    pub open: usize,
    pub closed: usize,
}

impl MilestoneCounts {
    pub fn total(&self) -> usize {
        self.open + self.closed
    }

    /// Percentage of closed issues; zero for an empty milestone.
    pub fn completion_pct(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.closed as f64 / total as f64 * 100.0,
        }
    }
}

/// Open/closed counts per milestone, keyed by milestone label.
pub fn milestone_progress(issues: &[IssueEntry]) -> BTreeMap<String, MilestoneCounts> {
    let mut milestones: BTreeMap<String, MilestoneCounts> = BTreeMap::new();

    for issue in issues {
        let counts = milestones
            .entry(issue.milestone_label().to_string())
            .or_default();
        if issue.is_open() {
            counts.open += 1;
        } else {
            counts.closed += 1;
        }
    }

    milestones
}

/// Issue count per board status, keyed by status label.
pub fn board_status_counts<'a>(
    issues: impl IntoIterator<Item = &'a IssueEntry>,
) -> BTreeMap<String, usize> {
    let mut statuses: BTreeMap<String, usize> = BTreeMap::new();

    for issue in issues {
        *statuses.entry(issue.board_status().to_string()).or_default() += 1;
    }

    statuses
}

/// Board statuses sorted by count (highest first), ties by name.
pub fn board_status(issues: &[IssueEntry]) -> Vec<(String, usize)> {
    let mut statuses: Vec<_> = board_status_counts(issues).into_iter().collect();
    statuses.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    statuses
}

/// Issues whose board status is exactly `status`.
pub fn issues_with_status<'a>(issues: &'a [IssueEntry], status: &str) -> Vec<&'a IssueEntry> {
    issues
        .iter()
        .filter(|i| i.project_status.as_deref() == Some(status))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IssueState, NOT_ON_BOARD, NO_MILESTONE};

    fn create_test_issue(
        number: u64,
        state: IssueState,
        milestone: Option<&str>,
        status: Option<&str>,
    ) -> IssueEntry {
        IssueEntry {
            number,
            title: format!("Issue {}", number),
            state,
            milestone: milestone.map(String::from),
            project_status: status.map(String::from),
            repository: None,
        }
    }

    #[test]
    fn test_milestone_progress() {
        let issues = vec![
            create_test_issue(1, IssueState::Open, Some("M1"), None),
            create_test_issue(2, IssueState::Closed, Some("M1"), None),
            create_test_issue(3, IssueState::Open, None, None),
        ];

        let progress = milestone_progress(&issues);

        assert_eq!(progress.len(), 2);
        assert_eq!(progress["M1"], MilestoneCounts { open: 1, closed: 1 });
        assert_eq!(
            progress[NO_MILESTONE],
            MilestoneCounts { open: 1, closed: 0 }
        );
        assert_eq!(progress["M1"].completion_pct(), 50.0);
    }

    #[test]
    fn test_board_status_sorted_by_count() {
        let issues = vec![
            create_test_issue(1, IssueState::Open, None, Some("Ready")),
            create_test_issue(2, IssueState::Open, None, Some("In Progress")),
            create_test_issue(3, IssueState::Open, None, Some("In Progress")),
            create_test_issue(4, IssueState::Open, None, None),
            create_test_issue(5, IssueState::Closed, None, Some("Done")),
        ];

        let statuses = board_status(&issues);

        assert_eq!(statuses[0], ("In Progress".to_string(), 2));
        let names: Vec<_> = statuses[1..].iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(names, vec!["Done", NOT_ON_BOARD, "Ready"]);
    }

    #[test]
    fn test_issues_with_status() {
        let issues = vec![
            create_test_issue(1, IssueState::Open, None, Some("Blocked")),
            create_test_issue(2, IssueState::Open, None, Some("Ready")),
            create_test_issue(3, IssueState::Open, None, Some("Blocked")),
        ];

        let blocked = issues_with_status(&issues, "Blocked");
        let numbers: Vec<_> = blocked.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert!(issues_with_status(&issues, "In Progress").is_empty());
    }
}
