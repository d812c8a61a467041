use serde::Serialize;
use std::collections::BTreeMap;

use crate::jira::IssueLink;

/// Result of evaluating a release gate over a set of linked issues.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    pub issues: BTreeMap<String, IssueLink>,
    /// Per-issue one-line status summaries for the host's status variable.
    pub statuses: BTreeMap<String, String>,
    pub complete: usize,
    pub total: usize,
}

impl GateResult {
    pub fn is_complete(&self) -> bool {
        self.complete == self.total
    }

    pub fn status_line(&self) -> String {
        format!("{} of {} completed", self.complete, self.total)
    }
}

/// Count how many linked issues have reached the target status
/// (case-insensitive) and build the per-issue status summaries.
pub fn evaluate(links: &BTreeMap<String, IssueLink>, wait_for_status: &str) -> GateResult {
    let mut statuses = BTreeMap::new();
    let mut complete = 0;

    for (key, link) in links {
        statuses.insert(key.clone(), format!("{} | {}", link.status, link.summary));
        if link.status.eq_ignore_ascii_case(wait_for_status) {
            complete += 1;
        }
    }

    GateResult {
        issues: links.clone(),
        statuses,
        complete,
        total: links.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links() -> BTreeMap<String, IssueLink> {
        let mut links = BTreeMap::new();
        links.insert(
            "REL-1".to_string(),
            IssueLink {
                status: "Done".to_string(),
                summary: "Login flow".to_string(),
            },
        );
        links.insert(
            "REL-2".to_string(),
            IssueLink {
                status: "In Progress".to_string(),
                summary: "Checkout flow".to_string(),
            },
        );
        links
    }

    #[test]
    fn counts_issues_at_target_status() {
        let result = evaluate(&links(), "done");
        assert_eq!(result.complete, 1);
        assert_eq!(result.total, 2);
        assert!(!result.is_complete());
        assert_eq!(result.status_line(), "1 of 2 completed");
    }

    #[test]
    fn builds_status_summaries() {
        let result = evaluate(&links(), "Done");
        assert_eq!(result.statuses["REL-1"], "Done | Login flow");
        assert_eq!(result.statuses["REL-2"], "In Progress | Checkout flow");
    }

    #[test]
    fn empty_links_are_trivially_complete() {
        let result = evaluate(&BTreeMap::new(), "Done");
        assert_eq!(result.total, 0);
        assert!(result.is_complete());
    }
}
