//! Walking an issue's typed link graph.
//!
//! Most SMS relationships are one-to-one by convention (a Measurement has
//! exactly one KPI, a Review has exactly one subject) but Jira's schema does
//! not enforce that. The walker returns the first match and logs a warning
//! when the soft invariant is violated.
//!
//! Callers that know what issue type must sit on the far side pass
//! `expected_type`; mismatched targets are skipped with a warning. This is
//! the single place where link targets are type-checked.

use crate::jira::models::{IssueLink, LinkedIssue};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    Inward,
    Outward,
}

fn side<'a>(link: &'a IssueLink, direction: LinkDirection) -> Option<&'a LinkedIssue> {
    match direction {
        LinkDirection::Inward => link.inward_issue.as_ref(),
        LinkDirection::Outward => link.outward_issue.as_ref(),
    }
}

/// All linked issues reachable over links named `link_type` in `direction`.
/// Link-type matching is case-insensitive. When `expected_type` is given,
/// targets of a different issue type are skipped (with a warning — link-type
/// name alone is normally a sufficient invariant, so a mismatch means the
/// link graph was edited by hand).
pub fn find_all_linked<'a>(
    issue_key: &str,
    links: &'a [IssueLink],
    link_type: &str,
    direction: LinkDirection,
    expected_type: Option<&str>,
) -> Vec<&'a LinkedIssue> {
    links
        .iter()
        .filter(|link| link.link_type.name.eq_ignore_ascii_case(link_type))
        .filter_map(|link| side(link, direction))
        .filter(|target| match (expected_type, target.issue_type()) {
            (Some(expected), Some(actual)) if !actual.eq_ignore_ascii_case(expected) => {
                warn!(
                    issue = issue_key,
                    link_type,
                    target = target.key,
                    expected,
                    actual,
                    "linked issue has unexpected type, skipping"
                );
                false
            }
            _ => true,
        })
        .collect()
}

/// First linked issue over `link_type`, or `None`. Logs a warning when the
/// relationship that should be one-to-one has several candidates.
pub fn find_linked<'a>(
    issue_key: &str,
    links: &'a [IssueLink],
    link_type: &str,
    direction: LinkDirection,
    expected_type: Option<&str>,
) -> Option<&'a LinkedIssue> {
    let matches = find_all_linked(issue_key, links, link_type, direction, expected_type);
    if matches.len() > 1 {
        warn!(
            issue = issue_key,
            link_type,
            count = matches.len(),
            "multiple linked issues where one was expected, using the first"
        );
    }
    matches.into_iter().next()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
