//! Serde types for the subset of the Jira Cloud REST v3 wire format the
//! handlers touch. Custom fields arrive under opaque `customfield_*` keys and
//! are kept in a flattened JSON map; `jira::fields` resolves display names to
//! those keys and extracts typed values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub key: String,
    #[serde(default)]
    pub fields: IssueFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuetype: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<User>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issuelinks: Vec<IssueLink>,
    /// Everything else, notably `customfield_*` entries.
    #[serde(flatten)]
    pub custom: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRef {
    pub key: String,
}

/// A `{"name": …}` reference (issue type, status, link type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Issue {
    pub fn summary(&self) -> &str {
        self.fields.summary.as_deref().unwrap_or("")
    }

    /// The corpus-wide convention: tickets whose summary is exactly "test"
    /// (any case, surrounding whitespace ignored) are exercise data and every
    /// handler skips them.
    pub fn is_test(&self) -> bool {
        self.summary().trim().eq_ignore_ascii_case("test")
    }

    pub fn issue_type(&self) -> &str {
        self.fields
            .issuetype
            .as_ref()
            .map(|t| t.name.as_str())
            .unwrap_or("")
    }

    pub fn status_name(&self) -> &str {
        self.fields
            .status
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or("")
    }

    pub fn project_key(&self) -> Option<&str> {
        self.fields.project.as_ref().map(|p| p.key.as_str())
    }
}

// ---------------------------------------------------------------------------
// Issue links
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLink {
    #[serde(rename = "type")]
    pub link_type: NamedRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inward_issue: Option<LinkedIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outward_issue: Option<LinkedIssue>,
}

/// The stub of the issue on the far side of a link. Jira includes a partial
/// `fields` object (issue type and status) but not custom fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedIssue {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<LinkedIssueFields>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkedIssueFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuetype: Option<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NamedRef>,
}

impl LinkedIssue {
    pub fn issue_type(&self) -> Option<&str> {
        self.fields
            .as_ref()
            .and_then(|f| f.issuetype.as_ref())
            .map(|t| t.name.as_str())
    }

    pub fn status_name(&self) -> Option<&str> {
        self.fields
            .as_ref()
            .and_then(|f| f.status.as_ref())
            .map(|s| s.name.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransitionsResponse {
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

// ---------------------------------------------------------------------------
// Field metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub custom: bool,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub is_last: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApproximateCount {
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupsPicker {
    #[serde(default)]
    pub groups: Vec<GroupSuggestion>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSuggestion {
    pub name: String,
    pub group_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupMembersPage {
    #[serde(default)]
    pub values: Vec<User>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_deserializes_with_custom_fields() {
        let json = r#"{
            "id": "10001",
            "key": "SMS-1",
            "fields": {
                "summary": "Customer Relationship Management",
                "issuetype": { "name": "Process" },
                "status": { "name": "Active" },
                "project": { "key": "SMS" },
                "customfield_10100": { "value": "Quarterly" },
                "customfield_10101": "2024-07-01"
            }
        }"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.key, "SMS-1");
        assert_eq!(issue.issue_type(), "Process");
        assert_eq!(issue.status_name(), "Active");
        assert_eq!(issue.project_key(), Some("SMS"));
        assert_eq!(
            issue.fields.custom["customfield_10100"]["value"],
            "Quarterly"
        );
    }

    #[test]
    fn test_summary_guard() {
        let issue: Issue =
            serde_json::from_str(r#"{ "key": "SMS-2", "fields": { "summary": "  Test " } }"#)
                .unwrap();
        assert!(issue.is_test());
    }

    #[test]
    fn link_sides_are_optional() {
        let json = r#"{
            "type": { "name": "KPI-Measurement" },
            "inwardIssue": {
                "key": "SMS-10",
                "fields": {
                    "issuetype": { "name": "Key Performance Indicator" },
                    "status": { "name": "Active" }
                }
            }
        }"#;
        let link: IssueLink = serde_json::from_str(json).unwrap();
        assert!(link.outward_issue.is_none());
        let inward = link.inward_issue.unwrap();
        assert_eq!(inward.issue_type(), Some("Key Performance Indicator"));
        assert_eq!(inward.status_name(), Some("Active"));
    }

    #[test]
    fn search_page_paging_fields() {
        let json = r#"{ "issues": [], "isLast": false, "nextPageToken": "abc" }"#;
        let page: SearchPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.is_last, Some(false));
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
    }
}
