//! Display-name resolution and typed extraction for Jira custom fields.
//!
//! The REST API only speaks opaque `customfield_*` ids, while everything in
//! the domain (and the config) uses display names like "Review frequency".
//! A `FieldResolver` is built once per handler invocation from the full
//! field list and shared by every handler that runs for that event.
//!
//! The corpus also maintains a "previous state" convention: for a field `X`
//! there may be a companion text field `X old` holding the last value a
//! listener saw, used to detect deltas between issue-updated events.

use crate::error::{Result, SmsError};
use crate::jira::client::{JiraClient, JIRA_DATETIME_FORMAT};
use crate::jira::models::{FieldMeta, Issue, User};
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone)]
pub struct FieldResolver {
    fields: Vec<FieldMeta>,
}

impl FieldResolver {
    pub fn new(fields: Vec<FieldMeta>) -> Self {
        Self {
            fields: fields.into_iter().filter(|f| f.custom).collect(),
        }
    }

    pub fn fetch(client: &JiraClient) -> Result<Self> {
        Ok(Self::new(client.get_fields()?))
    }

    /// Field id for a display name; linear scan, exact match.
    pub fn id_of(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.id.as_str())
    }

    pub fn require(&self, name: &str) -> Result<&str> {
        self.id_of(name)
            .ok_or_else(|| SmsError::FieldNotFound(name.to_string()))
    }

    // -----------------------------------------------------------------------
    // Typed value extraction
    // -----------------------------------------------------------------------

    fn raw<'a>(&self, issue: &'a Issue, name: &str) -> Option<&'a serde_json::Value> {
        let id = self.id_of(name)?;
        issue.fields.custom.get(id).filter(|v| !v.is_null())
    }

    /// Plain text or number field rendered as a string.
    pub fn string_value(&self, issue: &Issue, name: &str) -> Option<String> {
        match self.raw(issue, name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Single-select dropdown: `{"value": "Quarterly"}`.
    pub fn option_value(&self, issue: &Issue, name: &str) -> Option<String> {
        self.raw(issue, name)?
            .get("value")?
            .as_str()
            .map(str::to_string)
    }

    /// Multi-select dropdown: `[{"value": …}, …]`.
    pub fn option_values(&self, issue: &Issue, name: &str) -> Vec<String> {
        self.raw(issue, name)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.get("value").and_then(|v| v.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn number_value(&self, issue: &Issue, name: &str) -> Option<f64> {
        match self.raw(issue, name)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Single-user picker field.
    pub fn user_value(&self, issue: &Issue, name: &str) -> Option<User> {
        serde_json::from_value(self.raw(issue, name)?.clone()).ok()
    }

    /// Multi-user picker field.
    pub fn users_value(&self, issue: &Issue, name: &str) -> Vec<User> {
        self.raw(issue, name)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Timestamp field in Jira's `2024-05-01T12:00:00.000+0000` format.
    pub fn datetime_value(&self, issue: &Issue, name: &str) -> Option<DateTime<Utc>> {
        let text = self.string_value(issue, name)?;
        DateTime::parse_from_str(&text, JIRA_DATETIME_FORMAT)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Date field (`2024-05-01`).
    pub fn date_value(&self, issue: &Issue, name: &str) -> Option<NaiveDate> {
        let text = self.string_value(issue, name)?;
        NaiveDate::parse_from_str(&text, "%Y-%m-%d").ok()
    }
}

/// Null-aware delta check between a field's current value and its `… old`
/// companion: changed when exactly one side is missing, or both are present
/// and differ.
pub fn changed(current: Option<&str>, old: Option<&str>) -> bool {
    match (current, old) {
        (None, None) => false,
        (Some(a), Some(b)) => a != b,
        _ => true,
    }
}

/// Conventional name of the companion field backing up `name`.
pub fn old_companion(name: &str) -> String {
    format!("{name} old")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> FieldResolver {
        FieldResolver::new(vec![
            FieldMeta {
                id: "summary".into(),
                name: "Summary".into(),
                custom: false,
            },
            FieldMeta {
                id: "customfield_10100".into(),
                name: "Review frequency".into(),
                custom: true,
            },
            FieldMeta {
                id: "customfield_10101".into(),
                name: "Next review".into(),
                custom: true,
            },
            FieldMeta {
                id: "customfield_10102".into(),
                name: "Process owner".into(),
                custom: true,
            },
            FieldMeta {
                id: "customfield_10103".into(),
                name: "Target".into(),
                custom: true,
            },
        ])
    }

    fn issue() -> Issue {
        serde_json::from_str(
            r#"{
                "key": "SMS-1",
                "fields": {
                    "summary": "CRM",
                    "customfield_10100": { "value": "Quarterly" },
                    "customfield_10101": "2024-07-01",
                    "customfield_10102": { "accountId": "abc123", "displayName": "Ada" },
                    "customfield_10103": 42.5
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn non_custom_fields_are_excluded() {
        assert_eq!(resolver().id_of("Summary"), None);
        assert_eq!(resolver().id_of("Review frequency"), Some("customfield_10100"));
    }

    #[test]
    fn require_unknown_field_errors() {
        let err = resolver().require("No such field").unwrap_err();
        assert!(matches!(err, SmsError::FieldNotFound(_)));
    }

    #[test]
    fn typed_extraction() {
        let r = resolver();
        let i = issue();
        assert_eq!(r.option_value(&i, "Review frequency").as_deref(), Some("Quarterly"));
        assert_eq!(
            r.date_value(&i, "Next review"),
            NaiveDate::from_ymd_opt(2024, 7, 1)
        );
        assert_eq!(
            r.user_value(&i, "Process owner").and_then(|u| u.account_id),
            Some("abc123".to_string())
        );
        assert_eq!(r.number_value(&i, "Target"), Some(42.5));
        assert_eq!(r.string_value(&i, "Next review").as_deref(), Some("2024-07-01"));
    }

    #[test]
    fn datetime_parses_jira_offset_format() {
        let r = FieldResolver::new(vec![FieldMeta {
            id: "customfield_1".into(),
            name: "Escalated on".into(),
            custom: true,
        }]);
        let i: Issue = serde_json::from_str(
            r#"{ "key": "SMS-1", "fields": { "customfield_1": "2024-05-01T12:00:00.000+0000" } }"#,
        )
        .unwrap();
        let dt = r.datetime_value(&i, "Escalated on").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn changed_is_null_aware() {
        assert!(!changed(None, None));
        assert!(!changed(Some("CRM"), Some("CRM")));
        assert!(changed(Some("CRM"), Some("HR")));
        assert!(changed(Some("CRM"), None));
        assert!(changed(None, Some("CRM")));
    }

    #[test]
    fn old_companion_naming() {
        assert_eq!(old_companion("Measured value"), "Measured value old");
    }
}
