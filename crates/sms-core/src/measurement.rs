//! KPI measurement gathering.
//!
//! A KPI ticket carries its measurement configuration in custom fields:
//! "Measurement type" selects the strategy, and depending on the type the
//! query ("Measurement query"), summation field ("Measurement summation
//! field") or web request ("Measurement web request" plus either
//! "Measurement JSON field" or "Measurement regular expression") supply the
//! details. Unknown or missing type means the value is entered by hand.
//!
//! Gathering never returns an error: any failure along the way (bad query,
//! non-2xx response, malformed regex, missing JSON path) is logged and
//! reported as `Failed`, which the caller turns into a manual-measurement
//! assignment and a "Measurement failure" transition.

use crate::jira::client::{JiraClient, JIRA_DATETIME_FORMAT};
use crate::jira::fields::FieldResolver;
use crate::jira::models::Issue;
use crate::jsonpath;
use chrono::DateTime;
use regex::Regex;
use tracing::{info, warn};

pub const FIELD_MEASUREMENT_TYPE: &str = "Measurement type";
pub const FIELD_MEASUREMENT_QUERY: &str = "Measurement query";
pub const FIELD_MEASUREMENT_SUM_FIELD: &str = "Measurement summation field";
pub const FIELD_MEASUREMENT_WEB_REQUEST: &str = "Measurement web request";
pub const FIELD_MEASUREMENT_JSON_FIELD: &str = "Measurement JSON field";
pub const FIELD_MEASUREMENT_REGEX: &str = "Measurement regular expression";
pub const FIELD_LAST_MEASURED_ON: &str = "Last measured on";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementType {
    WorkItemCount,
    WorkItemSummation,
    WebRequestJson,
    WebRequestRegex,
    Manual,
}

impl MeasurementType {
    /// Unknown or missing type means the measurement is taken by hand.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("work item count") => Self::WorkItemCount,
            Some("work item summation") => Self::WorkItemSummation,
            Some("web request returning json") => Self::WebRequestJson,
            Some("web request with regular expression") => Self::WebRequestRegex,
            _ => Self::Manual,
        }
    }

    pub fn is_auto(&self) -> bool {
        !matches!(self, Self::Manual)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasurementOutcome {
    /// No automatic strategy configured, a person records the value.
    Manual,
    /// Automatic gathering succeeded.
    Measured(String),
    /// Automatic gathering was configured but did not produce a value.
    Failed,
}

/// Replace `{lastMeasurementDate}` / `{lastMeasurementDateTime}` placeholders
/// in a JQL query with the KPI's "Last measured on" timestamp. The datetime
/// form is quoted for JQL. Placeholders are left alone when the KPI has never
/// been measured.
pub fn expand_query(query: &str, last_measured_on: Option<&str>) -> String {
    let Some(parsed) = last_measured_on
        .and_then(|text| DateTime::parse_from_str(text, JIRA_DATETIME_FORMAT).ok())
    else {
        return query.to_string();
    };
    query
        .replace("{lastMeasurementDate}", &parsed.format("%Y-%m-%d").to_string())
        .replace(
            "{lastMeasurementDateTime}",
            &format!("'{}'", parsed.format("%Y-%m-%d %H:%M:%S")),
        )
}

/// Render a numeric value the way it is written into text fields: whole
/// numbers without a decimal part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Run the KPI's configured measurement strategy.
pub fn gather(client: &JiraClient, resolver: &FieldResolver, kpi: &Issue) -> MeasurementOutcome {
    let measurement_type =
        MeasurementType::parse(resolver.option_value(kpi, FIELD_MEASUREMENT_TYPE).as_deref());
    let last_measured_on = resolver.string_value(kpi, FIELD_LAST_MEASURED_ON);

    match measurement_type {
        MeasurementType::Manual => MeasurementOutcome::Manual,

        MeasurementType::WorkItemCount => {
            let Some(query) = resolver.string_value(kpi, FIELD_MEASUREMENT_QUERY) else {
                warn!(kpi = kpi.key, "no measurement query configured");
                return MeasurementOutcome::Failed;
            };
            let jql = expand_query(&query, last_measured_on.as_deref());
            match client.approximate_count(&jql) {
                Ok(count) => {
                    info!(kpi = kpi.key, jql, count, "counted work items");
                    MeasurementOutcome::Measured(count.to_string())
                }
                Err(err) => {
                    warn!(kpi = kpi.key, jql, %err, "could not count work items");
                    MeasurementOutcome::Failed
                }
            }
        }

        MeasurementType::WorkItemSummation => {
            let query = resolver.string_value(kpi, FIELD_MEASUREMENT_QUERY);
            let field_name = resolver.string_value(kpi, FIELD_MEASUREMENT_SUM_FIELD);
            let (Some(query), Some(field_name)) = (query, field_name) else {
                warn!(kpi = kpi.key, "summation query or field not configured");
                return MeasurementOutcome::Failed;
            };
            let Some(field_id) = resolver.id_of(field_name.trim()).map(str::to_string) else {
                warn!(kpi = kpi.key, field = field_name, "no such summation field");
                return MeasurementOutcome::Failed;
            };
            let jql = expand_query(&query, last_measured_on.as_deref());
            let issues = match client.search_all(&jql, &["key", &field_id], 100) {
                Ok(issues) => issues,
                Err(err) => {
                    warn!(kpi = kpi.key, jql, %err, "could not search work items");
                    return MeasurementOutcome::Failed;
                }
            };
            // Null and non-numeric values do not contribute.
            let sum: f64 = issues
                .iter()
                .filter_map(|issue| issue.fields.custom.get(&field_id))
                .filter_map(|value| match value {
                    serde_json::Value::Number(n) => n.as_f64(),
                    serde_json::Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                })
                .sum();
            info!(kpi = kpi.key, jql, sum, "summed work items");
            MeasurementOutcome::Measured(format_number(sum))
        }

        MeasurementType::WebRequestJson => {
            let url = resolver.string_value(kpi, FIELD_MEASUREMENT_WEB_REQUEST);
            let path = resolver.string_value(kpi, FIELD_MEASUREMENT_JSON_FIELD);
            let (Some(url), Some(path)) = (url, path) else {
                warn!(kpi = kpi.key, "web request or JSON field not configured");
                return MeasurementOutcome::Failed;
            };
            let body = match client.fetch_json(&url) {
                Ok(body) => body,
                Err(err) => {
                    warn!(kpi = kpi.key, url, %err, "measurement web request failed");
                    return MeasurementOutcome::Failed;
                }
            };
            match jsonpath::resolve_path(&body, &path).and_then(jsonpath::value_to_string) {
                Some(value) => MeasurementOutcome::Measured(value),
                None => {
                    warn!(kpi = kpi.key, path, "JSON path did not resolve to a value");
                    MeasurementOutcome::Failed
                }
            }
        }

        MeasurementType::WebRequestRegex => {
            let url = resolver.string_value(kpi, FIELD_MEASUREMENT_WEB_REQUEST);
            let pattern = resolver.string_value(kpi, FIELD_MEASUREMENT_REGEX);
            let (Some(url), Some(pattern)) = (url, pattern) else {
                warn!(kpi = kpi.key, "web request or regular expression not configured");
                return MeasurementOutcome::Failed;
            };
            let regex = match Regex::new(&pattern) {
                Ok(regex) => regex,
                Err(err) => {
                    warn!(kpi = kpi.key, pattern, %err, "invalid regular expression");
                    return MeasurementOutcome::Failed;
                }
            };
            let text = match client.fetch_text(&url) {
                Ok(text) => text,
                Err(err) => {
                    warn!(kpi = kpi.key, url, %err, "measurement web request failed");
                    return MeasurementOutcome::Failed;
                }
            };
            // First capture group when the pattern has one, else the whole
            // matched substring.
            match regex.captures(&text) {
                Some(captures) => {
                    let value = captures
                        .get(1)
                        .or_else(|| captures.get(0))
                        .map(|m| m.as_str().to_string());
                    match value {
                        Some(value) => MeasurementOutcome::Measured(value),
                        None => MeasurementOutcome::Failed,
                    }
                }
                None => {
                    warn!(kpi = kpi.key, pattern, "regular expression did not match");
                    MeasurementOutcome::Failed
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jira::models::FieldMeta;

    fn resolver() -> FieldResolver {
        let names = [
            ("customfield_201", FIELD_MEASUREMENT_TYPE),
            ("customfield_202", FIELD_MEASUREMENT_QUERY),
            ("customfield_203", FIELD_MEASUREMENT_SUM_FIELD),
            ("customfield_204", FIELD_MEASUREMENT_WEB_REQUEST),
            ("customfield_205", FIELD_MEASUREMENT_JSON_FIELD),
            ("customfield_206", FIELD_MEASUREMENT_REGEX),
            ("customfield_207", FIELD_LAST_MEASURED_ON),
            ("customfield_208", "Story points"),
        ];
        FieldResolver::new(
            names
                .iter()
                .map(|(id, name)| FieldMeta {
                    id: id.to_string(),
                    name: name.to_string(),
                    custom: true,
                })
                .collect(),
        )
    }

    fn kpi(fields: serde_json::Value) -> Issue {
        serde_json::from_value(serde_json::json!({ "key": "SMS-7", "fields": fields })).unwrap()
    }

    #[test]
    fn type_parse_is_case_insensitive_and_defaults_to_manual() {
        assert_eq!(
            MeasurementType::parse(Some("Work item count")),
            MeasurementType::WorkItemCount
        );
        assert_eq!(
            MeasurementType::parse(Some("WEB REQUEST RETURNING JSON")),
            MeasurementType::WebRequestJson
        );
        assert_eq!(MeasurementType::parse(Some("telepathy")), MeasurementType::Manual);
        assert_eq!(MeasurementType::parse(None), MeasurementType::Manual);
        assert!(!MeasurementType::Manual.is_auto());
        assert!(MeasurementType::WebRequestRegex.is_auto());
    }

    #[test]
    fn expand_query_replaces_both_placeholders() {
        let expanded = expand_query(
            "created >= {lastMeasurementDate} AND updated >= {lastMeasurementDateTime}",
            Some("2024-05-01T12:30:00.000+0000"),
        );
        assert_eq!(
            expanded,
            "created >= 2024-05-01 AND updated >= '2024-05-01 12:30:00'"
        );
    }

    #[test]
    fn expand_query_without_last_measurement_keeps_placeholders() {
        let query = "created >= {lastMeasurementDate}";
        assert_eq!(expand_query(query, None), query);
        assert_eq!(expand_query(query, Some("not a date")), query);
    }

    #[test]
    fn whole_numbers_render_without_decimals() {
        assert_eq!(format_number(7.0), "7");
        assert_eq!(format_number(7.5), "7.5");
        assert_eq!(format_number(0.0), "0");
    }

    #[test]
    fn count_measurement_uses_approximate_count() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/rest/api/3/search/approximate-count")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "jql": "project = CRM AND created >= 2024-05-01"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "count": 17 }"#)
            .create();

        let client = JiraClient::new(server.url(), "sms@example.org", "token");
        let kpi = kpi(serde_json::json!({
            "customfield_201": { "value": "Work item count" },
            "customfield_202": "project = CRM AND created >= {lastMeasurementDate}",
            "customfield_207": "2024-05-01T00:00:00.000+0000",
        }));
        assert_eq!(
            gather(&client, &resolver(), &kpi),
            MeasurementOutcome::Measured("17".into())
        );
    }

    #[test]
    fn summation_skips_non_numeric_values() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/rest/api/3/search/jql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{ "issues": [
                    { "key": "A-1", "fields": { "customfield_208": 3 } },
                    { "key": "A-2", "fields": { "customfield_208": "4.5" } },
                    { "key": "A-3", "fields": { "customfield_208": null } },
                    { "key": "A-4", "fields": { "customfield_208": "n/a" } }
                ], "isLast": true }"#,
            )
            .create();

        let client = JiraClient::new(server.url(), "sms@example.org", "token");
        let kpi = kpi(serde_json::json!({
            "customfield_201": { "value": "Work item summation" },
            "customfield_202": "project = CRM",
            "customfield_203": "Story points",
        }));
        assert_eq!(
            gather(&client, &resolver(), &kpi),
            MeasurementOutcome::Measured("7.5".into())
        );
    }

    #[test]
    fn json_measurement_follows_path() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/metrics")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "stats": { "series": [ { "total": 42 } ] } }"#)
            .create();

        let client = JiraClient::new("https://jira.invalid", "sms@example.org", "token");
        let kpi = kpi(serde_json::json!({
            "customfield_201": { "value": "Web request returning JSON" },
            "customfield_204": format!("{}/metrics", server.url()),
            "customfield_205": "stats.series[0].total",
        }));
        assert_eq!(
            gather(&client, &resolver(), &kpi),
            MeasurementOutcome::Measured("42".into())
        );
    }

    #[test]
    fn regex_measurement_prefers_first_capture_group() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/status")
            .with_status(200)
            .with_body("uptime: 99.95 percent")
            .create();

        let client = JiraClient::new("https://jira.invalid", "sms@example.org", "token");
        let kpi = kpi(serde_json::json!({
            "customfield_201": { "value": "Web request with regular expression" },
            "customfield_204": format!("{}/status", server.url()),
            "customfield_206": r"uptime: ([0-9.]+)",
        }));
        assert_eq!(
            gather(&client, &resolver(), &kpi),
            MeasurementOutcome::Measured("99.95".into())
        );
    }

    #[test]
    fn malformed_regex_fails_without_fetching() {
        let client = JiraClient::new("https://jira.invalid", "sms@example.org", "token");
        let kpi = kpi(serde_json::json!({
            "customfield_201": { "value": "Web request with regular expression" },
            "customfield_204": "https://metrics.invalid/status",
            "customfield_206": "([unclosed",
        }));
        assert_eq!(gather(&client, &resolver(), &kpi), MeasurementOutcome::Failed);
    }

    #[test]
    fn missing_configuration_is_a_failure_and_no_type_is_manual() {
        let client = JiraClient::new("https://jira.invalid", "sms@example.org", "token");
        let auto = kpi(serde_json::json!({
            "customfield_201": { "value": "Work item count" }
        }));
        assert_eq!(gather(&client, &resolver(), &auto), MeasurementOutcome::Failed);

        let manual = kpi(serde_json::json!({}));
        assert_eq!(gather(&client, &resolver(), &manual), MeasurementOutcome::Manual);
    }
}
