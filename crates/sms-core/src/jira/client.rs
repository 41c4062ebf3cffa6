//! Blocking Jira Cloud REST v3 client.
//!
//! Handlers run one at a time per triggering event, so the client is
//! deliberately synchronous; the server wraps handler runs in
//! `spawn_blocking`. Any response outside 2xx is an `UnexpectedStatus` error
//! carrying the endpoint context — callers log it and return early, matching
//! the no-retry, no-rollback semantics of the original automation.

use crate::adf::AdfDoc;
use crate::error::{Result, SmsError};
use crate::jira::models::{
    ApproximateCount, CreatedIssue, FieldMeta, GroupMembersPage, GroupsPicker, Issue, SearchPage,
    Transition, TransitionsResponse, User,
};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::{json, Value};

/// Datetime format used by Jira for timestamp custom fields.
pub const JIRA_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";
/// Date format used by Jira for date custom fields.
pub const JIRA_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct JiraClient {
    http: Client,
    base_url: String,
    user: String,
    token: String,
}

impl JiraClient {
    pub fn new(base_url: impl Into<String>, user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.user, Some(&self.token))
    }

    fn check(response: Response, context: &str) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(SmsError::UnexpectedStatus {
                status: response.status().as_u16(),
                context: context.to_string(),
            })
        }
    }

    // -----------------------------------------------------------------------
    // Issues
    // -----------------------------------------------------------------------

    pub fn get_issue(&self, key: &str) -> Result<Issue> {
        let response = self
            .authed(self.http.get(self.url(&format!("/rest/api/3/issue/{key}"))))
            .send()?;
        if response.status().as_u16() == 404 {
            return Err(SmsError::IssueNotFound(key.to_string()));
        }
        let response = Self::check(response, &format!("GET issue {key}"))?;
        Ok(response.json()?)
    }

    pub fn create_issue(&self, body: &Value) -> Result<CreatedIssue> {
        let response = self
            .authed(self.http.post(self.url("/rest/api/3/issue")))
            .json(body)
            .send()?;
        let response = Self::check(response, "POST issue")?;
        Ok(response.json()?)
    }

    /// PUT a partial `fields` object onto an issue.
    pub fn update_issue_fields(&self, key: &str, fields: Value) -> Result<()> {
        self.update_issue_fields_inner(key, fields, false)
    }

    /// Same as `update_issue_fields` but bypassing screen security, needed
    /// when writing companion `… old` fields that are not on any screen.
    pub fn update_issue_fields_unscreened(&self, key: &str, fields: Value) -> Result<()> {
        self.update_issue_fields_inner(key, fields, true)
    }

    fn update_issue_fields_inner(&self, key: &str, fields: Value, unscreened: bool) -> Result<()> {
        let mut request = self
            .authed(self.http.put(self.url(&format!("/rest/api/3/issue/{key}"))))
            .json(&json!({ "fields": fields }));
        if unscreened {
            request = request.query(&[("overrideScreenSecurity", "true")]);
        }
        Self::check(request.send()?, &format!("PUT issue {key}"))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    pub fn search_jql(
        &self,
        jql: &str,
        fields: &[&str],
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<SearchPage> {
        let response = self
            .authed(self.http.post(self.url("/rest/api/3/search/jql")))
            .json(&json!({
                "jql": jql,
                "fields": if fields.is_empty() { vec!["*all"] } else { fields.to_vec() },
                "maxResults": max_results,
                "nextPageToken": page_token,
            }))
            .send()?;
        let response = Self::check(response, "POST search/jql")?;
        Ok(response.json()?)
    }

    /// All matching issues, following `nextPageToken` until the last page.
    pub fn search_all(&self, jql: &str, fields: &[&str], page_size: u32) -> Result<Vec<Issue>> {
        let mut issues = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.search_jql(jql, fields, page_size, token.as_deref())?;
            issues.extend(page.issues);
            match (page.is_last, page.next_page_token) {
                (Some(true), _) | (_, None) => break,
                (_, next) => token = next,
            }
        }
        Ok(issues)
    }

    pub fn approximate_count(&self, jql: &str) -> Result<u64> {
        let response = self
            .authed(self.http.post(self.url("/rest/api/3/search/approximate-count")))
            .json(&json!({ "jql": jql }))
            .send()?;
        let response = Self::check(response, "POST search/approximate-count")?;
        let count: ApproximateCount = response.json()?;
        Ok(count.count)
    }

    // -----------------------------------------------------------------------
    // Transitions and comments
    // -----------------------------------------------------------------------

    pub fn get_transitions(&self, key: &str) -> Result<Vec<Transition>> {
        let response = self
            .authed(
                self.http
                    .get(self.url(&format!("/rest/api/3/issue/{key}/transitions"))),
            )
            .send()?;
        let response = Self::check(response, &format!("GET transitions of {key}"))?;
        let body: TransitionsResponse = response.json()?;
        Ok(body.transitions)
    }

    pub fn transition_issue(&self, key: &str, transition_id: &str) -> Result<()> {
        let response = self
            .authed(
                self.http
                    .post(self.url(&format!("/rest/api/3/issue/{key}/transitions"))),
            )
            .json(&json!({ "transition": { "id": transition_id } }))
            .send()?;
        Self::check(response, &format!("POST transition of {key}"))?;
        Ok(())
    }

    /// Resolve a transition by its display name and fire it. The transition
    /// being unavailable is a distinct error so callers can downgrade it to a
    /// warning-level skip.
    pub fn transition_by_name(&self, key: &str, name: &str) -> Result<()> {
        let transitions = self.get_transitions(key)?;
        let transition = transitions
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SmsError::TransitionNotAvailable {
                issue: key.to_string(),
                transition: name.to_string(),
            })?;
        self.transition_issue(key, &transition.id)
    }

    pub fn add_comment(&self, key: &str, body: AdfDoc) -> Result<()> {
        let response = self
            .authed(
                self.http
                    .post(self.url(&format!("/rest/api/3/issue/{key}/comment"))),
            )
            .json(&json!({ "body": body.into_value() }))
            .send()?;
        Self::check(response, &format!("POST comment on {key}"))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Field metadata
    // -----------------------------------------------------------------------

    pub fn get_fields(&self) -> Result<Vec<FieldMeta>> {
        let response = self
            .authed(self.http.get(self.url("/rest/api/3/field")))
            .send()?;
        let response = Self::check(response, "GET field")?;
        Ok(response.json()?)
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Resolve a group name to its id via the groups picker. The picker does
    /// substring matching, so the results are scanned for an exact
    /// (case-insensitive) name match.
    pub fn find_group_id(&self, name: &str) -> Result<String> {
        let response = self
            .authed(self.http.get(self.url("/rest/api/3/groups/picker")))
            .query(&[("query", name)])
            .send()?;
        let response = Self::check(response, &format!("GET groups/picker {name}"))?;
        let picker: GroupsPicker = response.json()?;
        picker
            .groups
            .into_iter()
            .find(|g| g.name.eq_ignore_ascii_case(name))
            .map(|g| g.group_id)
            .ok_or_else(|| SmsError::GroupNotFound(name.to_string()))
    }

    pub fn group_members(&self, name: &str, include_inactive: bool) -> Result<Vec<User>> {
        let response = self
            .authed(self.http.get(self.url("/rest/api/3/group/member")))
            .query(&[
                ("groupname", name),
                ("includeInactiveUsers", if include_inactive { "true" } else { "false" }),
            ])
            .send()?;
        let response = Self::check(response, &format!("GET group/member {name}"))?;
        let page: GroupMembersPage = response.json()?;
        Ok(page.values)
    }

    pub fn add_user_to_group(&self, group_id: &str, account_id: &str) -> Result<()> {
        let response = self
            .authed(self.http.post(self.url("/rest/api/3/group/user")))
            .query(&[("groupId", group_id)])
            .json(&json!({ "accountId": account_id }))
            .send()?;
        Self::check(response, &format!("POST group/user {group_id}"))?;
        Ok(())
    }

    pub fn remove_user_from_group(&self, group_id: &str, account_id: &str) -> Result<()> {
        let response = self
            .authed(self.http.delete(self.url("/rest/api/3/group/user")))
            .query(&[("groupId", group_id), ("accountId", account_id)])
            .send()?;
        Self::check(response, &format!("DELETE group/user {group_id}"))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Arbitrary web requests (KPI auto-measurements)
    // -----------------------------------------------------------------------

    /// GET an absolute URL and parse the body as JSON. No Jira auth is sent;
    /// these are the external endpoints configured on KPI tickets.
    pub fn fetch_json(&self, url: &str) -> Result<Value> {
        let response = self.http.get(url).header("Accept", "application/json").send()?;
        let response = Self::check(response, &format!("GET {url}"))?;
        Ok(response.json()?)
    }

    /// GET an absolute URL and return the raw body.
    pub fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send()?;
        let response = Self::check(response, &format!("GET {url}"))?;
        Ok(response.text()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn client(server: &mockito::Server) -> JiraClient {
        JiraClient::new(server.url(), "sms@example.org", "token")
    }

    #[test]
    fn get_issue_parses_fields() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/rest/api/3/issue/SMS-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "key": "SMS-1", "fields": { "summary": "CRM process" } }"#)
            .create();

        let issue = client(&server).get_issue("SMS-1").unwrap();
        assert_eq!(issue.key, "SMS-1");
        assert_eq!(issue.summary(), "CRM process");
    }

    #[test]
    fn get_issue_404_is_issue_not_found() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/rest/api/3/issue/SMS-404")
            .with_status(404)
            .create();

        let err = client(&server).get_issue("SMS-404").unwrap_err();
        assert!(matches!(err, SmsError::IssueNotFound(_)));
    }

    #[test]
    fn non_success_status_is_reported_with_context() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/rest/api/3/search/approximate-count")
            .with_status(500)
            .create();

        let err = client(&server).approximate_count("project=SMS").unwrap_err();
        match err {
            SmsError::UnexpectedStatus { status, context } => {
                assert_eq!(status, 500);
                assert!(context.contains("approximate-count"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn transition_by_name_fires_matching_id() {
        let mut server = mockito::Server::new();
        let _get = server
            .mock("GET", "/rest/api/3/issue/SMS-1/transitions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{ "transitions": [
                    { "id": "11", "name": "Start review" },
                    { "id": "21", "name": "Retire" }
                ] }"#,
            )
            .create();
        let post = server
            .mock("POST", "/rest/api/3/issue/SMS-1/transitions")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "transition": { "id": "11" }
            })))
            .with_status(204)
            .create();

        client(&server).transition_by_name("SMS-1", "Start review").unwrap();
        post.assert();
    }

    #[test]
    fn transition_by_name_missing_is_distinct_error() {
        let mut server = mockito::Server::new();
        let _get = server
            .mock("GET", "/rest/api/3/issue/SMS-1/transitions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "transitions": [] }"#)
            .create();

        let err = client(&server)
            .transition_by_name("SMS-1", "Start review")
            .unwrap_err();
        assert!(matches!(err, SmsError::TransitionNotAvailable { .. }));
    }

    #[test]
    fn search_all_follows_page_tokens() {
        let mut server = mockito::Server::new();
        let _first = server
            .mock("POST", "/rest/api/3/search/jql")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "nextPageToken": null
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{ "issues": [ { "key": "SMS-1", "fields": {} } ],
                     "isLast": false, "nextPageToken": "t2" }"#,
            )
            .create();
        let _second = server
            .mock("POST", "/rest/api/3/search/jql")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "nextPageToken": "t2"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "issues": [ { "key": "SMS-2", "fields": {} } ], "isLast": true }"#)
            .create();

        let issues = client(&server).search_all("project=SMS", &["key"], 1).unwrap();
        let keys: Vec<_> = issues.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, ["SMS-1", "SMS-2"]);
    }

    #[test]
    fn find_group_id_requires_exact_name() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/rest/api/3/groups/picker")
            .match_query(mockito::Matcher::UrlEncoded(
                "query".into(),
                "crm-process-owner".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{ "groups": [
                    { "name": "crm-process-owner-deputies", "groupId": "g2" },
                    { "name": "crm-process-owner", "groupId": "g1" }
                ] }"#,
            )
            .create();

        let id = client(&server).find_group_id("crm-process-owner").unwrap();
        assert_eq!(id, "g1");
    }
}
