//! Process role configuration.
//!
//! Process tickets ("Process CRM", "Process HR", ...) carry the process
//! owner and manager as user fields. Whenever one of them changes, the
//! matching Jira groups (`crm-process-owner`, `crm-process-manager`) are
//! synced to exactly the configured user, so that group-based lookups
//! elsewhere (review init, KPI escalation) always see the current role
//! holder. The handler also derives and stores the short process code and
//! keeps the `… old` companion fields up to date for delta detection.

use crate::config::ProcessConfig;
use crate::error::Result;
use crate::handlers::{
    done, skipped, EventKind, Handler, HandlerContext, IssueTypes, Manifest, Outcome, Trigger,
    WebhookEvent,
};
use crate::jira::fields::{changed, old_companion};
use crate::jira::groups;
use crate::jira::models::Issue;
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;
use tracing::warn;

const FIELD_PROCESS_CODE: &str = "Process code";
const FIELD_PROCESS_OWNER: &str = "Process owner";
const FIELD_PROCESS_MANAGER: &str = "Process manager";
const FIELD_SMS_OWNER: &str = "SMS owner";
const FIELD_SMS_MANAGER: &str = "SMS manager";

fn abbreviation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([A-Za-z0-9]+)\)").unwrap())
}

/// Short code of a process, e.g. "CRM" for issue type "Process CRM".
/// Config overrides win; otherwise the issue type suffix is uppercased, and
/// as a last resort a parenthesized abbreviation in the summary is used
/// ("Customer Relationship Management (CRM)").
pub fn process_code(issue: &Issue, config: &ProcessConfig) -> Option<String> {
    let issue_type = issue.issue_type();
    if let Some(code) = config.code_overrides.get(issue_type) {
        return Some(code.clone());
    }
    if let Some(suffix) = issue_type.strip_prefix("Process ") {
        if !suffix.trim().is_empty() {
            return Some(suffix.trim().to_ascii_uppercase());
        }
    }
    abbreviation()
        .captures(issue.summary())
        .map(|caps| caps[1].to_ascii_uppercase())
}

/// Long name of a process: the summary with the parenthesized abbreviation
/// stripped ("Customer Relationship Management (CRM)" → "Customer
/// Relationship Management").
pub fn process_name(issue: &Issue) -> String {
    abbreviation()
        .replace_all(issue.summary(), "")
        .trim()
        .to_string()
}

/// Group holding a process role. The top-level SMS process uses `sms-owner`
/// and `sms-manager`; every other process gets `<code>-process-<role>`.
pub fn role_group(code: &str, role: &str) -> String {
    let code = code.to_ascii_lowercase();
    if code == "sms" {
        format!("{code}-{role}")
    } else {
        format!("{code}-process-{role}")
    }
}

pub fn configure() -> Handler {
    Handler {
        manifest: Manifest {
            name: "process-configure",
            description: "sync process role groups with the owner/manager fields",
            trigger: Trigger::Event {
                kinds: &[EventKind::IssueCreated, EventKind::IssueUpdated],
                issue_types: IssueTypes::Prefixed("Process "),
            },
        },
        run: run_configure,
    }
}

fn run_configure(ctx: &HandlerContext, event: &WebhookEvent) -> Result<Outcome> {
    let issue = &event.issue;
    let Some(code) = process_code(issue, &ctx.config.process) else {
        return skipped("cannot determine process code");
    };
    let sms_process = code.eq_ignore_ascii_case("SMS");

    // The top-level process carries its roles in dedicated fields.
    let owner_field = if sms_process { FIELD_SMS_OWNER } else { FIELD_PROCESS_OWNER };
    let manager_field = if sms_process { FIELD_SMS_MANAGER } else { FIELD_PROCESS_MANAGER };

    let owner = ctx
        .fields
        .user_value(issue, owner_field)
        .and_then(|u| u.account_id);
    let owner_old = ctx
        .fields
        .string_value(issue, &old_companion(FIELD_PROCESS_OWNER));
    let manager = ctx
        .fields
        .user_value(issue, manager_field)
        .and_then(|u| u.account_id);
    let manager_old = ctx
        .fields
        .string_value(issue, &old_companion(FIELD_PROCESS_MANAGER));

    let owner_changed = changed(owner.as_deref(), owner_old.as_deref());
    let manager_changed = changed(manager.as_deref(), manager_old.as_deref());
    if !owner_changed && !manager_changed {
        return skipped("no role changes");
    }

    let mut changes = Vec::new();
    let mut fields = serde_json::Map::new();
    fields.insert(
        ctx.fields.require(FIELD_PROCESS_CODE)?.to_string(),
        json!(code),
    );

    if owner_changed {
        changes.push("owner");
        let desired: Vec<String> = owner.clone().into_iter().collect();
        if let Err(err) = groups::reconcile(ctx.jira, &role_group(&code, "owner"), &desired) {
            warn!(issue = issue.key, %err, "could not sync owner group");
        }
        fields.insert(
            ctx.fields
                .require(&old_companion(FIELD_PROCESS_OWNER))?
                .to_string(),
            json!(owner),
        );
    }
    if manager_changed {
        changes.push("manager");
        let desired: Vec<String> = manager.clone().into_iter().collect();
        if let Err(err) = groups::reconcile(ctx.jira, &role_group(&code, "manager"), &desired) {
            warn!(issue = issue.key, %err, "could not sync manager group");
        }
        fields.insert(
            ctx.fields
                .require(&old_companion(FIELD_PROCESS_MANAGER))?
                .to_string(),
            json!(manager),
        );
    }

    // Backups live off-screen.
    ctx.jira
        .update_issue_fields_unscreened(&issue.key, serde_json::Value::Object(fields))?;
    done(format!("changed {} of process {code}", changes.join(", ")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmsConfig;
    use crate::jira::client::JiraClient;
    use crate::jira::fields::FieldResolver;
    use crate::jira::models::FieldMeta;
    use chrono::Utc;

    fn resolver() -> FieldResolver {
        let names = [
            ("customfield_401", FIELD_PROCESS_CODE),
            ("customfield_402", FIELD_PROCESS_OWNER),
            ("customfield_403", "Process owner old"),
            ("customfield_404", FIELD_PROCESS_MANAGER),
            ("customfield_405", "Process manager old"),
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

    fn process_event(fields: serde_json::Value) -> WebhookEvent {
        WebhookEvent::from_json(&serde_json::json!({
            "webhookEvent": "jira:issue_updated",
            "issue": { "key": "SMS-3", "fields": fields }
        }))
        .unwrap()
    }

    #[test]
    fn code_derivation() {
        let mut config = ProcessConfig::default();
        let crm: Issue = serde_json::from_str(
            r#"{ "key": "SMS-3", "fields": { "issuetype": { "name": "Process CRM" } } }"#,
        )
        .unwrap();
        assert_eq!(process_code(&crm, &config).as_deref(), Some("CRM"));

        let chardm: Issue = serde_json::from_str(
            r#"{ "key": "SMS-4", "fields": { "issuetype": { "name": "Process ChaRDM" } } }"#,
        )
        .unwrap();
        assert_eq!(process_code(&chardm, &config).as_deref(), Some("CHARDM"));

        config
            .code_overrides
            .insert("Process ChaRDM".to_string(), "CHG".to_string());
        assert_eq!(process_code(&chardm, &config).as_deref(), Some("CHG"));

        let by_summary: Issue = serde_json::from_str(
            r#"{ "key": "SMS-5", "fields": {
                "issuetype": { "name": "Task" },
                "summary": "Customer Relationship Management (CRM)"
            } }"#,
        )
        .unwrap();
        assert_eq!(process_code(&by_summary, &config).as_deref(), Some("CRM"));
    }

    #[test]
    fn name_strips_the_abbreviation() {
        let crm: Issue = serde_json::from_str(
            r#"{ "key": "SMS-3", "fields": {
                "issuetype": { "name": "Process CRM" },
                "summary": "Customer Relationship Management (CRM)"
            } }"#,
        )
        .unwrap();
        assert_eq!(process_name(&crm), "Customer Relationship Management");

        let bare: Issue =
            serde_json::from_str(r#"{ "key": "SMS-4", "fields": {} }"#).unwrap();
        assert_eq!(process_name(&bare), "");
    }

    #[test]
    fn role_group_names() {
        assert_eq!(role_group("CRM", "owner"), "crm-process-owner");
        assert_eq!(role_group("CRM", "manager"), "crm-process-manager");
        assert_eq!(role_group("SMS", "owner"), "sms-owner");
    }

    #[test]
    fn no_role_change_is_skipped() {
        let server = mockito::Server::new();
        let client = JiraClient::new(server.url(), "sms@example.org", "token");
        let resolver = resolver();
        let config = SmsConfig::example();
        let ctx = HandlerContext {
            jira: &client,
            confluence: None,
            fields: &resolver,
            config: &config,
            now: Utc::now(),
        };
        let event = process_event(serde_json::json!({
            "issuetype": { "name": "Process CRM" },
            "customfield_402": { "accountId": "A", "displayName": "Ada" },
            "customfield_403": "A"
        }));
        let outcome = run_configure(&ctx, &event).unwrap();
        assert!(matches!(outcome, Outcome::Skipped(_)));
    }

    #[test]
    fn owner_change_syncs_group_and_stores_backup() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/rest/api/3/groups/picker")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "groups": [ { "name": "crm-process-owner", "groupId": "g1" } ] }"#)
            .create();
        server
            .mock("GET", "/rest/api/3/group/member")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "values": [ { "accountId": "B", "displayName": "Bob" } ] }"#)
            .create();
        let removed = server
            .mock("DELETE", "/rest/api/3/group/user")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .create();
        let added = server
            .mock("POST", "/rest/api/3/group/user")
            .match_query(mockito::Matcher::Any)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "accountId": "A"
            })))
            .with_status(201)
            .create();
        let update = server
            .mock("PUT", "/rest/api/3/issue/SMS-3")
            .match_query(mockito::Matcher::UrlEncoded(
                "overrideScreenSecurity".into(),
                "true".into(),
            ))
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "fields": { "customfield_401": "CRM", "customfield_403": "A" }
            })))
            .with_status(204)
            .create();

        let client = JiraClient::new(server.url(), "sms@example.org", "token");
        let resolver = resolver();
        let config = SmsConfig::example();
        let ctx = HandlerContext {
            jira: &client,
            confluence: None,
            fields: &resolver,
            config: &config,
            now: Utc::now(),
        };
        let event = process_event(serde_json::json!({
            "issuetype": { "name": "Process CRM" },
            "customfield_402": { "accountId": "A", "displayName": "Ada" }
        }));
        let outcome = run_configure(&ctx, &event).unwrap();
        assert!(matches!(outcome, Outcome::Done(_)));
        removed.assert();
        added.assert();
        update.assert();
    }
}
