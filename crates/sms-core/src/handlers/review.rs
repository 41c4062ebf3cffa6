//! Review lifecycle for policies, procedures and processes.
//!
//! Three handlers cover the cycle:
//!   - `init` fills owner, manager and stakeholders on a freshly created
//!     review ticket from the project's role groups.
//!   - `start_review` fires when a subject moves Active -> In Review and
//!     creates the period's review ticket, linked back to the subject.
//!   - `review_done` closes the loop: when a review ticket is finished the
//!     subject (still sitting in In Review) is moved on to implement the
//!     changes.

use crate::adf::{AdfDoc, AdfText};
use crate::error::{Result, SmsError};
use crate::handlers::process;
use crate::handlers::{
    done, skipped, EventKind, Handler, HandlerContext, IssueTypes, Manifest, Outcome, Trigger,
    WebhookEvent,
};
use crate::jira::groups;
use crate::jira::links::{find_linked, LinkDirection};
use crate::schedule::Frequency;
use serde_json::json;
use tracing::warn;

pub const LINK_REVIEW: &str = "Review";

const FIELD_PROCESS_OWNER: &str = "Process owner";
const FIELD_PROCESS_MANAGER: &str = "Process manager";
const FIELD_STAKEHOLDERS: &str = "Stakeholders";
const FIELD_REVIEW_FREQUENCY: &str = "Review frequency";
const FIELD_POLICY_CODE: &str = "Policy code";
const FIELD_PROCEDURE_CODE: &str = "Procedure code";
const FIELD_DEFINITION_UPDATES: &str = "Process definition review and updates";

const REVIEW_SECTION_PLACEHOLDER: &str = "Current status and need for improvements.";

const TRANSITION_IMPLEMENT: &str = "Implement changes";

const REVIEW_TYPES: IssueTypes =
    IssueTypes::Named(&["Policy Review", "Procedure Review", "Process Review"]);
const SUBJECT_TYPES: IssueTypes = IssueTypes::AnyOf(&[
    IssueTypes::Named(&["Policy", "Procedure"]),
    IssueTypes::Prefixed("Process "),
]);

fn subject_kind(issue_type: &str) -> Option<&'static str> {
    if issue_type.eq_ignore_ascii_case("Policy") {
        Some("Policy")
    } else if issue_type.eq_ignore_ascii_case("Procedure") {
        Some("Procedure")
    } else if issue_type.starts_with("Process ") {
        Some("Process")
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// review-init
// ---------------------------------------------------------------------------

pub fn init() -> Handler {
    Handler {
        manifest: Manifest {
            name: "review-init",
            description: "fill roles and stakeholders on new review tickets",
            trigger: Trigger::Event {
                kinds: &[EventKind::IssueCreated],
                issue_types: REVIEW_TYPES,
            },
        },
        run: run_init,
    }
}

fn first_member(ctx: &HandlerContext, group: &str) -> Option<String> {
    match groups::group_members(ctx.jira, group) {
        Ok(members) => members.into_iter().find_map(|u| u.account_id),
        Err(err) => {
            warn!(group, %err, "could not read role group");
            None
        }
    }
}

fn run_init(ctx: &HandlerContext, event: &WebhookEvent) -> Result<Outcome> {
    let issue = &event.issue;
    let Some(project) = issue.project_key() else {
        return skipped("no project on issue");
    };
    let prefix = project.to_ascii_lowercase();
    let owner = first_member(ctx, &format!("{prefix}-process-owner"));
    let manager = first_member(ctx, &format!("{prefix}-process-manager"));
    if owner.is_none() && manager.is_none() {
        return skipped(format!("no role groups for project {project}"));
    }

    let mut fields = serde_json::Map::new();
    let mut stakeholders = Vec::new();
    if let Some(id) = &owner {
        fields.insert(
            ctx.fields.require(FIELD_PROCESS_OWNER)?.to_string(),
            json!({ "accountId": id }),
        );
        stakeholders.push(json!({ "accountId": id }));
    }
    if let Some(id) = &manager {
        fields.insert(
            ctx.fields.require(FIELD_PROCESS_MANAGER)?.to_string(),
            json!({ "accountId": id }),
        );
        if manager != owner {
            stakeholders.push(json!({ "accountId": id }));
        }
    }
    fields.insert(
        ctx.fields.require(FIELD_STAKEHOLDERS)?.to_string(),
        json!(stakeholders),
    );
    // An assignee picked by hand at creation time wins.
    if issue.fields.assignee.is_none() {
        if let Some(id) = owner.as_ref().or(manager.as_ref()) {
            fields.insert("assignee".to_string(), json!({ "accountId": id }));
        }
    }
    // Process reviews get their definition tab pre-seeded with the sections
    // the reviewers walk through. Skipped when the deployment has no such
    // field.
    if issue.issue_type().eq_ignore_ascii_case("Process Review") {
        if let Some(id) = ctx.fields.id_of(FIELD_DEFINITION_UPDATES) {
            let tabs = AdfDoc::new().sections(
                ["Goals", "Requirements", "Roles", "Input & Output"],
                REVIEW_SECTION_PLACEHOLDER,
            );
            fields.insert(id.to_string(), tabs.into_value());
        }
    }

    ctx.jira
        .update_issue_fields_unscreened(&issue.key, serde_json::Value::Object(fields))?;
    done(format!("roles filled from {prefix}-process-* groups"))
}

// ---------------------------------------------------------------------------
// start-review
// ---------------------------------------------------------------------------

pub fn start_review() -> Handler {
    Handler {
        manifest: Manifest {
            name: "start-review",
            description: "create the review ticket when a subject enters review",
            trigger: Trigger::Transition {
                issue_types: SUBJECT_TYPES,
                from: "Active",
                to: "In Review",
            },
        },
        run: run_start_review,
    }
}

fn run_start_review(ctx: &HandlerContext, event: &WebhookEvent) -> Result<Outcome> {
    let issue = &event.issue;
    let Some(kind) = subject_kind(issue.issue_type()) else {
        return skipped("not a review subject");
    };
    let Some(project) = issue.project_key() else {
        return skipped("no project on issue");
    };

    let code = match kind {
        "Policy" => ctx.fields.string_value(issue, FIELD_POLICY_CODE),
        "Procedure" => ctx.fields.string_value(issue, FIELD_PROCEDURE_CODE),
        _ => process::process_code(issue, &ctx.config.process),
    }
    .unwrap_or_else(|| issue.key.clone());

    let frequency = ctx
        .fields
        .option_value(issue, FIELD_REVIEW_FREQUENCY)
        .and_then(|v| Frequency::parse(&v))
        .unwrap_or(Frequency::Monthly);
    let label = frequency.period_label(ctx.now.date_naive());

    let assignee = ctx
        .fields
        .user_value(issue, FIELD_PROCESS_OWNER)
        .and_then(|u| u.account_id)
        .or_else(|| {
            ctx.fields
                .user_value(issue, FIELD_PROCESS_MANAGER)
                .and_then(|u| u.account_id)
        });

    let mut body = json!({
        "fields": {
            "project": { "key": project },
            "issuetype": { "name": format!("{kind} Review") },
            "summary": format!("Review of {} {} on {}", kind.to_lowercase(), code, label),
        },
        "update": {
            "issuelinks": [{
                "add": {
                    "type": { "name": LINK_REVIEW },
                    "inwardIssue": { "key": issue.key }
                }
            }]
        }
    });
    if let Some(id) = assignee {
        body["fields"]["assignee"] = json!({ "accountId": id });
    }

    let created = ctx.jira.create_issue(&body)?;
    let comment = AdfDoc::new().paragraph([
        AdfText::plain("Review "),
        AdfText::link(
            created.key.as_str(),
            format!("{}/browse/{}", ctx.jira.base_url(), created.key),
        ),
        AdfText::plain(format!(" started for period {label}.")),
    ]);
    if let Err(err) = ctx.jira.add_comment(&issue.key, comment) {
        warn!(issue = issue.key, %err, "could not comment on review subject");
    }
    done(format!("created {} for {}", created.key, issue.key))
}

// ---------------------------------------------------------------------------
// review-done
// ---------------------------------------------------------------------------

pub fn review_done() -> Handler {
    Handler {
        manifest: Manifest {
            name: "review-done",
            description: "move the subject onward once its review is finished",
            trigger: Trigger::Transition {
                issue_types: REVIEW_TYPES,
                from: "In Progress",
                to: "Done",
            },
        },
        run: run_review_done,
    }
}

fn run_review_done(ctx: &HandlerContext, event: &WebhookEvent) -> Result<Outcome> {
    let issue = &event.issue;
    let Some(subject) = find_linked(
        &issue.key,
        &issue.fields.issuelinks,
        LINK_REVIEW,
        LinkDirection::Inward,
        None,
    ) else {
        return skipped("no review subject linked");
    };

    // Link stubs usually carry the status, but not always.
    let status = match subject.status_name() {
        Some(status) => status.to_string(),
        None => ctx.jira.get_issue(&subject.key)?.status_name().to_string(),
    };
    if !status.eq_ignore_ascii_case("In Review") {
        return skipped(format!("{} is in {status}, leaving it alone", subject.key));
    }

    match ctx.jira.transition_by_name(&subject.key, TRANSITION_IMPLEMENT) {
        Ok(()) => done(format!("moved {} to implement changes", subject.key)),
        Err(SmsError::TransitionNotAvailable { .. }) => {
            warn!(
                issue = issue.key,
                subject = subject.key,
                "implement-changes transition not available"
            );
            skipped(format!("transition not available on {}", subject.key))
        }
        Err(err) => Err(err),
    }
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
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;
    use serde_json::json;

    fn resolver() -> FieldResolver {
        let names = [
            ("customfield_501", FIELD_PROCESS_OWNER),
            ("customfield_502", FIELD_PROCESS_MANAGER),
            ("customfield_503", FIELD_STAKEHOLDERS),
            ("customfield_504", FIELD_REVIEW_FREQUENCY),
            ("customfield_505", FIELD_POLICY_CODE),
            ("customfield_506", FIELD_PROCEDURE_CODE),
            ("customfield_507", FIELD_DEFINITION_UPDATES),
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

    struct Ctx {
        server: mockito::ServerGuard,
        client: JiraClient,
        resolver: FieldResolver,
        config: SmsConfig,
    }

    impl Ctx {
        fn new() -> Self {
            let server = mockito::Server::new();
            let client = JiraClient::new(server.url(), "sms@example.org", "token");
            Self {
                server,
                client,
                resolver: resolver(),
                config: SmsConfig::example(),
            }
        }

        fn handler_context(&self) -> HandlerContext<'_> {
            HandlerContext {
                jira: &self.client,
                confluence: None,
                fields: &self.resolver,
                config: &self.config,
                now: Utc.with_ymd_and_hms(2024, 8, 5, 9, 0, 0).unwrap(),
            }
        }

        fn mock_group(&mut self, name: &str, account_ids: &[&str]) {
            self.server
                .mock("GET", "/rest/api/3/groups/picker")
                .match_query(Matcher::UrlEncoded("query".into(), name.into()))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(format!(
                    r#"{{ "groups": [ {{ "name": "{name}", "groupId": "gid-{name}" }} ] }}"#
                ))
                .create();
            let members: Vec<String> = account_ids
                .iter()
                .map(|id| format!(r#"{{ "accountId": "{id}" }}"#))
                .collect();
            self.server
                .mock("GET", "/rest/api/3/group/member")
                .match_query(Matcher::AllOf(vec![Matcher::UrlEncoded(
                    "groupname".into(),
                    name.into(),
                )]))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(format!(r#"{{ "values": [ {} ] }}"#, members.join(", ")))
                .create();
        }
    }

    #[test]
    fn init_fills_roles_and_assignee() {
        let mut ctx = Ctx::new();
        ctx.mock_group("crm-process-owner", &["owner-1"]);
        ctx.mock_group("crm-process-manager", &["manager-1"]);
        let update = ctx
            .server
            .mock("PUT", "/rest/api/3/issue/CRM-9")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "fields": {
                    "customfield_501": { "accountId": "owner-1" },
                    "customfield_502": { "accountId": "manager-1" },
                    "customfield_503": [
                        { "accountId": "owner-1" },
                        { "accountId": "manager-1" }
                    ],
                    "assignee": { "accountId": "owner-1" }
                }
            })))
            .with_status(204)
            .create();

        let event = WebhookEvent::from_json(&json!({
            "webhookEvent": "jira:issue_created",
            "issue": { "key": "CRM-9", "fields": {
                "issuetype": { "name": "Policy Review" },
                "project": { "key": "CRM" }
            } }
        }))
        .unwrap();
        let handler_ctx = ctx.handler_context();
        let outcome = run_init(&handler_ctx, &event).unwrap();
        assert!(matches!(outcome, Outcome::Done(_)));
        update.assert();
    }

    #[test]
    fn process_review_init_seeds_definition_tab() {
        let mut ctx = Ctx::new();
        ctx.mock_group("crm-process-owner", &["owner-1"]);
        ctx.mock_group("crm-process-manager", &[]);
        let update = ctx
            .server
            .mock("PUT", "/rest/api/3/issue/CRM-10")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "fields": {
                    "customfield_507": {
                        "type": "doc",
                        "version": 1,
                        "content": [
                            { "type": "heading", "attrs": { "level": 3 },
                              "content": [{ "type": "text", "text": "Goals" }] },
                            { "type": "paragraph",
                              "content": [{ "type": "text",
                                            "text": "Current status and need for improvements." }] }
                        ]
                    }
                }
            })))
            .with_status(204)
            .create();

        let event = WebhookEvent::from_json(&json!({
            "webhookEvent": "jira:issue_created",
            "issue": { "key": "CRM-10", "fields": {
                "issuetype": { "name": "Process Review" },
                "project": { "key": "CRM" }
            } }
        }))
        .unwrap();
        let handler_ctx = ctx.handler_context();
        let outcome = run_init(&handler_ctx, &event).unwrap();
        assert!(matches!(outcome, Outcome::Done(_)));
        update.assert();
    }

    #[test]
    fn init_without_role_groups_is_skipped() {
        let mut ctx = Ctx::new();
        // Picker knows no matching group at all.
        ctx.server
            .mock("GET", "/rest/api/3/groups/picker")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "groups": [] }"#)
            .create();

        let event = WebhookEvent::from_json(&json!({
            "webhookEvent": "jira:issue_created",
            "issue": { "key": "CRM-9", "fields": {
                "issuetype": { "name": "Process Review" },
                "project": { "key": "CRM" }
            } }
        }))
        .unwrap();
        let handler_ctx = ctx.handler_context();
        let outcome = run_init(&handler_ctx, &event).unwrap();
        assert!(matches!(outcome, Outcome::Skipped(_)));
    }

    #[test]
    fn start_review_creates_linked_ticket_with_period_label() {
        let mut ctx = Ctx::new();
        let create = ctx
            .server
            .mock("POST", "/rest/api/3/issue")
            .match_body(Matcher::PartialJson(json!({
                "fields": {
                    "project": { "key": "CRM" },
                    "issuetype": { "name": "Policy Review" },
                    "summary": "Review of policy POL-IS on 2024.Q3",
                    "assignee": { "accountId": "owner-1" }
                },
                "update": {
                    "issuelinks": [{
                        "add": {
                            "type": { "name": "Review" },
                            "inwardIssue": { "key": "CRM-3" }
                        }
                    }]
                }
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "id": "10500", "key": "CRM-77" }"#)
            .create();
        let comment = ctx
            .server
            .mock("POST", "/rest/api/3/issue/CRM-3/comment")
            .match_body(Matcher::Regex("CRM-77".to_string()))
            .with_status(201)
            .create();

        let event = WebhookEvent::from_json(&json!({
            "webhookEvent": "jira:issue_updated",
            "issue": { "key": "CRM-3", "fields": {
                "issuetype": { "name": "Policy" },
                "project": { "key": "CRM" },
                "customfield_504": { "value": "Quarterly" },
                "customfield_505": "POL-IS",
                "customfield_501": { "accountId": "owner-1" }
            } },
            "changelog": { "items": [
                { "field": "status", "fromString": "Active", "toString": "In Review" }
            ] }
        }))
        .unwrap();
        assert!(start_review().manifest.matches(&event));

        let handler_ctx = ctx.handler_context();
        let outcome = run_start_review(&handler_ctx, &event).unwrap();
        assert!(matches!(outcome, Outcome::Done(_)));
        create.assert();
        comment.assert();
    }

    #[test]
    fn start_review_defaults_to_monthly_and_key() {
        let mut ctx = Ctx::new();
        let create = ctx
            .server
            .mock("POST", "/rest/api/3/issue")
            .match_body(Matcher::PartialJson(json!({
                "fields": {
                    "issuetype": { "name": "Process Review" },
                    "summary": "Review of process CRM on 2024.08"
                }
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "id": "10501", "key": "CRM-78" }"#)
            .create();
        ctx.server
            .mock("POST", "/rest/api/3/issue/CRM-1/comment")
            .with_status(201)
            .create();

        let event = WebhookEvent::from_json(&json!({
            "webhookEvent": "jira:issue_updated",
            "issue": { "key": "CRM-1", "fields": {
                "issuetype": { "name": "Process CRM" },
                "project": { "key": "CRM" }
            } },
            "changelog": { "items": [
                { "field": "status", "fromString": "Active", "toString": "In Review" }
            ] }
        }))
        .unwrap();
        let handler_ctx = ctx.handler_context();
        let outcome = run_start_review(&handler_ctx, &event).unwrap();
        assert!(matches!(outcome, Outcome::Done(_)));
        create.assert();
    }

    #[test]
    fn review_done_moves_subject_in_review() {
        let mut ctx = Ctx::new();
        let transitions = ctx
            .server
            .mock("GET", "/rest/api/3/issue/CRM-3/transitions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{ "transitions": [ { "id": "61", "name": "Implement changes" } ] }"#)
            .create();
        let fire = ctx
            .server
            .mock("POST", "/rest/api/3/issue/CRM-3/transitions")
            .match_body(Matcher::PartialJson(json!({ "transition": { "id": "61" } })))
            .with_status(204)
            .create();

        let event = WebhookEvent::from_json(&json!({
            "webhookEvent": "jira:issue_updated",
            "issue": { "key": "CRM-77", "fields": {
                "issuetype": { "name": "Policy Review" },
                "issuelinks": [{
                    "type": { "name": "Review" },
                    "inwardIssue": {
                        "key": "CRM-3",
                        "fields": {
                            "issuetype": { "name": "Policy" },
                            "status": { "name": "In Review" }
                        }
                    }
                }]
            } },
            "changelog": { "items": [
                { "field": "status", "fromString": "In Progress", "toString": "Done" }
            ] }
        }))
        .unwrap();
        assert!(review_done().manifest.matches(&event));

        let handler_ctx = ctx.handler_context();
        let outcome = run_review_done(&handler_ctx, &event).unwrap();
        assert!(matches!(outcome, Outcome::Done(_)));
        transitions.assert();
        fire.assert();
    }

    #[test]
    fn review_done_leaves_subject_in_other_status() {
        let ctx = Ctx::new();
        let event = WebhookEvent::from_json(&json!({
            "webhookEvent": "jira:issue_updated",
            "issue": { "key": "CRM-77", "fields": {
                "issuetype": { "name": "Policy Review" },
                "issuelinks": [{
                    "type": { "name": "Review" },
                    "inwardIssue": {
                        "key": "CRM-3",
                        "fields": {
                            "issuetype": { "name": "Policy" },
                            "status": { "name": "Active" }
                        }
                    }
                }]
            } },
            "changelog": { "items": [
                { "field": "status", "fromString": "In Progress", "toString": "Done" }
            ] }
        }))
        .unwrap();
        let handler_ctx = ctx.handler_context();
        let outcome = run_review_done(&handler_ctx, &event).unwrap();
        assert!(matches!(outcome, Outcome::Skipped(_)));
    }
}
