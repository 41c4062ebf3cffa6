//! "Create new policy" / "Create new procedure" workflow actions on process
//! tickets.
//!
//! The process ticket carries a draft title and code for the artifact.
//! Firing the action turns the draft into a real ticket in the process
//! project and a Confluence page cloned from the artifact's template, filed
//! under the process's container page ("<CODE> Policies" or
//! "<CODE> Procedures", itself created from a template on first use).
//! Template bodies use two placeholders: `XXX` stands for the process code
//! and a dummy ticket key for the ticket the page belongs to. Policies and
//! procedures share the whole flow; only the names differ.

use crate::adf::{AdfDoc, AdfText};
use crate::confluence::Page;
use crate::error::{Result, SmsError};
use crate::handlers::process;
use crate::handlers::{
    done, skipped, Handler, HandlerContext, IssueTypes, Manifest, Outcome, Trigger, WebhookEvent,
};
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;
use tracing::warn;

const FIELD_PROCESS_HOMEPAGE: &str = "Process homepage";
const FIELD_PROCESS_OWNER: &str = "Process owner";

const PLACEHOLDER_CODE: &str = "XXX";

/// The deltas between the two flavors of the action.
struct ArtifactKind {
    /// Issue type of the created ticket.
    noun: &'static str,
    field_title: &'static str,
    field_code: &'static str,
    field_homepage: &'static str,
    /// Template for the artifact's own page.
    page_template: &'static str,
    /// Template for the per-process container page.
    container_template: &'static str,
    /// Container page title suffix ("<CODE> Policies").
    container_noun: &'static str,
    /// Dummy ticket key the page template references.
    placeholder_key: &'static str,
}

const POLICY: ArtifactKind = ArtifactKind {
    noun: "Policy",
    field_title: "Policy title",
    field_code: "Policy code",
    field_homepage: "Policy homepage",
    page_template: "Policy Template",
    container_template: "Policies Template",
    container_noun: "Policies",
    placeholder_key: "XXX-67733",
};

const PROCEDURE: ArtifactKind = ArtifactKind {
    noun: "Procedure",
    field_title: "Procedure title",
    field_code: "Procedure code",
    field_homepage: "Procedure homepage",
    page_template: "Procedure Template",
    container_template: "Procedures Template",
    container_noun: "Procedures",
    placeholder_key: "XXX-99115",
};

fn homepage_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https://(.+)/wiki/spaces/(.+)/pages/([0-9a-zA-Z]+)").unwrap())
}

pub fn create_policy_page() -> Handler {
    Handler {
        manifest: Manifest {
            name: "create-policy",
            description: "turn the drafted policy into a ticket and a Confluence page",
            trigger: Trigger::Action {
                issue_types: IssueTypes::Prefixed("Process "),
                name: "Create new policy",
            },
        },
        run: run_create_policy,
    }
}

pub fn create_procedure_page() -> Handler {
    Handler {
        manifest: Manifest {
            name: "create-procedure",
            description: "turn the drafted procedure into a ticket and a Confluence page",
            trigger: Trigger::Action {
                issue_types: IssueTypes::Prefixed("Process "),
                name: "Create new procedure",
            },
        },
        run: run_create_procedure,
    }
}

fn run_create_policy(ctx: &HandlerContext, event: &WebhookEvent) -> Result<Outcome> {
    run_create(&POLICY, ctx, event)
}

fn run_create_procedure(ctx: &HandlerContext, event: &WebhookEvent) -> Result<Outcome> {
    run_create(&PROCEDURE, ctx, event)
}

/// Rewrite template placeholders. The key placeholder embeds the code
/// placeholder, so it must be replaced first.
fn fill_template(kind: &ArtifactKind, body: &str, code: &str, key: &str) -> String {
    body.replace(kind.placeholder_key, key)
        .replace(PLACEHOLDER_CODE, code)
}

fn run_create(kind: &ArtifactKind, ctx: &HandlerContext, event: &WebhookEvent) -> Result<Outcome> {
    let issue = &event.issue;
    let noun_lower = kind.noun.to_lowercase();
    let Some(confluence) = ctx.confluence else {
        return Err(SmsError::ConfluenceNotConfigured);
    };
    let Some(code) = process_code(ctx, event) else {
        return skipped("cannot determine process code");
    };

    let Some(title) = ctx.fields.string_value(issue, kind.field_title) else {
        return skipped(format!("no {noun_lower} title drafted"));
    };
    let Some(artifact_code) = ctx.fields.string_value(issue, kind.field_code) else {
        return skipped(format!("no {noun_lower} code drafted"));
    };

    let Some(homepage) = ctx.fields.string_value(issue, FIELD_PROCESS_HOMEPAGE) else {
        return skipped("no process homepage configured");
    };
    let Some(caps) = homepage_url().captures(&homepage) else {
        return skipped(format!("unparseable process homepage '{homepage}'"));
    };
    let host = caps[1].to_string();
    let space = caps[2].to_string();
    let process_page_id = caps[3].to_string();

    // Container page for this process, created from its template on first
    // use.
    let container_title = format!("{code} {}", kind.container_noun);
    let container_page_id = match confluence.find_page(&container_title)? {
        Some(page) => page.id,
        None => {
            let Some(template) = confluence.find_page(kind.container_template)? else {
                return Err(SmsError::PageNotFound(kind.container_template.to_string()));
            };
            let template = with_filled_body(kind, template, &code, "");
            confluence
                .copy_page(&template, &process_page_id, &container_title)?
                .id
        }
    };

    let Some(template) = confluence.find_page(kind.page_template)? else {
        return Err(SmsError::PageNotFound(kind.page_template.to_string()));
    };

    // The ticket comes first so the page body can reference its key.
    let owner = ctx
        .fields
        .user_value(issue, FIELD_PROCESS_OWNER)
        .and_then(|u| u.account_id);
    let summary = format!("{artifact_code} {title}");
    let mut fields = serde_json::Map::new();
    fields.insert("project".to_string(), json!({ "key": code }));
    fields.insert("issuetype".to_string(), json!({ "name": kind.noun }));
    fields.insert("summary".to_string(), json!(summary));
    fields.insert(
        ctx.fields.require(kind.field_code)?.to_string(),
        json!(artifact_code),
    );
    if let Some(id) = &owner {
        fields.insert("assignee".to_string(), json!({ "accountId": id }));
    }
    let created = ctx.jira.create_issue(&json!({ "fields": fields }))?;

    let template = with_filled_body(kind, template, &code, &created.key);
    let page = confluence.copy_page(&template, &container_page_id, &summary)?;

    let page_url = format!("https://{host}/wiki/spaces/{space}/pages/{}", page.id);
    let mut homepage_fields = serde_json::Map::new();
    homepage_fields.insert(
        ctx.fields.require(kind.field_homepage)?.to_string(),
        json!(page_url),
    );
    ctx.jira
        .update_issue_fields(&created.key, serde_json::Value::Object(homepage_fields))?;

    // Clear the draft fields so the action can be fired again later.
    let mut cleared = serde_json::Map::new();
    cleared.insert(
        ctx.fields.require(kind.field_title)?.to_string(),
        serde_json::Value::Null,
    );
    cleared.insert(
        ctx.fields.require(kind.field_code)?.to_string(),
        serde_json::Value::Null,
    );
    let cleared = serde_json::Value::Object(cleared);
    if let Err(err) = ctx.jira.update_issue_fields_unscreened(&issue.key, cleared) {
        warn!(issue = issue.key, %err, "could not clear {noun_lower} draft fields");
    }

    let comment = AdfDoc::new().paragraph([
        AdfText::plain(format!("{} ", kind.noun)),
        AdfText::link(
            created.key.as_str(),
            format!("{}/browse/{}", ctx.jira.base_url(), created.key),
        ),
        AdfText::plain(" created with "),
        AdfText::link("its homepage", page_url.as_str()),
        AdfText::plain("."),
    ]);
    if let Err(err) = ctx.jira.add_comment(&issue.key, comment) {
        warn!(issue = issue.key, %err, "could not comment on process ticket");
    }

    done(format!("created {} and page {}", created.key, page.id))
}

fn process_code(ctx: &HandlerContext, event: &WebhookEvent) -> Option<String> {
    process::process_code(&event.issue, &ctx.config.process)
}

fn with_filled_body(kind: &ArtifactKind, mut page: Page, code: &str, key: &str) -> Page {
    if let Some(storage) = page.body.storage.as_mut() {
        storage.value = fill_template(kind, &storage.value, code, key);
    }
    page
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
