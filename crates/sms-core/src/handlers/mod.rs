//! Event-driven automation handlers.
//!
//! Each handler declares a `Manifest` describing what triggers it (issue
//! events, a workflow status change, or a named workflow action) and a run
//! function. The dispatcher routes one incoming `WebhookEvent` to every
//! matching handler; a handler error is logged and never aborts its
//! siblings. Issues whose summary trims and lowercases to `"test"` are
//! exercise data and are skipped wholesale.
//!
//! Layout:
//! - `measurement`   — auto-gathering on new Measurements, recording deltas
//! - `process`       — process role/group configuration
//! - `review`        — review ticket init, start-review, review-done
//! - `satisfaction`  — customer satisfaction review lifecycle
//! - `artifact_page` — Confluence page templating for new policies/procedures
//! - `stakeholders`  — stakeholder population from service ops groups
//! - `customer`      — customer activation/deactivation validators
//! - `scripted_fields` — computed display values from linked issues

pub mod artifact_page;
pub mod customer;
pub mod measurement;
pub mod process;
pub mod review;
pub mod satisfaction;
pub mod scripted_fields;
pub mod stakeholders;

use crate::config::SmsConfig;
use crate::confluence::ConfluenceClient;
use crate::error::{Result, SmsError};
use crate::jira::client::JiraClient;
use crate::jira::fields::FieldResolver;
use crate::jira::models::Issue;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, info};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    IssueCreated,
    IssueUpdated,
}

/// A workflow status change carried in the event's changelog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub kind: EventKind,
    pub issue: Issue,
    /// Present when the update included a status transition.
    pub status_change: Option<StatusChange>,
    /// Named workflow action (a transition that may loop on one status),
    /// when the sender supplies it.
    pub action: Option<String>,
}

impl WebhookEvent {
    /// Parse a Jira webhook delivery. The status change is extracted from
    /// the changelog; an explicit `transition.name` (sent by workflow
    /// post-function webhooks) becomes the action.
    pub fn from_json(payload: &Value) -> Result<Self> {
        let name = payload
            .get("webhookEvent")
            .and_then(Value::as_str)
            .unwrap_or("");
        let kind = match name {
            "jira:issue_created" => EventKind::IssueCreated,
            "jira:issue_updated" => EventKind::IssueUpdated,
            other => return Err(SmsError::UnknownWebhookEvent(other.to_string())),
        };
        let issue: Issue = serde_json::from_value(
            payload
                .get("issue")
                .cloned()
                .ok_or_else(|| SmsError::UnknownWebhookEvent("payload without issue".into()))?,
        )?;
        let status_change = payload
            .get("changelog")
            .and_then(|c| c.get("items"))
            .and_then(Value::as_array)
            .and_then(|items| {
                items
                    .iter()
                    .find(|item| item.get("field").and_then(Value::as_str) == Some("status"))
            })
            .map(|item| StatusChange {
                from: item
                    .get("fromString")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                to: item
                    .get("toString")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
            });
        let action = payload
            .get("transition")
            .and_then(|t| t.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self {
            kind,
            issue,
            status_change,
            action,
        })
    }
}

// ---------------------------------------------------------------------------
// Manifests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum IssueTypes {
    Any,
    Named(&'static [&'static str]),
    /// Matches issue type names starting with the prefix ("Process CRM",
    /// "Process HR", ...).
    Prefixed(&'static str),
    /// Union of other matchers, for handlers spanning named and prefixed
    /// types at once.
    AnyOf(&'static [IssueTypes]),
}

impl IssueTypes {
    pub fn matches(&self, issue_type: &str) -> bool {
        match self {
            IssueTypes::Any => true,
            IssueTypes::Named(names) => names.iter().any(|n| n.eq_ignore_ascii_case(issue_type)),
            IssueTypes::Prefixed(prefix) => issue_type.starts_with(prefix),
            IssueTypes::AnyOf(sets) => sets.iter().any(|s| s.matches(issue_type)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Trigger {
    /// Issue lifecycle events.
    Event {
        kinds: &'static [EventKind],
        issue_types: IssueTypes,
    },
    /// A workflow status change, matched on the from/to status names.
    Transition {
        issue_types: IssueTypes,
        from: &'static str,
        to: &'static str,
    },
    /// A named workflow action, for transitions that loop on one status.
    Action {
        issue_types: IssueTypes,
        name: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Manifest {
    pub name: &'static str,
    pub description: &'static str,
    pub trigger: Trigger,
}

impl Manifest {
    pub fn matches(&self, event: &WebhookEvent) -> bool {
        let issue_type = event.issue.issue_type();
        match &self.trigger {
            Trigger::Event { kinds, issue_types } => {
                kinds.contains(&event.kind) && issue_types.matches(issue_type)
            }
            Trigger::Transition {
                issue_types,
                from,
                to,
            } => {
                issue_types.matches(issue_type)
                    && event.status_change.as_ref().is_some_and(|change| {
                        change.from.eq_ignore_ascii_case(from)
                            && change.to.eq_ignore_ascii_case(to)
                    })
            }
            Trigger::Action { issue_types, name } => {
                issue_types.matches(issue_type)
                    && event
                        .action
                        .as_deref()
                        .is_some_and(|action| action.eq_ignore_ascii_case(name))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Context and outcomes
// ---------------------------------------------------------------------------

pub struct HandlerContext<'a> {
    pub jira: &'a JiraClient,
    pub confluence: Option<&'a ConfluenceClient>,
    pub fields: &'a FieldResolver,
    pub config: &'a SmsConfig,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done(String),
    Skipped(String),
}

pub fn done(message: impl Into<String>) -> Result<Outcome> {
    Ok(Outcome::Done(message.into()))
}

pub fn skipped(message: impl Into<String>) -> Result<Outcome> {
    Ok(Outcome::Skipped(message.into()))
}

pub type RunFn = fn(&HandlerContext, &WebhookEvent) -> Result<Outcome>;

#[derive(Clone, Copy)]
pub struct Handler {
    pub manifest: Manifest,
    pub run: RunFn,
}

pub fn all() -> Vec<Handler> {
    vec![
        measurement::auto_gather(),
        measurement::recorded(),
        process::configure(),
        review::init(),
        review::start_review(),
        review::review_done(),
        satisfaction::customer_init(),
        satisfaction::concluded(),
        artifact_page::create_policy_page(),
        artifact_page::create_procedure_page(),
        stakeholders::populate(),
    ]
}

pub fn find(name: &str) -> Result<Handler> {
    all()
        .into_iter()
        .find(|h| h.manifest.name == name)
        .ok_or_else(|| SmsError::HandlerNotFound(name.to_string()))
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub handler: &'static str,
    pub outcome: std::result::Result<Outcome, String>,
}

/// Run every handler whose manifest matches the event. Handler failures are
/// logged and reported, and never prevent the remaining handlers from
/// running.
pub fn dispatch(ctx: &HandlerContext, event: &WebhookEvent) -> Vec<DispatchReport> {
    if event.issue.is_test() {
        info!(issue = event.issue.key, "ignoring test issue");
        return Vec::new();
    }

    let mut reports = Vec::new();
    for handler in all() {
        if !handler.manifest.matches(event) {
            continue;
        }
        let name = handler.manifest.name;
        match (handler.run)(ctx, event) {
            Ok(outcome) => {
                match &outcome {
                    Outcome::Done(message) => {
                        info!(handler = name, issue = event.issue.key, message)
                    }
                    Outcome::Skipped(message) => {
                        info!(handler = name, issue = event.issue.key, message, "skipped")
                    }
                }
                reports.push(DispatchReport {
                    handler: name,
                    outcome: Ok(outcome),
                });
            }
            Err(err) => {
                error!(handler = name, issue = event.issue.key, %err, "handler failed");
                reports.push(DispatchReport {
                    handler: name,
                    outcome: Err(err.to_string()),
                });
            }
        }
    }
    reports
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
