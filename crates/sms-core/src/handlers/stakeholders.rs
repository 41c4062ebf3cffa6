//! Stakeholder population on operational tickets.
//!
//! Tickets that concern a service (meetings, changes, incidents, reports,
//! ...) should notify the ops group responsible for that service. The
//! handler maps the ticket's Service/Services selection (or its procurement
//! lots when no service is named) to configured ops groups, pulls the group
//! members and merges them into the Stakeholders field. Operational issue
//! types additionally pull in the QA group. `… old` companion fields record
//! the selection the stakeholders were computed from, so reopening the
//! ticket without changing the selection does not touch a hand-edited
//! stakeholder list.

use crate::config::StakeholderConfig;
use crate::error::Result;
use crate::handlers::{
    done, skipped, EventKind, Handler, HandlerContext, IssueTypes, Manifest, Outcome, Trigger,
    WebhookEvent,
};
use crate::jira::fields::{changed, old_companion};
use crate::jira::groups;
use serde_json::json;
use std::collections::BTreeSet;
use tracing::warn;

const FIELD_SERVICE: &str = "Service";
const FIELD_SERVICES: &str = "Services";
const FIELD_PROCUREMENT_LOT: &str = "Procurement lot";
const FIELD_STAKEHOLDERS: &str = "Stakeholders";

/// Lot selections that name the contract itself rather than a service.
const NON_SERVICE_LOTS: &[&str] = &["EC"];

const STAKEHOLDER_TYPES: IssueTypes = IssueTypes::Named(&[
    "Meeting",
    "Deliverable",
    "Report",
    "Change",
    "Problem",
    "Known Error",
    "Risk",
    "Vulnerability",
    "Improvement Suggestion",
    "Handover",
    "Task",
    "Software Update",
    "Managed Software Update",
    "Infrastructure Software Update",
    "Issue",
    "Incident",
    "Data Protection Incident",
    "Security Incident",
    "Restore",
    "Disaster",
]);

pub fn populate() -> Handler {
    Handler {
        manifest: Manifest {
            name: "populate-stakeholders",
            description: "fill stakeholders from the service ops groups",
            trigger: Trigger::Event {
                kinds: &[EventKind::IssueCreated, EventKind::IssueUpdated],
                issue_types: STAKEHOLDER_TYPES,
            },
        },
        run: run_populate,
    }
}

/// Ops groups responsible for the ticket's selection. Unknown services fall
/// back to the catch-all group rather than silently notifying nobody.
pub fn desired_groups(
    config: &StakeholderConfig,
    issue_type: &str,
    service: Option<&str>,
    services: &[String],
    lots: &[String],
) -> BTreeSet<String> {
    let mut names: Vec<&str> = Vec::new();
    if let Some(service) = service {
        names.push(service);
    }
    names.extend(services.iter().map(String::as_str));
    if names.is_empty() {
        names.extend(
            lots.iter()
                .map(String::as_str)
                .filter(|lot| !NON_SERVICE_LOTS.contains(lot)),
        );
    }

    let mut groups = BTreeSet::new();
    if names.is_empty() {
        groups.insert(config.fallback_group.clone());
    } else {
        for name in names {
            match config.group_for_service(name) {
                Some(group) => {
                    groups.insert(group.to_string());
                }
                None => {
                    warn!(service = name, "no ops group mapped, using fallback");
                    groups.insert(config.fallback_group.clone());
                }
            }
        }
    }
    if config.is_qa_issue_type(issue_type) {
        groups.insert(config.qa_group.clone());
    }
    groups
}

fn run_populate(ctx: &HandlerContext, event: &WebhookEvent) -> Result<Outcome> {
    let issue = &event.issue;

    let service = ctx.fields.option_value(issue, FIELD_SERVICE);
    let services = ctx.fields.option_values(issue, FIELD_SERVICES);
    let lots = ctx.fields.option_values(issue, FIELD_PROCUREMENT_LOT);

    let service_now = service.clone().unwrap_or_default();
    let services_now = services.join(", ");
    let lots_now = lots.join(", ");

    let service_old = ctx.fields.string_value(issue, &old_companion(FIELD_SERVICE));
    let services_old = ctx
        .fields
        .string_value(issue, &old_companion(FIELD_SERVICES));
    let lots_old = ctx
        .fields
        .string_value(issue, &old_companion(FIELD_PROCUREMENT_LOT));

    let selection_changed = changed(Some(&service_now), service_old.as_deref())
        || changed(Some(&services_now), services_old.as_deref())
        || changed(Some(&lots_now), lots_old.as_deref());

    let existing: BTreeSet<String> = ctx
        .fields
        .users_value(issue, FIELD_STAKEHOLDERS)
        .into_iter()
        .filter_map(|u| u.account_id)
        .collect();
    // A hand-edited list is only recomputed when the selection moved.
    if !existing.is_empty() && !selection_changed {
        return skipped("selection unchanged, keeping stakeholders");
    }

    let wanted_groups = desired_groups(
        &ctx.config.stakeholders,
        issue.issue_type(),
        service.as_deref(),
        &services,
        &lots,
    );

    let mut account_ids = existing;
    for group in &wanted_groups {
        match groups::group_members(ctx.jira, group) {
            Ok(members) => account_ids.extend(members.into_iter().filter_map(|u| u.account_id)),
            Err(err) => warn!(group, %err, "could not read ops group"),
        }
    }
    if account_ids.is_empty() {
        return skipped("no stakeholders resolved");
    }

    let stakeholders: Vec<_> = account_ids
        .iter()
        .map(|id| json!({ "accountId": id }))
        .collect();
    let mut fields = serde_json::Map::new();
    fields.insert(
        ctx.fields.require(FIELD_STAKEHOLDERS)?.to_string(),
        json!(stakeholders),
    );
    fields.insert(
        ctx.fields.require(&old_companion(FIELD_SERVICE))?.to_string(),
        json!(service_now),
    );
    fields.insert(
        ctx.fields
            .require(&old_companion(FIELD_SERVICES))?
            .to_string(),
        json!(services_now),
    );
    fields.insert(
        ctx.fields
            .require(&old_companion(FIELD_PROCUREMENT_LOT))?
            .to_string(),
        json!(lots_now),
    );
    ctx.jira
        .update_issue_fields_unscreened(&issue.key, serde_json::Value::Object(fields))?;

    done(format!(
        "stakeholders filled from {}",
        wanted_groups.into_iter().collect::<Vec<_>>().join(", ")
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
