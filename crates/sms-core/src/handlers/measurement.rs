//! Measurement lifecycle handlers.
//!
//! `auto-gather` runs when a Measurement ticket is created in status
//! Received: it resolves the linked KPI, runs the KPI's configured
//! measurement strategy, fills Target value / Measured value, and for
//! automatic strategies transitions the ticket to Validate or Measurement
//! failure. Manual and failed measurements are assigned to the KPI owner.
//!
//! `recorded` runs on Measurement updates: when the Measured value differs
//! from its backup it persists the backup and pushes the value and the
//! current timestamp to the linked KPI.

use crate::handlers::{done, skipped, Handler, HandlerContext, IssueTypes, Manifest, Outcome, Trigger, WebhookEvent};
use crate::jira::client::JIRA_DATETIME_FORMAT;
use crate::jira::fields::{changed, old_companion};
use crate::jira::links::{find_linked, LinkDirection};
use crate::measurement::{self, MeasurementOutcome};
use crate::error::{Result, SmsError};
use serde_json::json;
use tracing::warn;

pub const LINK_KPI_MEASUREMENT: &str = "KPI-Measurement";
pub const ISSUE_TYPE_KPI: &str = "Key Performance Indicator";

const FIELD_TARGET: &str = "Target";
const FIELD_TARGET_VALUE: &str = "Target value";
const FIELD_MEASURED_VALUE: &str = "Measured value";
const FIELD_KPI_OWNER: &str = "KPI owner";
const FIELD_LAST_MEASURED_VALUE: &str = "Last measured value";
const FIELD_LAST_MEASURED_ON: &str = "Last measured on";

const TRANSITION_VALIDATE: &str = "Validate";
const TRANSITION_FAILURE: &str = "Measurement failure";

pub fn auto_gather() -> Handler {
    Handler {
        manifest: Manifest {
            name: "measurement-auto-gather",
            description: "gather the value of a newly created measurement from its KPI's configuration",
            trigger: Trigger::Event {
                kinds: &[super::EventKind::IssueCreated],
                issue_types: IssueTypes::Named(&["Measurement"]),
            },
        },
        run: run_auto_gather,
    }
}

pub fn recorded() -> Handler {
    Handler {
        manifest: Manifest {
            name: "measurement-recorded",
            description: "push a recorded measurement value to the linked KPI",
            trigger: Trigger::Event {
                kinds: &[super::EventKind::IssueUpdated],
                issue_types: IssueTypes::Named(&["Measurement"]),
            },
        },
        run: run_recorded,
    }
}

fn run_auto_gather(ctx: &HandlerContext, event: &WebhookEvent) -> Result<Outcome> {
    let issue = &event.issue;
    if !issue.status_name().eq_ignore_ascii_case("Received") {
        return skipped("measurement is not new");
    }

    let Some(kpi_stub) = find_linked(
        &issue.key,
        &issue.fields.issuelinks,
        LINK_KPI_MEASUREMENT,
        LinkDirection::Inward,
        Some(ISSUE_TYPE_KPI),
    ) else {
        return skipped("not linked to a KPI");
    };
    let kpi = ctx.jira.get_issue(&kpi_stub.key)?;

    let outcome = measurement::gather(ctx.jira, ctx.fields, &kpi);
    let mut failed = outcome == MeasurementOutcome::Failed;
    let auto = outcome != MeasurementOutcome::Manual;

    let mut fields = serde_json::Map::new();
    if let Some(target) = ctx.fields.number_value(&kpi, FIELD_TARGET) {
        fields.insert(
            ctx.fields.require(FIELD_TARGET_VALUE)?.to_string(),
            json!(measurement::format_number(target)),
        );
    }
    if let MeasurementOutcome::Measured(value) = &outcome {
        fields.insert(
            ctx.fields.require(FIELD_MEASURED_VALUE)?.to_string(),
            json!(value),
        );
    }
    if !auto || failed {
        // Somebody has to take over; the KPI owner is the natural choice.
        if let Some(account_id) = ctx
            .fields
            .user_value(&kpi, FIELD_KPI_OWNER)
            .and_then(|u| u.account_id)
        {
            fields.insert("assignee".to_string(), json!({ "accountId": account_id }));
        }
    }

    if !fields.is_empty() {
        if let Err(err) = ctx
            .jira
            .update_issue_fields(&issue.key, serde_json::Value::Object(fields))
        {
            warn!(issue = issue.key, %err, "could not update measurement");
            if auto {
                failed = true;
            }
        }
    }

    if !auto {
        return done("manual measurement, assigned to KPI owner");
    }

    let transition = if failed { TRANSITION_FAILURE } else { TRANSITION_VALIDATE };
    match ctx.jira.transition_by_name(&issue.key, transition) {
        Ok(()) => done(format!("transitioned via {transition}")),
        Err(SmsError::TransitionNotAvailable { .. }) => {
            warn!(issue = issue.key, transition, "transition not available");
            skipped(format!("{transition} not available"))
        }
        Err(err) => Err(err),
    }
}

fn run_recorded(ctx: &HandlerContext, event: &WebhookEvent) -> Result<Outcome> {
    let issue = &event.issue;
    let current = ctx.fields.string_value(issue, FIELD_MEASURED_VALUE);
    let backup = ctx
        .fields
        .string_value(issue, &old_companion(FIELD_MEASURED_VALUE));
    if !changed(current.as_deref(), backup.as_deref()) {
        return skipped("measured value unchanged");
    }

    let Some(kpi) = find_linked(
        &issue.key,
        &issue.fields.issuelinks,
        LINK_KPI_MEASUREMENT,
        LinkDirection::Inward,
        Some(ISSUE_TYPE_KPI),
    ) else {
        return skipped("not linked to a KPI");
    };

    // The backup field is not on any screen.
    let backup_id = ctx
        .fields
        .require(&old_companion(FIELD_MEASURED_VALUE))?
        .to_string();
    if let Err(err) = ctx
        .jira
        .update_issue_fields_unscreened(&issue.key, json!({ backup_id: current }))
    {
        warn!(issue = issue.key, %err, "could not save measurement backup");
    }

    let mut kpi_fields = serde_json::Map::new();
    kpi_fields.insert(
        ctx.fields.require(FIELD_LAST_MEASURED_VALUE)?.to_string(),
        json!(current),
    );
    kpi_fields.insert(
        ctx.fields.require(FIELD_LAST_MEASURED_ON)?.to_string(),
        json!(ctx.now.format(JIRA_DATETIME_FORMAT).to_string()),
    );
    ctx.jira
        .update_issue_fields(&kpi.key, serde_json::Value::Object(kpi_fields))?;
    done(format!("recorded measurement on KPI {}", kpi.key))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
