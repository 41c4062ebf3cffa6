//! KPI housekeeping jobs.
//!
//! `kpi-measurements` runs hourly and creates the next Measurement ticket
//! for every KPI whose "Next measurement" has passed, then advances (or
//! clears) that date. `kpi-escalation` watches KPIs stuck at the process
//! owner and pushes them up to the SMS owner once the escalation window
//! configured on the SMS process ticket has elapsed.

use crate::error::{Result, SmsError};
use crate::handlers::measurement::{ISSUE_TYPE_KPI, LINK_KPI_MEASUREMENT};
use crate::handlers::{done, skipped, HandlerContext, Outcome};
use crate::jira::client::JIRA_DATETIME_FORMAT;
use crate::jira::models::Issue;
use crate::jobs::Job;
use crate::schedule::{escalation_due, EscalationUnit, Frequency};
use serde_json::json;
use tracing::warn;

const FIELD_NEXT_MEASUREMENT: &str = "Next measurement";
const FIELD_MEASUREMENT_FREQUENCY: &str = "Measurement frequency";
const FIELD_ESCALATED_ON: &str = "Escalated on";
const FIELD_ESCALATE_AFTER: &str = "Escalate KPI to SMS owner after";
const FIELD_ESCALATE_UNITS: &str = "Escalate KPI units";

const TRANSITION_ESCALATE_SMS: &str = "Escalate to SMS owner";

const SMS_PROCESS_JQL: &str = r#"project = SMS and issuetype = "Process SMS""#;

// ---------------------------------------------------------------------------
// kpi-measurements
// ---------------------------------------------------------------------------

pub fn measurements() -> Job {
    Job {
        name: "kpi-measurements",
        description: "create due Measurement tickets and advance the schedule",
        schedule: "0 0 * * * *",
        jql: r#"issuetype = "Key Performance Indicator" and status in (Active, "Escalated to Process Owner", "Escalated to SMS Owner") and "Next measurement" < now()"#,
        run: run_measurements,
    }
}

fn run_measurements(ctx: &HandlerContext, kpi: &Issue) -> Result<Outcome> {
    let Some(project) = kpi.project_key() else {
        return skipped("no project on KPI");
    };

    let body = json!({
        "fields": {
            "project": { "key": project },
            "issuetype": { "name": "Measurement" },
            "summary": format!("{} at {}", kpi.summary(), ctx.now.format("%Y.%m.%d")),
        },
        "update": {
            "issuelinks": [{
                "add": {
                    "type": { "name": LINK_KPI_MEASUREMENT },
                    "inwardIssue": { "key": kpi.key }
                }
            }]
        }
    });
    let created = ctx.jira.create_issue(&body)?;

    // Advance the schedule from the stored date, not from now, so a stalled
    // job catches up instead of drifting. A missing or unknown frequency
    // clears the date and thereby stops the loop.
    let frequency = ctx
        .fields
        .option_value(kpi, FIELD_MEASUREMENT_FREQUENCY)
        .and_then(|v| Frequency::parse(&v));
    let next = match frequency {
        Some(frequency) => {
            let from = ctx
                .fields
                .datetime_value(kpi, FIELD_NEXT_MEASUREMENT)
                .unwrap_or(ctx.now);
            json!(frequency
                .next_datetime(from)
                .format(JIRA_DATETIME_FORMAT)
                .to_string())
        }
        None => {
            warn!(issue = kpi.key, "no measurement frequency, clearing schedule");
            serde_json::Value::Null
        }
    };
    let mut fields = serde_json::Map::new();
    fields.insert(ctx.fields.require(FIELD_NEXT_MEASUREMENT)?.to_string(), next);
    ctx.jira
        .update_issue_fields(&kpi.key, serde_json::Value::Object(fields))?;

    done(format!("created {}", created.key))
}

// ---------------------------------------------------------------------------
// kpi-escalation
// ---------------------------------------------------------------------------

pub fn escalation() -> Job {
    Job {
        name: "kpi-escalation",
        description: "escalate KPIs the process owner has sat on for too long",
        schedule: "0 30 * * * *",
        jql: r#"issuetype = "Key Performance Indicator" and status = "Escalated to Process Owner" and "Escalated on" is not empty"#,
        run: run_escalation,
    }
}

fn run_escalation(ctx: &HandlerContext, kpi: &Issue) -> Result<Outcome> {
    let Some(escalated_on) = ctx.fields.datetime_value(kpi, FIELD_ESCALATED_ON) else {
        return skipped("no escalation timestamp");
    };

    // The window lives on the SMS process ticket.
    let page = ctx.jira.search_jql(SMS_PROCESS_JQL, &[], 1, None)?;
    let Some(sms_process) = page.issues.first() else {
        return skipped("no SMS process ticket found");
    };
    let Some(amount) = ctx.fields.number_value(sms_process, FIELD_ESCALATE_AFTER) else {
        return skipped("no escalation window configured");
    };
    let Some(unit) = ctx
        .fields
        .option_value(sms_process, FIELD_ESCALATE_UNITS)
        .and_then(|v| EscalationUnit::parse(&v))
    else {
        return skipped("no escalation unit configured");
    };

    if !escalation_due(escalated_on, amount as i64, unit, ctx.now) {
        return skipped("escalation window still open");
    }
    match ctx.jira.transition_by_name(&kpi.key, TRANSITION_ESCALATE_SMS) {
        Ok(()) => done("escalated to SMS owner"),
        Err(SmsError::TransitionNotAvailable { .. }) => {
            warn!(issue = kpi.key, "escalation transition not available");
            skipped("transition not available")
        }
        Err(err) => Err(err),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
