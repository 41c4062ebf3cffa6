//! Kicking off due reviews.
//!
//! Policies, procedures and processes carry a "Next review" date. The daily
//! sweep fires the "Start review" transition on everything whose date has
//! passed (the transition handler then creates the review ticket) and
//! advances the date by the configured review frequency. Customers run the
//! same loop on their own cadence field and transition.

use crate::error::{Result, SmsError};
use crate::handlers::satisfaction::FIELD_SATISFACTION_FREQUENCY;
use crate::handlers::{done, skipped, HandlerContext, Outcome};
use crate::jira::client::JIRA_DATE_FORMAT;
use crate::jira::models::Issue;
use crate::jobs::Job;
use crate::schedule::Frequency;
use serde_json::json;
use tracing::warn;

const FIELD_NEXT_REVIEW: &str = "Next review";
const FIELD_REVIEW_FREQUENCY: &str = "Review frequency";

const TRANSITION_START_REVIEW: &str = "Start review";
const TRANSITION_START_SATISFACTION: &str = "Start customer satisfaction review";

pub fn due_reviews() -> Job {
    Job {
        name: "due-reviews",
        description: "start reviews whose next-review date has passed",
        schedule: "0 0 5 * * *",
        jql: r#"status = Active and "Next review" < now()"#,
        run: run_due_reviews,
    }
}

pub fn due_satisfaction_reviews() -> Job {
    Job {
        name: "due-satisfaction-reviews",
        description: "start customer satisfaction reviews whose next-review date has passed",
        schedule: "0 30 5 * * *",
        jql: r#"issuetype = Customer and status = Active and "Customer satisfaction review frequency" is not EMPTY and "Next review" < now()"#,
        run: run_due_satisfaction_reviews,
    }
}

fn run_due_reviews(ctx: &HandlerContext, issue: &Issue) -> Result<Outcome> {
    start_and_reschedule(ctx, issue, TRANSITION_START_REVIEW, FIELD_REVIEW_FREQUENCY)
}

fn run_due_satisfaction_reviews(ctx: &HandlerContext, issue: &Issue) -> Result<Outcome> {
    start_and_reschedule(
        ctx,
        issue,
        TRANSITION_START_SATISFACTION,
        FIELD_SATISFACTION_FREQUENCY,
    )
}

/// Fire the start transition and advance "Next review" by the cadence in
/// `frequency_field`. Advancing starts from the stored date so late sweeps
/// do not shift the cadence; without a frequency the date is cleared and
/// the entity drops out of the sweep.
fn start_and_reschedule(
    ctx: &HandlerContext,
    issue: &Issue,
    transition: &str,
    frequency_field: &str,
) -> Result<Outcome> {
    match ctx.jira.transition_by_name(&issue.key, transition) {
        Ok(()) => {}
        Err(SmsError::TransitionNotAvailable { .. }) => {
            warn!(issue = issue.key, transition, "start transition not available");
            return skipped("transition not available");
        }
        Err(err) => return Err(err),
    }

    let frequency = ctx
        .fields
        .option_value(issue, frequency_field)
        .and_then(|v| Frequency::parse(&v));
    let next = match frequency {
        Some(frequency) => {
            let from = ctx
                .fields
                .date_value(issue, FIELD_NEXT_REVIEW)
                .unwrap_or_else(|| ctx.now.date_naive());
            json!(frequency.next_date(from).format(JIRA_DATE_FORMAT).to_string())
        }
        None => {
            warn!(issue = issue.key, "no review frequency, clearing next review");
            serde_json::Value::Null
        }
    };
    let mut fields = serde_json::Map::new();
    fields.insert(ctx.fields.require(FIELD_NEXT_REVIEW)?.to_string(), next);
    ctx.jira
        .update_issue_fields(&issue.key, serde_json::Value::Object(fields))?;

    done("review started")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
