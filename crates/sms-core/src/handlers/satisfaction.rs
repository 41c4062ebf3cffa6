//! Customer satisfaction review lifecycle.
//!
//! Customers in the CRM project are reviewed on a cadence of their own,
//! separate from the policy/procedure/process review cycle:
//!   - `customer_init` stamps a new Customer with the satisfaction review
//!     frequency configured on the CRM process ticket.
//!   - the `due-satisfaction-reviews` job (in `jobs::reviews`) fires the
//!     "Start customer satisfaction review" loop transition when the
//!     customer's next-review date has passed.
//!   - `concluded` comments on the customer once its review is finished.
//!   - `can_conclude` is the workflow validator gating that last
//!     transition: every achievement recorded during the review must be
//!     finalized first.

use crate::adf::{AdfDoc, AdfText};
use crate::error::Result;
use crate::handlers::{
    done, skipped, EventKind, Handler, HandlerContext, IssueTypes, Manifest, Outcome, Trigger,
    WebhookEvent,
};
use crate::handlers::review::LINK_REVIEW;
use crate::jira::links::{find_linked, LinkDirection};
use crate::jira::models::Issue;
use serde_json::json;
use tracing::warn;

pub const LINK_ACHIEVEMENT: &str = "Achievement";

pub const FIELD_SATISFACTION_FREQUENCY: &str = "Customer satisfaction review frequency";

const SATISFACTION_REVIEW_TYPES: IssueTypes =
    IssueTypes::Named(&["Customer Satisfaction Review"]);

// ---------------------------------------------------------------------------
// customer-init
// ---------------------------------------------------------------------------

pub fn customer_init() -> Handler {
    Handler {
        manifest: Manifest {
            name: "customer-init",
            description: "stamp new customers with the CRM satisfaction review frequency",
            trigger: Trigger::Event {
                kinds: &[EventKind::IssueCreated],
                issue_types: IssueTypes::Named(&["Customer"]),
            },
        },
        run: run_customer_init,
    }
}

/// The review cadence lives on the CRM process ticket; copying it onto the
/// customer lets the due-review JQL select customers directly.
fn run_customer_init(ctx: &HandlerContext, event: &WebhookEvent) -> Result<Outcome> {
    let issue = &event.issue;
    let frequency_id = ctx.fields.require(FIELD_SATISFACTION_FREQUENCY)?;

    let page = ctx.jira.search_jql(
        r#"project = SMS and issuetype = "Process CRM""#,
        &[frequency_id],
        1,
        None,
    )?;
    let Some(process) = page.issues.first() else {
        return skipped("no CRM process ticket found");
    };
    let Some(frequency) = ctx.fields.option_value(process, FIELD_SATISFACTION_FREQUENCY) else {
        return skipped(format!(
            "{} carries no satisfaction review frequency",
            process.key
        ));
    };

    let mut fields = serde_json::Map::new();
    fields.insert(frequency_id.to_string(), json!({ "value": frequency }));
    ctx.jira
        .update_issue_fields_unscreened(&issue.key, serde_json::Value::Object(fields))?;
    done(format!("review frequency {frequency} taken from {}", process.key))
}

// ---------------------------------------------------------------------------
// satisfaction-review-concluded
// ---------------------------------------------------------------------------

pub fn concluded() -> Handler {
    Handler {
        manifest: Manifest {
            name: "satisfaction-review-concluded",
            description: "notify the customer when its satisfaction review finishes",
            trigger: Trigger::Transition {
                issue_types: SATISFACTION_REVIEW_TYPES,
                from: "In Progress",
                to: "Done",
            },
        },
        run: run_concluded,
    }
}

fn run_concluded(ctx: &HandlerContext, event: &WebhookEvent) -> Result<Outcome> {
    let issue = &event.issue;
    let Some(customer) = find_linked(
        &issue.key,
        &issue.fields.issuelinks,
        LINK_REVIEW,
        LinkDirection::Inward,
        Some("Customer"),
    ) else {
        warn!(issue = issue.key, "satisfaction review not linked to a customer");
        return skipped("no customer linked");
    };

    let comment = AdfDoc::new().paragraph([
        AdfText::plain("Customer satisfaction review "),
        AdfText::link(
            issue.key.as_str(),
            format!("{}/browse/{}", ctx.jira.base_url(), issue.key),
        ),
        AdfText::plain(" has been concluded."),
    ]);
    ctx.jira.add_comment(&customer.key, comment)?;
    done(format!("customer {} notified", customer.key))
}

// ---------------------------------------------------------------------------
// conclude validator
// ---------------------------------------------------------------------------

/// A satisfaction review may only be concluded once every achievement
/// recorded during it has been finalized. A linked achievement without a
/// status on its stub counts as unfinished.
pub fn can_conclude(issue: &Issue) -> bool {
    issue
        .fields
        .issuelinks
        .iter()
        .filter(|link| link.link_type.name.eq_ignore_ascii_case(LINK_ACHIEVEMENT))
        .filter_map(|link| link.outward_issue.as_ref())
        .all(|achievement| {
            achievement
                .status_name()
                .is_some_and(|status| status.eq_ignore_ascii_case("Done"))
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
