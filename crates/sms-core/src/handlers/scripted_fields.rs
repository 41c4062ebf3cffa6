//! Computed display values derived from an issue's link graph.
//!
//! These back read-only fields on customer-facing screens. A computed value
//! never fails loudly: on a wrong issue type, a missing link or a fetch
//! error the field renders its empty default instead.

use crate::handlers::customer::LINK_CUSTOMER_PROJECT;
use crate::handlers::process;
use crate::handlers::review::LINK_REVIEW;
use crate::handlers::satisfaction::LINK_ACHIEVEMENT;
use crate::handlers::HandlerContext;
use crate::jira::links::{find_all_linked, find_linked, LinkDirection};
use crate::jira::models::Issue;
use serde_json::{json, Value};
use tracing::warn;

const LINK_COMPLAINT: &str = "Complaint";
const LINK_CONTACT: &str = "Contact";
const LINK_RELATES: &str = "Relates";
const LINK_USE_CASE: &str = "Use Case";

const FIELD_CUSTOMER_NAME: &str = "Customer name";
const FIELD_PROJECT_NAME: &str = "Project name";

/// Long name of the process a process ticket stands for.
fn process_name(_ctx: &HandlerContext, issue: &Issue) -> Value {
    if !issue.issue_type().starts_with("Process ") {
        return json!("");
    }
    json!(process::process_name(issue))
}

/// The customer a complaint was raised by, shown as the customer ticket's
/// summary. Complaints link inward to their customer.
fn complaint_customer(ctx: &HandlerContext, issue: &Issue) -> Value {
    if !issue.issue_type().eq_ignore_ascii_case("Complaint") {
        return json!("");
    }
    let Some(customer) = find_linked(
        &issue.key,
        &issue.fields.issuelinks,
        LINK_COMPLAINT,
        LinkDirection::Inward,
        Some("Customer"),
    ) else {
        return json!("");
    };
    // The link stub has no summary, so the customer is fetched.
    match ctx.jira.get_issue(&customer.key) {
        Ok(full) => json!(full.summary()),
        Err(err) => {
            warn!(issue = issue.key, customer = customer.key, %err, "could not fetch customer");
            json!("")
        }
    }
}

/// How many projects a customer has, counted over its project links.
fn customer_projects(_ctx: &HandlerContext, issue: &Issue) -> Value {
    if !issue.issue_type().eq_ignore_ascii_case("Customer") {
        return json!(0);
    }
    let count = find_all_linked(
        &issue.key,
        &issue.fields.issuelinks,
        LINK_CUSTOMER_PROJECT,
        LinkDirection::Outward,
        None,
    )
    .len();
    json!(count)
}

/// The customer an achievement was recorded for, two hops away: over the
/// achievement's satisfaction review and on to the review's customer.
fn achievement_customer(ctx: &HandlerContext, issue: &Issue) -> Value {
    if !issue.issue_type().eq_ignore_ascii_case("Achievement") {
        return json!("");
    }
    let Some(review) = find_linked(
        &issue.key,
        &issue.fields.issuelinks,
        LINK_ACHIEVEMENT,
        LinkDirection::Inward,
        None,
    ) else {
        return json!("");
    };
    // The stub carries no links of its own, so the review is fetched.
    let review = match ctx.jira.get_issue(&review.key) {
        Ok(full) => full,
        Err(err) => {
            warn!(issue = issue.key, review = review.key, %err, "could not fetch review");
            return json!("");
        }
    };
    let Some(customer) = find_linked(
        &review.key,
        &review.fields.issuelinks,
        LINK_REVIEW,
        LinkDirection::Inward,
        Some("Customer"),
    ) else {
        return json!("");
    };
    json!(customer.key)
}

/// The achievement a scientific publication mentions: the first "Relates"
/// neighbor (either direction) that turns out to be an Achievement ticket.
fn publication_achievement(ctx: &HandlerContext, issue: &Issue) -> Value {
    if !issue.issue_type().eq_ignore_ascii_case("Publication") {
        return json!("");
    }
    for direction in [LinkDirection::Inward, LinkDirection::Outward] {
        for target in find_all_linked(
            &issue.key,
            &issue.fields.issuelinks,
            LINK_RELATES,
            direction,
            None,
        ) {
            match ctx.jira.get_issue(&target.key) {
                Ok(full) if full.issue_type().eq_ignore_ascii_case("Achievement") => {
                    return json!(full.key);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(issue = issue.key, target = target.key, %err, "could not fetch neighbor");
                }
            }
        }
    }
    json!("")
}

/// The customers a contact represents, one ticket key per line.
fn contact_customers(_ctx: &HandlerContext, issue: &Issue) -> Value {
    if !issue.issue_type().eq_ignore_ascii_case("Contact") {
        return json!("");
    }
    let keys: Vec<&str> = find_all_linked(
        &issue.key,
        &issue.fields.issuelinks,
        LINK_CONTACT,
        LinkDirection::Inward,
        None,
    )
    .into_iter()
    .map(|customer| customer.key.as_str())
    .collect();
    json!(keys.join("\n"))
}

/// The customer name behind a satisfaction review, read from the customer
/// ticket's "Customer name" field.
fn satisfaction_review_customer(ctx: &HandlerContext, issue: &Issue) -> Value {
    if !issue.issue_type().eq_ignore_ascii_case("Customer Satisfaction Review") {
        return json!("");
    }
    let Some(customer) = find_linked(
        &issue.key,
        &issue.fields.issuelinks,
        LINK_REVIEW,
        LinkDirection::Inward,
        Some("Customer"),
    ) else {
        return json!("");
    };
    let customer = match ctx.jira.get_issue(&customer.key) {
        Ok(full) => full,
        Err(err) => {
            warn!(issue = issue.key, customer = customer.key, %err, "could not fetch customer");
            return json!("");
        }
    };
    json!(ctx
        .fields
        .string_value(&customer, FIELD_CUSTOMER_NAME)
        .unwrap_or_default())
}

/// The projects implementing a use case, as a comma-separated list of their
/// "Project name" values.
fn use_case_projects(ctx: &HandlerContext, issue: &Issue) -> Value {
    if !issue.issue_type().eq_ignore_ascii_case("Use Case") {
        return json!("");
    }
    let mut names = Vec::new();
    for project in find_all_linked(
        &issue.key,
        &issue.fields.issuelinks,
        LINK_USE_CASE,
        LinkDirection::Inward,
        None,
    ) {
        let full = match ctx.jira.get_issue(&project.key) {
            Ok(full) => full,
            Err(err) => {
                warn!(issue = issue.key, project = project.key, %err, "could not fetch project");
                continue;
            }
        };
        if let Some(name) = ctx.fields.string_value(&full, FIELD_PROJECT_NAME) {
            names.push(name);
        }
    }
    json!(names.join(", "))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
pub struct ScriptedField {
    pub name: &'static str,
    pub description: &'static str,
    pub issue_type: &'static str,
    pub compute: fn(&HandlerContext, &Issue) -> Value,
}

pub fn all() -> Vec<ScriptedField> {
    vec![
        ScriptedField {
            name: "process-name",
            description: "long name of the process behind a process ticket",
            issue_type: "Process",
            compute: process_name,
        },
        ScriptedField {
            name: "complaint-customer",
            description: "summary of the customer a complaint belongs to",
            issue_type: "Complaint",
            compute: complaint_customer,
        },
        ScriptedField {
            name: "customer-projects",
            description: "number of projects linked to a customer",
            issue_type: "Customer",
            compute: customer_projects,
        },
        ScriptedField {
            name: "achievement-customer",
            description: "customer behind the satisfaction review an achievement belongs to",
            issue_type: "Achievement",
            compute: achievement_customer,
        },
        ScriptedField {
            name: "publication-achievement",
            description: "achievement a scientific publication mentions",
            issue_type: "Publication",
            compute: publication_achievement,
        },
        ScriptedField {
            name: "contact-customers",
            description: "customers represented by a contact",
            issue_type: "Contact",
            compute: contact_customers,
        },
        ScriptedField {
            name: "satisfaction-review-customer",
            description: "name of the customer a satisfaction review is about",
            issue_type: "Customer Satisfaction Review",
            compute: satisfaction_review_customer,
        },
        ScriptedField {
            name: "use-case-projects",
            description: "projects implementing a use case",
            issue_type: "Use Case",
            compute: use_case_projects,
        },
    ]
}

pub fn find(name: &str) -> Option<ScriptedField> {
    all().into_iter().find(|f| f.name == name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
