//! Customer lifecycle validators.
//!
//! A customer's state is derived from its projects, reached over outward
//! "Customer-Project" links. The checks are pure predicates over the link
//! stubs; workflow conditions call them through the validator registry,
//! which also carries the satisfaction-review gate from `satisfaction`.

use crate::error::{Result, SmsError};
use crate::handlers::satisfaction;
use crate::jira::links::{find_all_linked, LinkDirection};
use crate::jira::models::Issue;

pub const LINK_CUSTOMER_PROJECT: &str = "Customer-Project";

/// Statuses a project may sit in while its customer is active.
const ACTIVE_TERMINAL: &[&str] = &["Canceled", "In Production", "Decommissioned"];
/// Statuses every project must have reached before the customer can be
/// deactivated.
const INACTIVE_TERMINAL: &[&str] = &["Canceled", "Decommissioned"];

const STATUS_IN_PRODUCTION: &str = "In Production";

fn project_statuses(issue: &Issue) -> Vec<String> {
    find_all_linked(
        &issue.key,
        &issue.fields.issuelinks,
        LINK_CUSTOMER_PROJECT,
        LinkDirection::Outward,
        None,
    )
    .into_iter()
    .map(|project| project.status_name().unwrap_or("").to_string())
    .collect()
}

/// A customer may be activated once every project has settled (canceled,
/// in production or already decommissioned) and at least one of them is
/// actually in production.
pub fn can_activate(issue: &Issue) -> bool {
    let statuses = project_statuses(issue);
    statuses
        .iter()
        .all(|status| ACTIVE_TERMINAL.iter().any(|t| t.eq_ignore_ascii_case(status)))
        && statuses
            .iter()
            .any(|status| status.eq_ignore_ascii_case(STATUS_IN_PRODUCTION))
}

/// A customer may be deactivated once no project is live anymore.
pub fn can_deactivate(issue: &Issue) -> bool {
    project_statuses(issue)
        .iter()
        .all(|status| INACTIVE_TERMINAL.iter().any(|t| t.eq_ignore_ascii_case(status)))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
pub struct Validator {
    pub name: &'static str,
    pub description: &'static str,
    pub check: fn(&Issue) -> bool,
}

pub fn all() -> Vec<Validator> {
    vec![
        Validator {
            name: "customer-can-activate",
            description: "all projects settled and at least one in production",
            check: can_activate,
        },
        Validator {
            name: "customer-can-deactivate",
            description: "no project is live anymore",
            check: can_deactivate,
        },
        Validator {
            name: "satisfaction-review-can-conclude",
            description: "every linked achievement is finalized",
            check: satisfaction::can_conclude,
        },
    ]
}

pub fn find(name: &str) -> Result<Validator> {
    all()
        .into_iter()
        .find(|v| v.name == name)
        .ok_or_else(|| SmsError::HandlerNotFound(name.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
