//! Jira group membership resolution and reconciliation.
//!
//! Process governance maps roles to groups (`crm-process-owner`,
//! `crm-process-manager`, per-service ops groups). When a role holder
//! changes on a Process ticket, the matching group is synced to the desired
//! membership: members not in the desired set are removed, desired members
//! not present are added. A failed add/remove is logged and counted but does
//! not roll back previously applied changes and does not abort the rest of
//! the sync.

use crate::error::Result;
use crate::jira::client::JiraClient;
use crate::jira::models::User;
use std::collections::BTreeSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.failed.is_empty()
    }
}

/// Active members of a group, resolved via the two-step picker + member-list
/// sequence.
pub fn group_members(client: &JiraClient, group_name: &str) -> Result<Vec<User>> {
    // The picker call validates that the group exists under exactly this name.
    client.find_group_id(group_name)?;
    client.group_members(group_name, false)
}

/// Sync `group_name` to exactly `desired` account ids.
pub fn reconcile(
    client: &JiraClient,
    group_name: &str,
    desired: &[String],
) -> Result<ReconcileReport> {
    let group_id = client.find_group_id(group_name)?;
    let current = client.group_members(group_name, true)?;

    let desired_set: BTreeSet<&str> = desired.iter().map(String::as_str).collect();
    let current_set: BTreeSet<&str> = current
        .iter()
        .filter_map(|m| m.account_id.as_deref())
        .collect();

    let mut report = ReconcileReport::default();

    for account_id in current_set.difference(&desired_set) {
        match client.remove_user_from_group(&group_id, account_id) {
            Ok(()) => {
                info!(group = group_name, account_id, "removed group member");
                report.removed.push(account_id.to_string());
            }
            Err(err) => {
                warn!(group = group_name, account_id, %err, "could not remove group member");
                report.failed.push(account_id.to_string());
            }
        }
    }

    for account_id in desired_set.difference(&current_set) {
        match client.add_user_to_group(&group_id, account_id) {
            Ok(()) => {
                info!(group = group_name, account_id, "added group member");
                report.added.push(account_id.to_string());
            }
            Err(err) => {
                warn!(group = group_name, account_id, %err, "could not add group member");
                report.failed.push(account_id.to_string());
            }
        }
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
