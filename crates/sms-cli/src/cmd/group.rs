use crate::output::{print_json, print_table};
use clap::Subcommand;
use serde_json::json;
use sms_core::config::SmsConfig;
use sms_core::jira::groups;
use std::path::Path;

#[derive(Subcommand)]
pub enum GroupSubcommand {
    /// List the active members of a group
    Members {
        /// Group name, e.g. crm-process-owner
        name: String,
    },

    /// Make a group's membership exactly the given account ids
    Reconcile {
        /// Group name
        name: String,
        /// Desired member account ids (empty to clear the group)
        users: Vec<String>,
    },
}

pub fn run(config_path: &Path, subcmd: GroupSubcommand, json: bool) -> anyhow::Result<()> {
    let config = SmsConfig::load(config_path)?;
    let jira = config.jira_client()?;
    match subcmd {
        GroupSubcommand::Members { name } => {
            let members = groups::group_members(&jira, &name)?;
            if json {
                print_json(&members)?;
            } else {
                let rows = members
                    .iter()
                    .map(|user| {
                        vec![
                            user.account_id.clone().unwrap_or_default(),
                            user.display_name.clone().unwrap_or_default(),
                        ]
                    })
                    .collect();
                print_table(&["ACCOUNT ID", "NAME"], rows);
            }
            Ok(())
        }
        GroupSubcommand::Reconcile { name, users } => {
            let report = groups::reconcile(&jira, &name, &users)?;
            if json {
                print_json(&json!({
                    "added": report.added,
                    "removed": report.removed,
                    "failed": report.failed,
                }))?;
            } else if report.is_noop() {
                println!("nothing to do");
            } else {
                println!(
                    "added {}, removed {}, failed {}",
                    report.added.len(),
                    report.removed.len(),
                    report.failed.len()
                );
            }
            Ok(())
        }
    }
}
