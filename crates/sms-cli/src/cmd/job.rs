use crate::output::{outcome_cells, print_json, print_table};
use clap::Subcommand;
use serde_json::json;
use sms_core::config::SmsConfig;
use sms_core::jobs;
use sms_server::state::with_context;
use std::path::Path;

#[derive(Subcommand)]
pub enum JobSubcommand {
    /// Show the job table with effective schedules
    List,

    /// Run one job sweep now
    Run {
        /// Job name, e.g. due-reviews
        name: String,
    },
}

pub fn run(config_path: &Path, subcmd: JobSubcommand, json: bool) -> anyhow::Result<()> {
    let config = SmsConfig::load(config_path)?;
    match subcmd {
        JobSubcommand::List => {
            if json {
                let jobs: Vec<_> = jobs::all()
                    .iter()
                    .map(|job| {
                        json!({
                            "name": job.name,
                            "description": job.description,
                            "schedule": jobs::schedule_for(job, &config),
                            "jql": job.jql,
                        })
                    })
                    .collect();
                print_json(&jobs)?;
            } else {
                let rows = jobs::all()
                    .iter()
                    .map(|job| {
                        vec![
                            job.name.to_string(),
                            jobs::schedule_for(job, &config).to_string(),
                            job.description.to_string(),
                        ]
                    })
                    .collect();
                print_table(&["NAME", "SCHEDULE", "DESCRIPTION"], rows);
            }
            Ok(())
        }
        JobSubcommand::Run { name } => {
            let job = jobs::find(&name)?;
            let report = with_context(&config, |ctx| jobs::run_job(ctx, &job))?;
            if json {
                let issues: Vec<_> = report
                    .issues
                    .iter()
                    .map(|issue| {
                        let (status, message) = outcome_cells(&issue.outcome);
                        json!({ "key": issue.key, "status": status, "message": message })
                    })
                    .collect();
                print_json(&json!({
                    "job": report.job,
                    "processed": report.issues.len(),
                    "failed": report.failed(),
                    "issues": issues,
                }))?;
            } else {
                let rows = report
                    .issues
                    .iter()
                    .map(|issue| {
                        let (status, message) = outcome_cells(&issue.outcome);
                        vec![issue.key.clone(), status, message]
                    })
                    .collect();
                print_table(&["ISSUE", "STATUS", "MESSAGE"], rows);
                println!(
                    "{} issues, {} failed",
                    report.issues.len(),
                    report.failed()
                );
            }
            Ok(())
        }
    }
}
