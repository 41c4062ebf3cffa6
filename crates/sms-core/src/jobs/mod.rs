//! Scheduled jobs.
//!
//! A job pairs a JQL selection with a per-issue action and a default cron
//! schedule (overridable in `scheduler.schedules`). The runner walks every
//! matching issue; a failure on one issue is recorded and never stops the
//! sweep. Test issues are skipped like everywhere else.
//!
//! Layout:
//! - `kpi`     — measurement creation and owner-level escalation
//! - `reviews` — kicking off due policy/procedure/process and customer
//!   satisfaction reviews

pub mod kpi;
pub mod reviews;

use crate::config::SmsConfig;
use crate::error::{Result, SmsError};
use crate::handlers::{HandlerContext, Outcome};
use crate::jira::models::Issue;
use tracing::{error, info};

pub type JobFn = fn(&HandlerContext, &Issue) -> Result<Outcome>;

#[derive(Clone, Copy)]
pub struct Job {
    pub name: &'static str,
    pub description: &'static str,
    /// Default cron schedule (seconds granularity, UTC).
    pub schedule: &'static str,
    /// Selects the issues the job sweeps over.
    pub jql: &'static str,
    pub run: JobFn,
}

pub fn all() -> Vec<Job> {
    vec![
        kpi::measurements(),
        kpi::escalation(),
        reviews::due_reviews(),
        reviews::due_satisfaction_reviews(),
    ]
}

pub fn find(name: &str) -> Result<Job> {
    all()
        .into_iter()
        .find(|j| j.name == name)
        .ok_or_else(|| SmsError::JobNotFound(name.to_string()))
}

/// Effective cron expression for a job under this configuration.
pub fn schedule_for<'a>(job: &'a Job, config: &'a SmsConfig) -> &'a str {
    config
        .scheduler
        .schedules
        .get(job.name)
        .map(String::as_str)
        .unwrap_or(job.schedule)
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IssueReport {
    pub key: String,
    pub outcome: std::result::Result<Outcome, String>,
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: &'static str,
    pub issues: Vec<IssueReport>,
}

impl JobReport {
    pub fn failed(&self) -> usize {
        self.issues.iter().filter(|i| i.outcome.is_err()).count()
    }
}

/// Sweep every issue the job's JQL selects. Only the search itself can fail
/// the job; per-issue errors are collected in the report.
pub fn run_job(ctx: &HandlerContext, job: &Job) -> Result<JobReport> {
    let issues = ctx.jira.search_all(job.jql, &[], 50)?;
    info!(job = job.name, count = issues.len(), "job sweep");

    let mut reports = Vec::new();
    for issue in &issues {
        if issue.is_test() {
            info!(job = job.name, issue = issue.key, "ignoring test issue");
            continue;
        }
        match (job.run)(ctx, issue) {
            Ok(outcome) => {
                match &outcome {
                    Outcome::Done(message) => info!(job = job.name, issue = issue.key, message),
                    Outcome::Skipped(message) => {
                        info!(job = job.name, issue = issue.key, message, "skipped")
                    }
                }
                reports.push(IssueReport {
                    key: issue.key.clone(),
                    outcome: Ok(outcome),
                });
            }
            Err(err) => {
                error!(job = job.name, issue = issue.key, %err, "job step failed");
                reports.push(IssueReport {
                    key: issue.key.clone(),
                    outcome: Err(err.to_string()),
                });
            }
        }
    }
    Ok(JobReport {
        job: job.name,
        issues: reports,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
