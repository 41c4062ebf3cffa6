//! Cron-driven job execution.
//!
//! One tokio task per job. Each task sleeps until the next cron tick, runs
//! the job's sweep on the blocking pool and loops; a failed or panicked
//! sweep is logged and the schedule keeps ticking. There are no retries,
//! the next tick is the retry.

use crate::state::{self, AppState};
use chrono::Utc;
use cron::Schedule;
use sms_core::jobs;
use std::str::FromStr;
use tracing::{error, info, warn};

pub fn spawn(app: AppState) {
    for job in jobs::all() {
        let expression = jobs::schedule_for(&job, &app.config).to_string();
        let schedule = match Schedule::from_str(&expression) {
            Ok(schedule) => schedule,
            Err(err) => {
                error!(job = job.name, expression, %err, "invalid schedule, job disabled");
                continue;
            }
        };
        info!(job = job.name, expression, "job scheduled");

        let config = app.config.clone();
        tokio::spawn(async move {
            loop {
                let Some(next) = schedule.upcoming(Utc).next() else {
                    break;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                info!(job = job.name, "scheduled run");
                let config = config.clone();
                let result = tokio::task::spawn_blocking(move || {
                    state::with_context(&config, |ctx| jobs::run_job(ctx, &job))
                })
                .await;
                match result {
                    Ok(Ok(report)) => {
                        if report.failed() > 0 {
                            warn!(
                                job = report.job,
                                failed = report.failed(),
                                "job finished with failures"
                            );
                        }
                    }
                    Ok(Err(err)) => error!(job = job.name, %err, "job run failed"),
                    Err(err) => error!(job = job.name, %err, "job task panicked"),
                }
            }
        });
    }
}
