use crate::error::AppError;
use crate::state::{self, AppState};
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use sms_core::handlers::Outcome;
use sms_core::jobs::{self, JobReport};

/// GET /api/jobs — the job table with effective schedules.
pub async fn list_jobs(State(app): State<AppState>) -> Json<Value> {
    let jobs: Vec<Value> = jobs::all()
        .iter()
        .map(|job| {
            json!({
                "name": job.name,
                "description": job.description,
                "schedule": jobs::schedule_for(job, &app.config),
                "jql": job.jql,
            })
        })
        .collect();
    Json(json!({ "jobs": jobs }))
}

/// POST /api/jobs/{name}/run — trigger one sweep outside the schedule.
pub async fn run_job(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let job = jobs::find(&name)?;
    let config = app.config.clone();
    let report = tokio::task::spawn_blocking(move || {
        state::with_context(&config, |ctx| jobs::run_job(ctx, &job))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(report_json(&report)))
}

fn report_json(report: &JobReport) -> Value {
    let issues: Vec<Value> = report
        .issues
        .iter()
        .map(|issue| match &issue.outcome {
            Ok(Outcome::Done(message)) => json!({
                "key": issue.key, "status": "done", "message": message
            }),
            Ok(Outcome::Skipped(message)) => json!({
                "key": issue.key, "status": "skipped", "message": message
            }),
            Err(message) => json!({
                "key": issue.key, "status": "error", "message": message
            }),
        })
        .collect();
    json!({
        "job": report.job,
        "processed": report.issues.len(),
        "failed": report.failed(),
        "issues": issues,
    })
}
