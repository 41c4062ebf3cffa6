use crate::error::AppError;
use crate::state::{self, AppState};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use sms_core::handlers::{self, DispatchReport, Outcome, WebhookEvent};

/// Shared-secret header checked on webhook deliveries when configured.
pub const SECRET_HEADER: &str = "x-automation-secret";

/// POST /api/webhooks/jira — Jira webhook intake.
///
/// The payload is parsed before any Jira round trip so malformed deliveries
/// come back as a clean 400. Dispatch itself never fails the request:
/// per-handler errors are part of the report body.
pub async fn receive_webhook(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    if let Some(expected) = &app.config.server.webhook_secret {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(AppError::unauthorized("bad or missing automation secret"));
        }
    }

    let event = WebhookEvent::from_json(&payload)?;
    let config = app.config.clone();
    let reports = tokio::task::spawn_blocking(move || {
        state::with_context(&config, |ctx| Ok(handlers::dispatch(ctx, &event)))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    let reports: Vec<Value> = reports.iter().map(report_json).collect();
    Ok(Json(json!({ "reports": reports })))
}

fn report_json(report: &DispatchReport) -> Value {
    match &report.outcome {
        Ok(Outcome::Done(message)) => json!({
            "handler": report.handler, "status": "done", "message": message
        }),
        Ok(Outcome::Skipped(message)) => json!({
            "handler": report.handler, "status": "skipped", "message": message
        }),
        Err(message) => json!({
            "handler": report.handler, "status": "error", "message": message
        }),
    }
}
