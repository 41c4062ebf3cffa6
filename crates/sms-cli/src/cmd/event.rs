use crate::output::{outcome_cells, print_json, print_table};
use anyhow::Context;
use serde_json::json;
use sms_core::config::SmsConfig;
use sms_core::handlers::{self, WebhookEvent};
use sms_server::state::with_context;
use std::path::Path;

/// Replay a saved webhook delivery through the dispatcher, exactly as the
/// server route would.
pub fn run(config_path: &Path, file: &Path, json: bool) -> anyhow::Result<()> {
    let config = SmsConfig::load(config_path)?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&text)?;
    let event = WebhookEvent::from_json(&payload)?;

    let reports = with_context(&config, |ctx| Ok(handlers::dispatch(ctx, &event)))?;
    if reports.is_empty() {
        println!("no handler matched");
        return Ok(());
    }
    if json {
        let reports: Vec<_> = reports
            .iter()
            .map(|report| {
                let (status, message) = outcome_cells(&report.outcome);
                json!({ "handler": report.handler, "status": status, "message": message })
            })
            .collect();
        print_json(&reports)?;
    } else {
        let rows = reports
            .iter()
            .map(|report| {
                let (status, message) = outcome_cells(&report.outcome);
                vec![report.handler.to_string(), status, message]
            })
            .collect();
        print_table(&["HANDLER", "STATUS", "MESSAGE"], rows);
    }
    Ok(())
}
