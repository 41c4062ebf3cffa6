use serde::Serialize;
use sms_core::handlers::Outcome;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Two-space separated columns, each as wide as its widest cell.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(String::len)
                .fold(header.len(), usize::max)
        })
        .collect();

    let padded = |cells: Vec<String>| -> String {
        cells
            .into_iter()
            .zip(widths.iter().copied())
            .map(|(cell, width)| format!("{cell:width$}"))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", padded(headers.iter().map(|h| h.to_string()).collect()));
    println!("{}", padded(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for row in rows {
        println!("{}", padded(row));
    }
}

/// ("done" | "skipped" | "error", message) of a handler or job outcome.
pub fn outcome_cells(outcome: &Result<Outcome, String>) -> (String, String) {
    match outcome {
        Ok(Outcome::Done(message)) => ("done".to_string(), message.clone()),
        Ok(Outcome::Skipped(message)) => ("skipped".to_string(), message.clone()),
        Err(message) => ("error".to_string(), message.clone()),
    }
}
