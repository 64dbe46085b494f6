use crate::output::Output;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use malsync_core::{ProcessOutcome, SnapshotStore, WebhookProcessor};
use malsync_models::{FieldUpdate, ListSnapshot, WebhookEnvelope};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::Context;

pub async fn run_process(
    context: &Context,
    payload: &Path,
    snapshots: Option<&Path>,
    date: Option<chrono::NaiveDate>,
    output: &Output,
) -> Result<()> {
    let envelopes = read_envelopes(payload)?;
    let snapshots = match snapshots {
        Some(path) => read_snapshots(path)?,
        None => HashMap::new(),
    };
    let today = date.unwrap_or_else(|| chrono::Local::now().date_naive());
    debug!(
        "Dry-running {} deliveries against {} list entries dated {}",
        envelopes.len(),
        snapshots.len(),
        today
    );

    let processor = WebhookProcessor::new(
        Arc::new(SnapshotStore::new(snapshots)),
        Arc::new(context.mapping_table(None)?),
        Arc::new(context.anime_metadata()?),
        context.config.webhook.clone(),
    );
    let outcomes = processor.process_batch(&envelopes, today).await;

    output.json(&json!({
        "date": today,
        "outcomes": outcomes,
    }));
    output.table(outcome_table(&outcomes));

    let updated = outcomes.iter().filter(|o| o.is_updated()).count();
    let failed = report_failures(&outcomes, output);
    info!("Dry run finished: {} updated, {} failed, {} total", updated, failed, outcomes.len());

    if failed > 0 {
        return Err(eyre!("{} of {} deliveries failed", failed, outcomes.len()));
    }
    output.success(format!("{} of {} deliveries would update MyAnimeList", updated, outcomes.len()));
    Ok(())
}

/// A single payload object or an array of them
fn read_envelopes(path: &Path) -> Result<Vec<WebhookEnvelope>> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read payload file {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .wrap_err_with(|| format!("Payload file {} is not valid JSON", path.display()))?;

    let envelopes = match &value {
        Value::Array(items) => items.iter().map(WebhookEnvelope::from_value).collect(),
        other => vec![WebhookEnvelope::from_value(other)],
    };
    Ok(envelopes)
}

/// `{"<mal id>": {snapshot}, ...}`
fn read_snapshots(path: &Path) -> Result<HashMap<u64, ListSnapshot>> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read snapshot file {}", path.display()))?;
    serde_json::from_str(&content).wrap_err_with(|| format!("Invalid snapshot file {}", path.display()))
}

/// One error line per failed delivery; returns how many failed
fn report_failures(outcomes: &[ProcessOutcome], output: &Output) -> usize {
    let mut failed = 0;
    for (index, outcome) in outcomes.iter().enumerate() {
        if let ProcessOutcome::Failed(failure) = outcome {
            output.error(format!(
                "#{} {} ({}): {}",
                index + 1,
                failure.identifier,
                failure.error_kind,
                failure.message
            ));
            failed += 1;
        }
    }
    failed
}

fn describe_fields(fields: &[FieldUpdate]) -> String {
    fields
        .iter()
        .map(|field| {
            let (name, value) = field.form_param();
            format!("{}={}", name, value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn outcome_table(outcomes: &[ProcessOutcome]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Outcome").add_attribute(Attribute::Bold),
        Cell::new("Item").add_attribute(Attribute::Bold),
        Cell::new("Details").add_attribute(Attribute::Bold),
    ]);

    for (index, outcome) in outcomes.iter().enumerate() {
        let row = match outcome {
            ProcessOutcome::Ignored { reason } => vec![
                Cell::new("ignored").fg(Color::DarkGrey),
                Cell::new(""),
                Cell::new(reason),
            ],
            ProcessOutcome::Skipped { event, reason } => vec![
                Cell::new("skipped").fg(Color::Yellow),
                Cell::new(event),
                Cell::new(reason),
            ],
            ProcessOutcome::Updated(success) => vec![
                Cell::new("updated").fg(Color::Green),
                Cell::new(format!("{} (MAL {})", success.title, success.mal_id)),
                Cell::new(describe_fields(&success.plan.fields)),
            ],
            ProcessOutcome::Failed(failure) => vec![
                Cell::new(failure.error_kind.to_string()).fg(Color::Red),
                Cell::new(match &failure.event {
                    Some(event) => event.to_string(),
                    None => failure.identifier.clone(),
                }),
                Cell::new(&failure.message),
            ],
        };

        let mut cells = vec![Cell::new(index + 1)];
        cells.extend(row);
        table.add_row(cells);
    }
    table
}
