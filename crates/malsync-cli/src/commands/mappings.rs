use crate::output::Output;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use malsync_core::MappingWarning;
use serde_json::json;
use std::path::PathBuf;

use super::Context;

pub fn run_check(context: &Context, file: Option<PathBuf>, output: &Output) -> Result<()> {
    let table = context.mapping_table(file)?;
    let warnings = table.lint();
    let range_rows = table.tv.iter().filter(|entry| entry.use_range_mapping).count();

    output.json(&json!({
        "tv_rows": table.tv.len(),
        "range_rows": range_rows,
        "movie_rows": table.movies.len(),
        "warnings": warnings
            .iter()
            .map(|w| json!({"mal_id": w.mal_id, "title": w.title, "message": w.message}))
            .collect::<Vec<_>>(),
    }));

    if table.is_empty() {
        output.warn("Mapping table has no rows; every event will be skipped");
    } else {
        output.info(format!(
            "{} TV rows ({} with season rules), {} movie rows",
            table.tv.len(),
            range_rows,
            table.movies.len()
        ));
    }

    if warnings.is_empty() {
        output.success("No problems found");
    } else {
        output.table(warning_table(&warnings));
        output.warn(format!("{} warning(s)", warnings.len()));
    }
    Ok(())
}

fn warning_table(warnings: &[MappingWarning]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("MAL id").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Problem").fg(Color::Yellow).add_attribute(Attribute::Bold),
    ]);
    for warning in warnings {
        table.add_row(vec![
            Cell::new(warning.mal_id),
            Cell::new(&warning.title),
            Cell::new(&warning.message),
        ]);
    }
    table
}
