use crate::output::Output;
use crate::ConfigCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use malsync_config::Config;
use owo_colors::OwoColorize;
use serde_json::json;
use std::path::Path;

use super::Context;

pub fn run_config(context: &Context, cmd: ConfigCommands, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show_config(context, output),
        ConfigCommands::Init { force } => {
            context
                .paths
                .ensure_directories()
                .map_err(|e| eyre!("Failed to create data directories: {:#}", e))?;
            init_config(&context.config_file, force, output)?;
            output.info(format!(
                "Put the mapping table at {} or set mappings.file",
                context.config.mappings.mapping_file(&context.paths).display()
            ));
            Ok(())
        }
    }
}

fn show_config(context: &Context, output: &Output) -> Result<()> {
    let config = &context.config;
    let exists = context.config_file.exists();

    output.json(&json!({
        "config_file": context.config_file,
        "exists": exists,
        "mapping_file": config.mappings.mapping_file(&context.paths),
        "config": config,
    }));

    if !exists {
        output.warn(format!(
            "No config file at {}, showing defaults (run {} to create one)",
            context.config_file.display(),
            "malsync config init".bold()
        ));
    }
    output.table(config_table(context));
    Ok(())
}

fn config_table(context: &Context) -> Table {
    let config = &context.config;
    let or_all = |values: &[String]| {
        if values.is_empty() {
            "(all)".to_string()
        } else {
            values.join(", ")
        }
    };
    let optional = |path: &Option<std::path::PathBuf>| {
        path.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    };

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Config File").add_attribute(Attribute::Bold),
        Cell::new(context.config_file.display().to_string()).fg(Color::Cyan),
    ]);
    table.add_row(vec![
        Cell::new("Mapping table"),
        Cell::new(config.mappings.mapping_file(&context.paths).display().to_string()),
    ]);
    table.add_row(vec![Cell::new("Mapping overrides"), Cell::new(optional(&config.mappings.override_file))]);
    table.add_row(vec![
        Cell::new("Anime metadata"),
        Cell::new(optional(&config.mappings.anime_metadata_file)),
    ]);
    table.add_row(vec![Cell::new("Accounts"), Cell::new(or_all(&config.webhook.accounts))]);
    table.add_row(vec![Cell::new("Libraries"), Cell::new(or_all(&config.webhook.libraries))]);
    table.add_row(vec![Cell::new("Sync ratings"), Cell::new(config.webhook.sync_ratings)]);
    table.add_row(vec![Cell::new("Log level"), Cell::new(&config.logging.level)]);
    table.add_row(vec![Cell::new("JSON logs"), Cell::new(config.logging.json)]);
    table.add_row(vec![Cell::new("Log file"), Cell::new(optional(&config.logging.file))]);
    table
}

fn init_config(path: &Path, force: bool, output: &Output) -> Result<()> {
    if path.exists() && !force {
        return Err(eyre!(
            "Config file {} already exists (use --force to overwrite)",
            path.display()
        ));
    }

    Config::default()
        .save_to_file(path)
        .map_err(|e| eyre!("Failed to write config to {}: {:#}", path.display(), e))?;

    output.json(&json!({"config_file": path, "created": true}));
    output.success(format!("Wrote default configuration to {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let output = Output::new(OutputFormat::Json, true);

        init_config(&path, false, &output).unwrap();
        assert!(Config::load_from_file(&path).is_ok());
        assert!(init_config(&path, false, &output).is_err());
        assert!(init_config(&path, true, &output).is_ok());
    }
}
