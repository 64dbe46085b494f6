use crate::output::Output;
use crate::KindArg;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use comfy_table::{Attribute, Cell, Color, Table};
use malsync_core::adapter::apply_anidb_fallback;
use malsync_core::{calculate_episode, parse_agent_guid, resolve, EpisodeHint};
use malsync_models::{MappingMode, MediaKind, ResolvedMapping};
use serde_json::json;
use std::path::PathBuf;

use super::Context;

pub fn run_inspect(
    context: &Context,
    guid: &str,
    kind: KindArg,
    season: Option<u32>,
    episode: Option<u32>,
    mappings: Option<PathBuf>,
    output: &Output,
) -> Result<()> {
    let kind = match kind {
        KindArg::Episode => MediaKind::Episode,
        KindArg::Movie => MediaKind::Movie,
    };
    let table = context.mapping_table(mappings)?;
    let metadata = context.anime_metadata()?;

    let event = parse_agent_guid(guid, kind, EpisodeHint { season, episode })
        .wrap_err_with(|| format!("Could not normalize '{}'", guid))?;
    let event = apply_anidb_fallback(event, &metadata);
    tracing::debug!("Inspecting {}", event);

    let resolved = resolve(&event, &table).wrap_err_with(|| format!("Could not resolve {}", event))?;
    let mal_episode = calculate_episode(&resolved, &event);

    output.json(&json!({
        "event": event,
        "mapping": resolved,
        "mal_episode": mal_episode.as_ref().ok(),
        "error": mal_episode.as_ref().err().map(|e| e.to_string()),
    }));
    output.table(mapping_table(&event.to_string(), &resolved, mal_episode.as_ref().ok().copied()));

    match mal_episode {
        Ok(episode) => {
            output.success(format!("{} -> MAL {} episode {}", event, resolved.mal_id, episode));
            Ok(())
        }
        Err(err) => Err(eyre!("Episode calculation failed: {}", err)),
    }
}

fn mapping_table(event: &str, resolved: &ResolvedMapping, mal_episode: Option<u32>) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Event").add_attribute(Attribute::Bold),
        Cell::new(event).fg(Color::Cyan),
    ]);
    table.add_row(vec![Cell::new("MAL id"), Cell::new(resolved.mal_id)]);
    if !resolved.title.is_empty() {
        table.add_row(vec![Cell::new("Title"), Cell::new(&resolved.title)]);
    }
    table.add_row(vec![Cell::new("Start"), Cell::new(resolved.start)]);
    table.add_row(vec![Cell::new("Range mapping"), Cell::new(resolved.use_range_mapping)]);

    match resolved.mapping_mode {
        MappingMode::Explicit => {
            let pairs: Vec<String> = resolved
                .explicit_episodes
                .iter()
                .map(|(source, mal)| format!("{}→{}", source, mal))
                .collect();
            table.add_row(vec![Cell::new("Explicit episodes"), Cell::new(pairs.join(", "))]);
        }
        MappingMode::Range if !resolved.skip_mal_episodes.is_empty() => {
            let skips: Vec<String> = resolved.skip_mal_episodes.iter().map(u32::to_string).collect();
            table.add_row(vec![Cell::new("Skipped MAL episodes"), Cell::new(skips.join(", "))]);
        }
        MappingMode::Range => {}
    }

    let episode_cell = match mal_episode {
        Some(episode) => Cell::new(episode).fg(Color::Green),
        None => Cell::new("n/a").fg(Color::Red),
    };
    table.add_row(vec![Cell::new("MAL episode").add_attribute(Attribute::Bold), episode_cell]);
    table
}
