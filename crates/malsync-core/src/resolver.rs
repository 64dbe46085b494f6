// Mapping resolver: canonical event → MAL id + MAL episode number

use malsync_models::{CanonicalEvent, MappingEntry, MappingMode, MediaKind, ResolvedMapping, SourceDatabase};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::mapping_table::MappingTable;

/// Find the mapping that applies to `event`
///
/// MAL identifiers short-circuit, TMDB movies use the movie table and everything
/// else goes through the TV table.
pub fn resolve(event: &CanonicalEvent, table: &MappingTable) -> Result<ResolvedMapping> {
    if event.source_database == SourceDatabase::Mal {
        debug!("Event {} already carries a MAL id", event);
        return Ok(ResolvedMapping::direct(event.source_id, String::new()));
    }

    let resolved = if event.media_kind == MediaKind::Movie && event.source_database == SourceDatabase::Tmdb {
        table
            .movie_by_tmdb(event.source_id)
            .map(|movie| ResolvedMapping::direct(movie.mal_id, movie.title.clone()))
    } else {
        select_tv_mapping(event, table)
    };

    match resolved {
        Some(resolved) => {
            debug!(
                "Event {} resolved to MAL {} '{}' (start {}, range mapping {}, mode {:?})",
                event, resolved.mal_id, resolved.title, resolved.start, resolved.use_range_mapping, resolved.mapping_mode
            );
            Ok(resolved)
        }
        None => Err(not_found(event)),
    }
}

/// Entry selection over the TV table
///
/// A season rule on a range-mapped row wins immediately. Otherwise plain rows for
/// the season are collected; when a season is split across several MAL titles the
/// row with the largest `start` not past the requested episode is chosen.
fn select_tv_mapping(event: &CanonicalEvent, table: &MappingTable) -> Option<ResolvedMapping> {
    let mut candidates: Vec<&MappingEntry> = Vec::new();

    for entry in table.tv_entries_for(event.source_database, event.source_id) {
        if entry.use_range_mapping {
            if let Some(rule) = entry.season_rule(event.season) {
                return Some(ResolvedMapping::from_season_rule(entry, rule));
            }
        } else if entry.source_season == event.season {
            candidates.push(entry);
        }
    }

    match candidates.as_slice() {
        [] => None,
        [only] => Some(ResolvedMapping::from_entry(only)),
        _ => {
            debug!(
                "{} candidates for {} season {}, picking by start",
                candidates.len(),
                event.source_id,
                event.season
            );
            // reversed so that equal starts keep the first row in table order
            candidates
                .iter()
                .rev()
                .filter(|entry| entry.start <= event.episode)
                .max_by_key(|entry| entry.start)
                .map(|entry| ResolvedMapping::from_entry(entry))
        }
    }
}

/// Translate the event's source episode into MAL numbering
pub fn calculate_episode(resolved: &ResolvedMapping, event: &CanonicalEvent) -> Result<u32> {
    let source_episode = event.episode;
    let start = i64::from(resolved.start);
    let episode = i64::from(source_episode);

    let mal_episode = match resolved.mapping_mode {
        MappingMode::Explicit => match resolved.explicit_episodes.get(&source_episode) {
            Some(mapped) => i64::from(*mapped),
            None => {
                debug!(
                    "Episode {} is not in the explicit map for MAL {}",
                    source_episode, resolved.mal_id
                );
                return Err(not_found(event));
            }
        },
        MappingMode::Range if !resolved.use_range_mapping => episode - start + 1,
        MappingMode::Range => {
            let mut skips = resolved.skip_mal_episodes.clone();
            skips.sort_unstable();

            let mut total = start + episode - 1;
            for skip in skips {
                if i64::from(skip) <= total {
                    total += 1;
                }
            }
            total
        }
    };

    if mal_episode <= 0 {
        return Err(SyncError::IncorrectEpisodeCalculation {
            mal_id: resolved.mal_id,
            source_episode,
            episode: mal_episode,
        });
    }

    u32::try_from(mal_episode).map_err(|_| SyncError::IncorrectEpisodeCalculation {
        mal_id: resolved.mal_id,
        source_episode,
        episode: mal_episode,
    })
}

/// Resolve and calculate in one step
pub fn resolve_episode(event: &CanonicalEvent, table: &MappingTable) -> Result<(ResolvedMapping, u32)> {
    let resolved = resolve(event, table)?;
    let episode = calculate_episode(&resolved, event)?;
    Ok((resolved, episode))
}

fn not_found(event: &CanonicalEvent) -> SyncError {
    SyncError::MappingNotFound {
        database: event.source_database,
        source_id: event.source_id,
        season: event.season,
        episode: event.episode,
        kind: event.media_kind,
    }
}
