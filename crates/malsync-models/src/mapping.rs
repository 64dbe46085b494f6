use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::media::{MediaKind, SourceDatabase};

/// How source episode numbers translate to MAL episode numbers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    /// Arithmetic offset from `start`, optionally shifted by skipped MAL episodes
    #[default]
    Range,
    /// Per-episode lookup table, no arithmetic
    Explicit,
}

/// Per-season override attached to a range-mapped entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeasonRule {
    pub source_season: u32,
    /// MAL episode number the source season begins at
    pub start: u32,
    #[serde(default)]
    pub mapping_mode: MappingMode,
    /// Source episode → MAL episode, used when `mapping_mode = "explicit"`
    #[serde(default, with = "episode_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub explicit_episodes: BTreeMap<u32, u32>,
    /// MAL-only episodes (recaps, OVAs) with no counterpart in the source numbering
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_mal_episodes: Vec<u32>,
}

/// One row of the TV mapping table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingEntry {
    pub mal_id: u64,
    pub title: String,
    #[serde(default)]
    pub media_kind: MediaKind,
    /// Database `source_id` is expressed in (TVDB unless stated otherwise)
    #[serde(default)]
    pub source: SourceDatabase,
    pub source_id: u64,
    #[serde(default = "default_season")]
    pub source_season: u32,
    #[serde(default = "default_start")]
    pub start: u32,
    #[serde(default)]
    pub use_range_mapping: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub season_rules: Vec<SeasonRule>,
}

fn default_season() -> u32 {
    1
}

fn default_start() -> u32 {
    1
}

impl MappingEntry {
    /// First season rule matching `season`, if any
    pub fn season_rule(&self, season: u32) -> Option<&SeasonRule> {
        self.season_rules.iter().find(|rule| rule.source_season == season)
    }
}

/// One row of the movie mapping table (direct TMDB → MAL lookup)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovieMappingEntry {
    pub title: String,
    pub tmdb_id: u64,
    pub mal_id: u64,
}

/// The subset of a mapping entry (and season rule) selected for one event
///
/// Always built fresh by the resolver; table rows are never modified.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResolvedMapping {
    pub mal_id: u64,
    pub title: String,
    pub start: u32,
    pub use_range_mapping: bool,
    pub mapping_mode: MappingMode,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub explicit_episodes: BTreeMap<u32, u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skip_mal_episodes: Vec<u32>,
}

impl ResolvedMapping {
    /// Mapping that passes the source episode through unchanged
    pub fn direct(mal_id: u64, title: impl Into<String>) -> Self {
        Self {
            mal_id,
            title: title.into(),
            start: 1,
            use_range_mapping: false,
            mapping_mode: MappingMode::Range,
            explicit_episodes: BTreeMap::new(),
            skip_mal_episodes: Vec::new(),
        }
    }

    /// Selected from a plain (non range-mapped) entry
    pub fn from_entry(entry: &MappingEntry) -> Self {
        Self {
            mal_id: entry.mal_id,
            title: entry.title.clone(),
            start: entry.start,
            use_range_mapping: entry.use_range_mapping,
            mapping_mode: MappingMode::Range,
            explicit_episodes: BTreeMap::new(),
            skip_mal_episodes: Vec::new(),
        }
    }

    /// Selected from a range-mapped entry through one of its season rules
    pub fn from_season_rule(entry: &MappingEntry, rule: &SeasonRule) -> Self {
        Self {
            mal_id: entry.mal_id,
            title: entry.title.clone(),
            start: rule.start,
            use_range_mapping: true,
            mapping_mode: rule.mapping_mode,
            explicit_episodes: rule.explicit_episodes.clone(),
            skip_mal_episodes: rule.skip_mal_episodes.clone(),
        }
    }
}

/// (De)serializes episode maps with string keys so they work in TOML and JSON alike
pub mod episode_map {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(map: &BTreeMap<u32, u32>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        map.iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect::<BTreeMap<String, u32>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<u32, u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, u32>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(k, v)| {
                k.trim()
                    .parse::<u32>()
                    .map(|k| (k, v))
                    .map_err(|_| D::Error::custom(format!("episode key '{}' is not a number", k)))
            })
            .collect()
    }
}
