use malsync_config::{MappingsConfig, PathManager};
use malsync_models::{MappingEntry, MappingMode, MovieMappingEntry, SourceDatabase};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::loader::{read_document, LoadError};

/// TV and movie mapping rows, read-only for the lifetime of a processor
///
/// On disk:
///
/// ```toml
/// [[tv]]
/// mal_id = 21
/// title = "One Piece"
/// source_id = 81797
/// use_range_mapping = true
///
/// [[tv.season_rules]]
/// source_season = 21
/// start = 892
///
/// [[movies]]
/// title = "Your Name."
/// tmdb_id = 372058
/// mal_id = 32281
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MappingTable {
    #[serde(default)]
    pub tv: Vec<MappingEntry>,
    #[serde(default)]
    pub movies: Vec<MovieMappingEntry>,
}

/// Authoring problem found by [`MappingTable::lint`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingWarning {
    pub mal_id: u64,
    pub title: String,
    pub message: String,
}

impl fmt::Display for MappingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (MAL {}): {}", self.title, self.mal_id, self.message)
    }
}

impl MappingTable {
    pub fn new(tv: Vec<MappingEntry>, movies: Vec<MovieMappingEntry>) -> Self {
        Self { tv, movies }
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let table: MappingTable = read_document(path)?;
        info!(
            "Loaded mapping table {} ({} TV rows, {} movie rows)",
            path.display(),
            table.tv.len(),
            table.movies.len()
        );
        Ok(table)
    }

    /// Main table plus the optional override file named in the config
    pub fn from_config(config: &MappingsConfig, paths: &PathManager) -> Result<Self, LoadError> {
        let table = Self::load(&config.mapping_file(paths))?;
        match &config.override_file {
            Some(path) => Ok(table.with_overrides(Self::load(path)?)),
            None => Ok(table),
        }
    }

    /// Rows keyed on the given source id, in table order
    pub fn tv_entries_for(
        &self,
        source: SourceDatabase,
        source_id: u64,
    ) -> impl Iterator<Item = &MappingEntry> {
        self.tv
            .iter()
            .filter(move |entry| entry.source == source && entry.source_id == source_id)
    }

    /// First movie row for a TMDB id
    pub fn movie_by_tmdb(&self, tmdb_id: u64) -> Option<&MovieMappingEntry> {
        self.movies.iter().find(|movie| movie.tmdb_id == tmdb_id)
    }

    /// Layer user overrides on top of this table
    ///
    /// Every `(source, source_id)` present in `overrides` replaces all rows for that
    /// key; movie overrides replace rows with the same TMDB id.
    pub fn with_overrides(self, overrides: MappingTable) -> Self {
        let overridden_tv: HashSet<(SourceDatabase, u64)> = overrides
            .tv
            .iter()
            .map(|entry| (entry.source, entry.source_id))
            .collect();
        let overridden_movies: HashSet<u64> =
            overrides.movies.iter().map(|movie| movie.tmdb_id).collect();

        let mut tv = overrides.tv;
        let kept_tv = self
            .tv
            .into_iter()
            .filter(|entry| !overridden_tv.contains(&(entry.source, entry.source_id)));
        tv.extend(kept_tv);

        let mut movies = overrides.movies;
        let kept_movies = self
            .movies
            .into_iter()
            .filter(|movie| !overridden_movies.contains(&movie.tmdb_id));
        movies.extend(kept_movies);

        debug!(
            "Applied mapping overrides for {} TV keys and {} movies",
            overridden_tv.len(),
            overridden_movies.len()
        );
        Self { tv, movies }
    }

    pub fn is_empty(&self) -> bool {
        self.tv.is_empty() && self.movies.is_empty()
    }

    /// Report table authoring problems without rejecting the table
    pub fn lint(&self) -> Vec<MappingWarning> {
        let mut warnings = Vec::new();
        let mut starts: HashMap<(SourceDatabase, u64, u32, u32), &MappingEntry> = HashMap::new();

        for entry in &self.tv {
            let mut warn = |message: String| {
                warnings.push(MappingWarning {
                    mal_id: entry.mal_id,
                    title: entry.title.clone(),
                    message,
                })
            };

            if entry.use_range_mapping {
                if entry.season_rules.is_empty() {
                    warn("use_range_mapping is set but no season_rules are defined".to_string());
                }

                let mut seen_seasons = HashSet::new();
                for rule in &entry.season_rules {
                    if !seen_seasons.insert(rule.source_season) {
                        warn(format!(
                            "season {} has more than one rule, only the first is used",
                            rule.source_season
                        ));
                    }
                    if rule.mapping_mode == MappingMode::Explicit && rule.explicit_episodes.is_empty() {
                        warn(format!(
                            "season {} uses explicit mapping with an empty episode map",
                            rule.source_season
                        ));
                    }
                    if rule.mapping_mode == MappingMode::Range && rule.start == 0 {
                        warn(format!(
                            "season {} starts at episode 0, the first source episode maps to nothing",
                            rule.source_season
                        ));
                    }
                    if !rule.skip_mal_episodes.windows(2).all(|w| w[0] <= w[1]) {
                        warn(format!(
                            "season {} skip_mal_episodes is not sorted ascending",
                            rule.source_season
                        ));
                    }
                }
            } else {
                if !entry.season_rules.is_empty() {
                    warn("season_rules are ignored because use_range_mapping is not set".to_string());
                }

                let key = (entry.source, entry.source_id, entry.source_season, entry.start);
                if let Some(previous) = starts.insert(key, entry) {
                    warn(format!(
                        "{}:{} season {} start {} is also used by MAL {}",
                        entry.source, entry.source_id, entry.source_season, entry.start, previous.mal_id
                    ));
                }
            }
        }

        let mut seen_tmdb = HashSet::new();
        for movie in &self.movies {
            if !seen_tmdb.insert(movie.tmdb_id) {
                warnings.push(MappingWarning {
                    mal_id: movie.mal_id,
                    title: movie.title.clone(),
                    message: format!("TMDB id {} is mapped more than once, the first row wins", movie.tmdb_id),
                });
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use malsync_models::{MediaKind, SeasonRule};
    use std::collections::BTreeMap;
    use std::io::Write;

    fn plain(mal_id: u64, source_id: u64, season: u32, start: u32) -> MappingEntry {
        MappingEntry {
            mal_id,
            title: format!("Title {}", mal_id),
            media_kind: MediaKind::Episode,
            source: SourceDatabase::Tvdb,
            source_id,
            source_season: season,
            start,
            use_range_mapping: false,
            season_rules: vec![],
        }
    }

    fn movie(mal_id: u64, tmdb_id: u64) -> MovieMappingEntry {
        MovieMappingEntry {
            title: format!("Movie {}", mal_id),
            tmdb_id,
            mal_id,
        }
    }

    #[test]
    fn test_load_toml_table() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[[tv]]
mal_id = 21
title = "One Piece"
source_id = 81797
use_range_mapping = true

[[tv.season_rules]]
source_season = 21
start = 892

[[tv]]
mal_id = 5081
title = "Bakemonogatari"
source_id = 102261
use_range_mapping = true

[[tv.season_rules]]
source_season = 1
start = 1
mapping_mode = "explicit"
explicit_episodes = {{ "7" = 6, "8" = 11, "9" = 16 }}

[[movies]]
title = "Your Name."
tmdb_id = 372058
mal_id = 32281
"#
        )
        .unwrap();

        let table = MappingTable::load(file.path()).unwrap();
        assert_eq!(table.tv.len(), 2);
        assert_eq!(table.tv[0].season_rules[0].start, 892);
        assert_eq!(table.tv[1].season_rules[0].mapping_mode, MappingMode::Explicit);
        assert_eq!(table.tv[1].season_rules[0].explicit_episodes.get(&8), Some(&11));
        assert_eq!(table.movie_by_tmdb(372058).map(|m| m.mal_id), Some(32281));
    }

    #[test]
    fn test_load_json_table() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"tv": [{{"mal_id": 1, "title": "Cowboy Bebop", "source_id": 76885}}], "movies": []}}"#
        )
        .unwrap();

        let table = MappingTable::load(file.path()).unwrap();
        assert_eq!(table.tv_entries_for(SourceDatabase::Tvdb, 76885).count(), 1);
        assert_eq!(table.tv_entries_for(SourceDatabase::Anidb, 76885).count(), 0);
    }

    #[test]
    fn test_load_invalid_toml_reports_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[[tv]]\nmal_id = \"twenty-one\"").unwrap();
        let err = MappingTable::load(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::Toml { .. }));
    }

    #[test]
    fn test_from_config_applies_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("mappings.toml");
        let custom = dir.path().join("custom.json");
        std::fs::write(&main, "[[tv]]\nmal_id = 1\ntitle = \"Base\"\nsource_id = 100\n").unwrap();
        std::fs::write(&custom, r#"{"tv": [{"mal_id": 2, "title": "Custom", "source_id": 100}]}"#).unwrap();

        let config = MappingsConfig {
            file: Some(main),
            override_file: Some(custom),
            anime_metadata_file: None,
        };
        let table = MappingTable::from_config(&config, &PathManager::with_base(dir.path().to_path_buf())).unwrap();
        let ids: Vec<u64> = table.tv_entries_for(SourceDatabase::Tvdb, 100).map(|e| e.mal_id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_from_config_missing_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MappingTable::from_config(&MappingsConfig::default(), &PathManager::with_base(dir.path().to_path_buf()))
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_overrides_replace_whole_source_key() {
        let base = MappingTable::new(
            vec![plain(1, 100, 1, 1), plain(2, 100, 2, 1), plain(3, 200, 1, 1)],
            vec![movie(10, 1000), movie(11, 1001)],
        );
        let overrides = MappingTable::new(vec![plain(9, 100, 1, 1)], vec![movie(12, 1001)]);

        let merged = base.with_overrides(overrides);
        let for_100: Vec<u64> = merged
            .tv_entries_for(SourceDatabase::Tvdb, 100)
            .map(|e| e.mal_id)
            .collect();
        assert_eq!(for_100, vec![9]);
        assert_eq!(merged.tv_entries_for(SourceDatabase::Tvdb, 200).count(), 1);
        assert_eq!(merged.movie_by_tmdb(1001).map(|m| m.mal_id), Some(12));
        assert_eq!(merged.movie_by_tmdb(1000).map(|m| m.mal_id), Some(10));
    }

    #[test]
    fn test_lint_reports_authoring_problems() {
        let mut range_without_rules = plain(1, 100, 1, 1);
        range_without_rules.use_range_mapping = true;

        let mut unsorted = plain(2, 200, 1, 1);
        unsorted.use_range_mapping = true;
        unsorted.season_rules = vec![
            SeasonRule {
                source_season: 1,
                start: 1,
                mapping_mode: MappingMode::Range,
                explicit_episodes: BTreeMap::new(),
                skip_mal_episodes: vec![16, 6, 11],
            },
            SeasonRule {
                source_season: 2,
                start: 1,
                mapping_mode: MappingMode::Explicit,
                explicit_episodes: BTreeMap::new(),
                skip_mal_episodes: vec![],
            },
        ];

        let table = MappingTable::new(
            vec![range_without_rules, unsorted, plain(3, 300, 1, 1), plain(4, 300, 1, 1)],
            vec![movie(10, 1000), movie(11, 1000)],
        );

        let warnings = table.lint();
        assert_eq!(warnings.len(), 5);
        assert!(warnings.iter().any(|w| w.mal_id == 1 && w.message.contains("no season_rules")));
        assert!(warnings.iter().any(|w| w.mal_id == 2 && w.message.contains("not sorted")));
        assert!(warnings.iter().any(|w| w.mal_id == 2 && w.message.contains("empty episode map")));
        assert!(warnings.iter().any(|w| w.mal_id == 4 && w.message.contains("also used by MAL 3")));
        assert!(warnings.iter().any(|w| w.mal_id == 11));
    }

    #[test]
    fn test_lint_clean_table() {
        let table = MappingTable::new(vec![plain(1, 100, 4, 0), plain(2, 100, 4, 12)], vec![]);
        assert!(table.lint().is_empty());
    }
}
