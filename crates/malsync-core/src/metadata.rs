use malsync_config::MappingsConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::loader::{read_document, LoadError};

/// Local anime-metadata lookup used by the adapter's AniDB fallback
pub trait AnimeMetadataLookup: Send + Sync {
    /// TVDB series id on file for an AniDB id
    fn tvdb_id_for_anidb(&self, anidb_id: u64) -> Option<u64>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnimeMetadataRecord {
    pub anidb_id: u64,
    #[serde(default)]
    pub tvdb_id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnimeMetadataFile {
    #[serde(default)]
    anime: Vec<AnimeMetadataRecord>,
}

/// In-memory AniDB → TVDB table
#[derive(Debug, Clone, Default)]
pub struct AnimeMetadataTable {
    by_anidb: HashMap<u64, AnimeMetadataRecord>,
}

impl AnimeMetadataTable {
    /// Later records win when an AniDB id appears twice
    pub fn from_records(records: impl IntoIterator<Item = AnimeMetadataRecord>) -> Self {
        let by_anidb = records.into_iter().map(|r| (r.anidb_id, r)).collect();
        Self { by_anidb }
    }

    /// Load `[[anime]]` records from a TOML or JSON file
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let file: AnimeMetadataFile = read_document(path)?;
        let table = Self::from_records(file.anime);
        debug!("Loaded {} anime metadata records from {}", table.len(), path.display());
        Ok(table)
    }

    /// Table named by the config, or an empty one when none is configured
    pub fn from_config(config: &MappingsConfig) -> Result<Self, LoadError> {
        match &config.anime_metadata_file {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn get(&self, anidb_id: u64) -> Option<&AnimeMetadataRecord> {
        self.by_anidb.get(&anidb_id)
    }

    pub fn len(&self) -> usize {
        self.by_anidb.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_anidb.is_empty()
    }
}

impl AnimeMetadataLookup for AnimeMetadataTable {
    fn tvdb_id_for_anidb(&self, anidb_id: u64) -> Option<u64> {
        self.by_anidb.get(&anidb_id).and_then(|r| r.tvdb_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_lookup() {
        let table = AnimeMetadataTable::from_records(vec![
            AnimeMetadataRecord {
                anidb_id: 69,
                tvdb_id: Some(81797),
                title: Some("One Piece".to_string()),
            },
            AnimeMetadataRecord {
                anidb_id: 5975,
                tvdb_id: None,
                title: None,
            },
        ]);
        assert_eq!(table.tvdb_id_for_anidb(69), Some(81797));
        assert_eq!(table.tvdb_id_for_anidb(5975), None);
        assert_eq!(table.tvdb_id_for_anidb(1), None);
    }

    #[test]
    fn test_load_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[[anime]]
anidb_id = 69
tvdb_id = 81797
title = "One Piece"

[[anime]]
anidb_id = 8691
"#
        )
        .unwrap();

        let table = AnimeMetadataTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.tvdb_id_for_anidb(69), Some(81797));
        assert_eq!(table.get(8691).unwrap().tvdb_id, None);
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(matches!(
            AnimeMetadataTable::load(file.path()),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }
}
