pub mod config;
pub mod inspect;
pub mod mappings;
pub mod process;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use malsync_config::{Config, PathManager};
use malsync_core::{AnimeMetadataTable, MappingTable};
use std::path::PathBuf;

/// Config and paths shared by every subcommand
pub struct Context {
    pub config: Config,
    pub paths: PathManager,
    pub config_file: PathBuf,
}

impl Context {
    /// Load `--config` or the default config file; a missing file means defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let paths = PathManager::default();
        let config_file = config_file.unwrap_or_else(|| paths.config_file());

        let config = Config::load_or_default(&config_file)
            .map_err(|e| eyre!("Failed to load config from {}: {:#}", config_file.display(), e))?;
        config
            .validate()
            .map_err(|e| eyre!("Invalid configuration in {}: {:#}", config_file.display(), e))?;

        Ok(Self {
            config,
            paths,
            config_file,
        })
    }

    /// Mapping table from `file`, or the configured table with its overrides
    pub fn mapping_table(&self, file: Option<PathBuf>) -> Result<MappingTable> {
        let table = match file {
            Some(path) => MappingTable::load(&path)
                .wrap_err_with(|| format!("Failed to load mapping table {}", path.display()))?,
            None => MappingTable::from_config(&self.config.mappings, &self.paths)
                .wrap_err("Failed to load the configured mapping table")?,
        };
        Ok(table)
    }

    pub fn anime_metadata(&self) -> Result<AnimeMetadataTable> {
        AnimeMetadataTable::from_config(&self.config.mappings).wrap_err("Failed to load anime metadata")
    }
}
