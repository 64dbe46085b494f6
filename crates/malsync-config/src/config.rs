use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paths::PathManager;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub mappings: MappingsConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the mapping tables live
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct MappingsConfig {
    /// Main TV + movie mapping table (`.toml` or `.json`).
    /// Defaults to `<data_dir>/mappings.toml`.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// User overrides; every source id listed here replaces the main table's rows
    #[serde(default)]
    pub override_file: Option<PathBuf>,

    /// AniDB → TVDB lookup used for multi-season AniDB identifiers
    #[serde(default)]
    pub anime_metadata_file: Option<PathBuf>,
}

impl MappingsConfig {
    pub fn mapping_file(&self, paths: &PathManager) -> PathBuf {
        self.file.clone().unwrap_or_else(|| paths.default_mapping_file())
    }
}

/// Which webhook deliveries are processed
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Account names allowed to trigger updates (empty = everyone)
    #[serde(default)]
    pub accounts: Vec<String>,

    /// Library names allowed to trigger updates (empty = every library)
    #[serde(default)]
    pub libraries: Vec<String>,

    /// Forward media.rate events as MAL scores
    #[serde(default = "default_true")]
    pub sync_ratings: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            libraries: Vec::new(),
            sync_ratings: default_true(),
        }
    }
}

impl WebhookConfig {
    pub fn allows_account(&self, account: &str) -> bool {
        self.accounts.is_empty()
            || self.accounts.iter().any(|a| a.eq_ignore_ascii_case(account.trim()))
    }

    /// Events without a library name only pass when no library filter is set
    pub fn allows_library(&self, library: Option<&str>) -> bool {
        if self.libraries.is_empty() {
            return true;
        }
        match library {
            Some(name) => self.libraries.iter().any(|l| l.eq_ignore_ascii_case(name.trim())),
            None => false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json_logging")]
    pub json: bool,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json_logging(),
            file: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json_logging() -> bool {
    use std::io::IsTerminal;
    !std::io::stdout().is_terminal()
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid logging level '{}', expected one of {:?}",
                self.logging.level,
                LOG_LEVELS
            ));
        }

        let tables = [
            ("mappings.file", self.mappings.file.as_ref()),
            ("mappings.override_file", self.mappings.override_file.as_ref()),
            ("mappings.anime_metadata_file", self.mappings.anime_metadata_file.as_ref()),
        ];
        for (key, path) in tables {
            if let Some(path) = path {
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
                if !matches!(ext, "toml" | "json") {
                    return Err(anyhow::anyhow!(
                        "{} must point to a .toml or .json file: {}",
                        key,
                        path.display()
                    ));
                }
            }
        }

        if self.webhook.accounts.iter().any(|a| a.trim().is_empty()) {
            return Err(anyhow::anyhow!("webhook.accounts contains an empty account name"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let config = Config {
            mappings: MappingsConfig {
                file: Some(PathBuf::from("/data/mappings.toml")),
                override_file: None,
                anime_metadata_file: Some(PathBuf::from("/data/anime.json")),
            },
            webhook: WebhookConfig {
                accounts: vec!["haruhi".to_string()],
                libraries: vec![],
                sync_ratings: false,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: true,
                file: None,
            },
        };

        let path = file.path().to_path_buf();
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.mappings.file, Some(PathBuf::from("/data/mappings.toml")));
        assert_eq!(loaded.webhook.accounts, vec!["haruhi".to_string()]);
        assert!(!loaded.webhook.sync_ratings);
        assert_eq!(loaded.logging.level, "debug");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.mappings.file.is_none());
        assert!(config.webhook.sync_ratings);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "WARN".to_string();
        assert!(config.validate().is_ok());

        config.mappings.file = Some(PathBuf::from("mappings.yaml"));
        assert!(config.validate().is_err());

        config.mappings.file = Some(PathBuf::from("mappings.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_webhook_filters() {
        let open = WebhookConfig::default();
        assert!(open.allows_account("anyone"));
        assert!(open.allows_library(None));

        let filtered = WebhookConfig {
            accounts: vec!["Haruhi".to_string()],
            libraries: vec!["Anime".to_string(), "Anime Movies".to_string()],
            sync_ratings: true,
        };
        assert!(filtered.allows_account("haruhi"));
        assert!(!filtered.allows_account("kyon"));
        assert!(filtered.allows_library(Some("anime movies")));
        assert!(!filtered.allows_library(Some("TV Shows")));
        assert!(!filtered.allows_library(None));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("config.toml")).unwrap();
        assert!(config.webhook.accounts.is_empty());
    }
}
