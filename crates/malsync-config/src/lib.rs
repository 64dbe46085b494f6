pub mod config;
pub mod paths;

pub use config::{Config, LoggingConfig, MappingsConfig, WebhookConfig};
pub use paths::{PathManager, container_base_path};
