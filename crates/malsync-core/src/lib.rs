pub mod adapter;
pub mod error;
pub mod loader;
pub mod mal;
pub mod mapping_table;
pub mod metadata;
pub mod processor;
pub mod resolver;
pub mod watch_state;

pub use adapter::{normalize, parse_agent_guid, select_provider, EpisodeHint};
pub use error::{Result, SyncError};
pub use loader::LoadError;
pub use mal::{MalClient, SnapshotStore, SnapshotStoreError};
pub use mapping_table::{MappingTable, MappingWarning};
pub use metadata::{AnimeMetadataLookup, AnimeMetadataRecord, AnimeMetadataTable};
pub use processor::{ProcessOutcome, WebhookProcessor};
pub use resolver::{calculate_episode, resolve, resolve_episode};
pub use watch_state::{plan_rating, plan_update};
