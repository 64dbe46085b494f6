use malsync_models::{FailureKind, MediaKind, SourceDatabase};
use thiserror::Error;

/// Terminal failure for a single event; nothing in the pipeline retries
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unsupported agent in identifier '{0}'")]
    UnsupportedAgent(String),

    #[error("malformed identifier '{identifier}': {reason}")]
    MalformedIdentifier { identifier: String, reason: String },

    #[error("no mapping for {database}:{source_id} S{season:02}E{episode:02} ({kind})")]
    MappingNotFound {
        database: SourceDatabase,
        source_id: u64,
        season: u32,
        episode: u32,
        kind: MediaKind,
    },

    #[error("mapping for MAL id {mal_id} produced episode {episode} from source episode {source_episode}")]
    IncorrectEpisodeCalculation {
        mal_id: u64,
        source_episode: u32,
        episode: i64,
    },

    #[error("episode {episode} exceeds the {total} episodes MAL lists for {mal_id}")]
    EpisodeExceedsTotal { mal_id: u64, episode: u32, total: u32 },

    #[error("MAL client error: {0}")]
    Client(#[source] anyhow::Error),
}

impl SyncError {
    pub fn malformed(identifier: &str, reason: impl Into<String>) -> Self {
        SyncError::MalformedIdentifier {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::UnsupportedAgent(_) => FailureKind::UnsupportedAgent,
            SyncError::MalformedIdentifier { .. } => FailureKind::MalformedIdentifier,
            SyncError::MappingNotFound { .. } => FailureKind::MappingNotFound,
            SyncError::IncorrectEpisodeCalculation { .. } => FailureKind::IncorrectEpisodeCalculation,
            SyncError::EpisodeExceedsTotal { .. } => FailureKind::EpisodeExceedsTotal,
            SyncError::Client(_) => FailureKind::Client,
        }
    }

    /// Anime intentionally absent from the mapping table; not worth a notification
    pub fn is_skip(&self) -> bool {
        self.kind().is_skip()
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
