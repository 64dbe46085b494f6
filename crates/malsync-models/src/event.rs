use serde::{Deserialize, Serialize};
use std::fmt;

use crate::media::{MediaKind, SourceDatabase};

/// Normalized form of a playback or rating event
///
/// Produced once by the adapter and consumed read-only by the resolver and the
/// watch-state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalEvent {
    pub source_database: SourceDatabase,
    pub source_id: u64,
    pub season: u32,
    pub episode: u32,
    pub media_kind: MediaKind,
    /// Present only for rating events (0-10)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
}

impl CanonicalEvent {
    pub fn is_rating(&self) -> bool {
        self.rating.is_some()
    }
}

impl fmt::Display for CanonicalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.media_kind {
            MediaKind::Movie => write!(f, "{}:{} (movie)", self.source_database, self.source_id),
            MediaKind::Episode => write!(
                f,
                "{}:{} S{:02}E{:02}",
                self.source_database, self.source_id, self.season, self.episode
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let event = CanonicalEvent {
            source_database: SourceDatabase::Tvdb,
            source_id: 81797,
            season: 21,
            episode: 186,
            media_kind: MediaKind::Episode,
            rating: None,
        };
        assert_eq!(event.to_string(), "tvdb:81797 S21E186");
    }
}
