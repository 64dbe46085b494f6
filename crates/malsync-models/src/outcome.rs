use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::CanonicalEvent;
use crate::plan::UpdatePlan;
use crate::snapshot::ListSnapshot;

/// Why an event could not be synced
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnsupportedAgent,
    MalformedIdentifier,
    MappingNotFound,
    IncorrectEpisodeCalculation,
    EpisodeExceedsTotal,
    /// MAL fetch/update failed (transport, auth, rate limit)
    Client,
}

impl FailureKind {
    /// Expected outcomes that should be logged quietly and not notified about
    pub fn is_skip(&self) -> bool {
        matches!(self, FailureKind::MappingNotFound)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::UnsupportedAgent => "unsupported_agent",
            FailureKind::MalformedIdentifier => "malformed_identifier",
            FailureKind::MappingNotFound => "mapping_not_found",
            FailureKind::IncorrectEpisodeCalculation => "incorrect_episode_calculation",
            FailureKind::EpisodeExceedsTotal => "episode_exceeds_total",
            FailureKind::Client => "client",
        };
        write!(f, "{}", name)
    }
}

/// Emitted after a plan was applied to MAL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnimeUpdateSuccess {
    pub mal_id: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    /// MAL episode number for scrobbles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Score for rating events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    pub plan: UpdatePlan,
    /// Entry as reported back by MAL after the update
    pub snapshot: ListSnapshot,
}

/// Emitted when an event could not be synced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnimeUpdateFailed {
    /// Normalized event, when the failure happened after normalization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<CanonicalEvent>,
    /// Raw identifier as received, for failures before normalization
    pub identifier: String,
    pub error_kind: FailureKind,
    pub message: String,
}
