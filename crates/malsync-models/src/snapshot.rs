use serde::{Deserialize, Serialize};

use crate::status::ListStatus;

/// Point-in-time read of one MAL list entry
///
/// Never mutated in place; the watch-state machine derives an `UpdatePlan` from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ListSnapshot {
    #[serde(default)]
    pub status: ListStatus,
    #[serde(default)]
    pub rewatch_count: u32,
    /// 0 when MAL does not know the episode count yet (ongoing shows)
    #[serde(default)]
    pub total_episodes: u32,
    #[serde(default)]
    pub watched_count: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub is_rewatching: bool,
    #[serde(default)]
    pub score: u8,
}

impl ListSnapshot {
    pub fn has_known_total(&self) -> bool {
        self.total_episodes != 0
    }
}
