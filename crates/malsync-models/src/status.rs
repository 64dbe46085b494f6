use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of an entry on a MAL anime list
///
/// The watch-state machine only drives entries between `PlanToWatch`, `Watching`
/// and `Completed`. `OnHold` and `Dropped` can still be read back from MAL and are
/// treated like any other not-yet-completed status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListStatus {
    #[default]
    PlanToWatch,
    Watching,
    Completed,
    OnHold,
    Dropped,
}

impl ListStatus {
    /// Value used by the MAL v2 API (`status` form field)
    pub fn as_mal_str(&self) -> &'static str {
        match self {
            ListStatus::PlanToWatch => "plan_to_watch",
            ListStatus::Watching => "watching",
            ListStatus::Completed => "completed",
            ListStatus::OnHold => "on_hold",
            ListStatus::Dropped => "dropped",
        }
    }

    pub fn from_mal_str(value: &str) -> Option<Self> {
        match value {
            "plan_to_watch" => Some(ListStatus::PlanToWatch),
            "watching" => Some(ListStatus::Watching),
            "completed" => Some(ListStatus::Completed),
            "on_hold" => Some(ListStatus::OnHold),
            "dropped" => Some(ListStatus::Dropped),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ListStatus::Completed)
    }
}

impl fmt::Display for ListStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_mal_str())
    }
}
