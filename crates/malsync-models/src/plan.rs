use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::snapshot::ListSnapshot;
use crate::status::ListStatus;

const MAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// A single mutation of a MAL list entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldUpdate {
    Status(ListStatus),
    EpisodeCount(u32),
    StartDate(NaiveDate),
    FinishDate(NaiveDate),
    RewatchCount(u32),
    Rewatching(bool),
    Score(u8),
}

impl FieldUpdate {
    /// MAL v2 API form field name and value for this mutation
    pub fn form_param(&self) -> (&'static str, String) {
        match self {
            FieldUpdate::Status(status) => ("status", status.as_mal_str().to_string()),
            FieldUpdate::EpisodeCount(count) => ("num_watched_episodes", count.to_string()),
            FieldUpdate::StartDate(date) => ("start_date", date.format(MAL_DATE_FORMAT).to_string()),
            FieldUpdate::FinishDate(date) => ("finish_date", date.format(MAL_DATE_FORMAT).to_string()),
            FieldUpdate::RewatchCount(count) => ("num_times_rewatched", count.to_string()),
            FieldUpdate::Rewatching(flag) => ("is_rewatching", flag.to_string()),
            FieldUpdate::Score(score) => ("score", score.to_string()),
        }
    }
}

/// Ordered set of list mutations computed by the watch-state machine
///
/// `status` and `rewatch_count` are the values the caller should assume once the
/// update has been applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdatePlan {
    pub fields: Vec<FieldUpdate>,
    pub status: ListStatus,
    pub rewatch_count: u32,
}

impl UpdatePlan {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn episode_count(&self) -> Option<u32> {
        self.fields.iter().find_map(|field| match field {
            FieldUpdate::EpisodeCount(count) => Some(*count),
            _ => None,
        })
    }

    pub fn finish_date(&self) -> Option<NaiveDate> {
        self.fields.iter().find_map(|field| match field {
            FieldUpdate::FinishDate(date) => Some(*date),
            _ => None,
        })
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.fields.iter().find_map(|field| match field {
            FieldUpdate::StartDate(date) => Some(*date),
            _ => None,
        })
    }

    /// Form body for a MAL `PATCH /anime/{id}/my_list_status` request, in plan order
    pub fn form_params(&self) -> Vec<(&'static str, String)> {
        self.fields.iter().map(FieldUpdate::form_param).collect()
    }

    /// Snapshot MAL would report after this plan is applied to `snapshot`
    pub fn apply_to(&self, snapshot: &ListSnapshot) -> ListSnapshot {
        let mut next = snapshot.clone();
        for field in &self.fields {
            match *field {
                FieldUpdate::Status(status) => next.status = status,
                FieldUpdate::EpisodeCount(count) => next.watched_count = count,
                FieldUpdate::RewatchCount(count) => next.rewatch_count = count,
                FieldUpdate::Rewatching(flag) => next.is_rewatching = flag,
                FieldUpdate::Score(score) => next.score = score,
                // dates are not part of the snapshot
                FieldUpdate::StartDate(_) | FieldUpdate::FinishDate(_) => {}
            }
        }
        next
    }
}
