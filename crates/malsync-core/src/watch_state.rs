// Watch-state machine: (episode | rating, snapshot) -> list mutations

use chrono::NaiveDate;
use malsync_models::{FieldUpdate, ListSnapshot, ListStatus, UpdatePlan};
use tracing::debug;

use crate::error::{Result, SyncError};

/// Compute the list mutations for a scrobble of MAL `episode`
///
/// `today` fills start/finish dates. The result depends only on the arguments,
/// so the same inputs always yield the same plan.
pub fn plan_update(
    mal_id: u64,
    episode: u32,
    snapshot: &ListSnapshot,
    today: NaiveDate,
) -> Result<UpdatePlan> {
    let total = snapshot.total_episodes;
    if snapshot.has_known_total() && episode > total {
        return Err(SyncError::EpisodeExceedsTotal { mal_id, episode, total });
    }

    let plan = if snapshot.status.is_completed() {
        plan_rewatch(episode, snapshot)
    } else {
        plan_first_watch(episode, snapshot, today)
    };

    debug!(
        "MAL {} episode {}/{} from {}: {:?}",
        mal_id, episode, total, snapshot.status, plan.fields
    );
    Ok(plan)
}

fn plan_rewatch(episode: u32, snapshot: &ListSnapshot) -> UpdatePlan {
    let in_progress = episode < snapshot.total_episodes || !snapshot.has_known_total();

    if in_progress {
        UpdatePlan {
            fields: vec![
                FieldUpdate::Status(ListStatus::Completed),
                FieldUpdate::EpisodeCount(episode),
                FieldUpdate::Rewatching(true),
            ],
            status: ListStatus::Completed,
            rewatch_count: snapshot.rewatch_count,
        }
    } else {
        let rewatch_count = snapshot.rewatch_count.saturating_add(1);
        UpdatePlan {
            fields: vec![
                FieldUpdate::Status(ListStatus::Completed),
                FieldUpdate::EpisodeCount(episode),
                FieldUpdate::Rewatching(false),
                FieldUpdate::RewatchCount(rewatch_count),
            ],
            status: ListStatus::Completed,
            rewatch_count,
        }
    }
}

fn plan_first_watch(episode: u32, snapshot: &ListSnapshot, today: NaiveDate) -> UpdatePlan {
    let total = snapshot.total_episodes;
    let mut status = snapshot.status;
    let mut start_date = None;
    let mut finish_date = None;

    if episode == total {
        status = ListStatus::Completed;
        finish_date = Some(today);
    }
    if episode == 1 && snapshot.watched_count == 0 {
        start_date = Some(today);
    }
    if (episode < total || total == 0) && episode >= 1 {
        status = ListStatus::Watching;
    }

    let mut fields = vec![FieldUpdate::Status(status), FieldUpdate::EpisodeCount(episode)];
    fields.extend(start_date.map(FieldUpdate::StartDate));
    fields.extend(finish_date.map(FieldUpdate::FinishDate));

    UpdatePlan {
        fields,
        status,
        rewatch_count: snapshot.rewatch_count,
    }
}

/// Single score mutation; status, progress and dates are left alone
pub fn plan_rating(rating: u8, snapshot: &ListSnapshot) -> UpdatePlan {
    UpdatePlan {
        fields: vec![FieldUpdate::Score(rating)],
        status: snapshot.status,
        rewatch_count: snapshot.rewatch_count,
    }
}
