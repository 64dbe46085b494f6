// Webhook processor: filter -> normalize -> resolve -> plan -> apply

use chrono::NaiveDate;
use futures::future::join_all;
use malsync_config::WebhookConfig;
use malsync_models::{
    AnimeUpdateFailed, AnimeUpdateSuccess, CanonicalEvent, ListSnapshot, ResolvedMapping,
    WebhookEnvelope, WebhookEventType,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::adapter;
use crate::error::SyncError;
use crate::mal::MalClient;
use crate::mapping_table::MappingTable;
use crate::metadata::AnimeMetadataLookup;
use crate::resolver;
use crate::watch_state;

/// Idle per-title locks are dropped once the map grows past this
const LOCK_PRUNE_THRESHOLD: usize = 256;

/// Result of processing one webhook delivery
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Filtered out before normalization
    Ignored { reason: String },
    /// No mapping for the event; expected for titles left out of the table
    Skipped { event: CanonicalEvent, reason: String },
    Updated(AnimeUpdateSuccess),
    Failed(AnimeUpdateFailed),
}

impl ProcessOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, ProcessOutcome::Updated(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProcessOutcome::Failed(_))
    }
}

/// What a delivery asks the pipeline to do once it passed the filters
enum Action {
    Scrobble,
    Rate(u8),
}

/// Change to apply to the resolved title
#[derive(Clone, Copy)]
enum Change {
    Episode(u32),
    Score(u8),
}

pub struct WebhookProcessor<C, M> {
    client: Arc<C>,
    mappings: Arc<MappingTable>,
    metadata: Arc<M>,
    config: WebhookConfig,
    locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl<C, M> WebhookProcessor<C, M>
where
    C: MalClient,
    M: AnimeMetadataLookup,
{
    pub fn new(
        client: Arc<C>,
        mappings: Arc<MappingTable>,
        metadata: Arc<M>,
        config: WebhookConfig,
    ) -> Self {
        Self {
            client,
            mappings,
            metadata,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run one delivery through the pipeline; `today` dates start/finish fields
    #[instrument(skip_all, fields(account = %envelope.account, title = ?envelope.media.title))]
    pub async fn process(&self, envelope: &WebhookEnvelope, today: NaiveDate) -> ProcessOutcome {
        let action = match self.filter(envelope) {
            Ok(action) => action,
            Err(reason) => {
                debug!("Ignoring delivery: {}", reason);
                return ProcessOutcome::Ignored { reason };
            }
        };

        let Some(kind) = envelope.media.media_kind() else {
            let reason = format!("media type '{}' is not an episode or movie", envelope.media.media_type);
            debug!("Ignoring delivery: {}", reason);
            return ProcessOutcome::Ignored { reason };
        };

        let raw = envelope.media.raw_identifier();
        let event = match adapter::normalize(&raw, kind, envelope, self.metadata.as_ref()) {
            Ok(event) => event,
            Err(err) => return failed(None, raw.to_string(), err),
        };

        let resolved = match action {
            Action::Scrobble => resolver::resolve_episode(&event, &self.mappings)
                .map(|(resolved, episode)| (resolved, Change::Episode(episode))),
            Action::Rate(score) => {
                resolver::resolve(&event, &self.mappings).map(|resolved| (resolved, Change::Score(score)))
            }
        };
        let (resolved, change) = match resolved {
            Ok(resolved) => resolved,
            Err(err) if err.is_skip() => {
                warn!("Skipping {}: {}", event, err);
                return ProcessOutcome::Skipped {
                    event,
                    reason: err.to_string(),
                };
            }
            Err(err) => return failed(Some(event), raw.to_string(), err),
        };

        let lock = self.lock_for(resolved.mal_id).await;
        let _guard = lock.lock().await;

        match self.sync_entry(&resolved, change, today).await {
            Ok(success) => {
                info!(
                    "Updated MAL {} '{}' ({} field(s), status {})",
                    success.mal_id,
                    success.title,
                    success.plan.fields.len(),
                    success.plan.status
                );
                ProcessOutcome::Updated(success)
            }
            Err(err) => failed(Some(event), raw.to_string(), err),
        }
    }

    /// Process several deliveries concurrently; outcomes keep the input order
    pub async fn process_batch(&self, envelopes: &[WebhookEnvelope], today: NaiveDate) -> Vec<ProcessOutcome> {
        join_all(envelopes.iter().map(|envelope| self.process(envelope, today))).await
    }

    fn filter(&self, envelope: &WebhookEnvelope) -> Result<Action, String> {
        let action = match &envelope.event_type {
            WebhookEventType::Scrobble => Action::Scrobble,
            WebhookEventType::Rate if !self.config.sync_ratings => {
                return Err("rating sync is disabled".to_string());
            }
            WebhookEventType::Rate => match envelope.score() {
                Some(score) => Action::Rate(score),
                None => return Err("rating event without a rating".to_string()),
            },
            WebhookEventType::Other(name) => {
                return Err(format!("event '{}' is not handled", name));
            }
        };

        if !self.config.allows_account(&envelope.account) {
            return Err(format!("account '{}' is not allowed", envelope.account));
        }
        if !self.config.allows_library(envelope.library.as_deref()) {
            return Err(format!(
                "library '{}' is not allowed",
                envelope.library.as_deref().unwrap_or("<none>")
            ));
        }
        Ok(action)
    }

    /// Fetch, plan and apply for one title; the caller holds the title's lock
    async fn sync_entry(
        &self,
        resolved: &ResolvedMapping,
        change: Change,
        today: NaiveDate,
    ) -> Result<AnimeUpdateSuccess, SyncError> {
        let mal_id = resolved.mal_id;
        let snapshot = self
            .client
            .fetch_list_entry(mal_id)
            .await
            .map_err(|e| SyncError::Client(anyhow::Error::new(e)))?;

        let (plan, episode, rating) = match change {
            Change::Episode(episode) => (
                watch_state::plan_update(mal_id, episode, &snapshot, today)?,
                Some(episode),
                None,
            ),
            Change::Score(score) => (watch_state::plan_rating(score, &snapshot), None, Some(score)),
        };

        debug!("Sending plan for MAL {} via {}: {:?}", mal_id, self.client.client_name(), plan.form_params());
        let updated = self
            .client
            .apply_update(mal_id, &plan)
            .await
            .map_err(|e| SyncError::Client(anyhow::Error::new(e)))?;

        Ok(AnimeUpdateSuccess {
            mal_id,
            title: pick_title(&updated, &snapshot, resolved),
            picture_url: updated.picture_url.clone().or_else(|| snapshot.picture_url.clone()),
            episode,
            rating,
            plan,
            snapshot: updated,
        })
    }

    async fn lock_for(&self, mal_id: u64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        if locks.len() > LOCK_PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks.entry(mal_id).or_default().clone()
    }
}

fn pick_title(updated: &ListSnapshot, before: &ListSnapshot, resolved: &ResolvedMapping) -> String {
    [&updated.title, &before.title, &resolved.title]
        .into_iter()
        .find(|title| !title.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("MAL {}", resolved.mal_id))
}

fn failed(event: Option<CanonicalEvent>, identifier: String, err: SyncError) -> ProcessOutcome {
    let kind = err.kind();
    match &event {
        Some(event) => error!("Failed to sync {} ({}): {}", event, kind, err),
        None => error!("Failed to normalize '{}' ({}): {}", identifier, kind, err),
    }
    ProcessOutcome::Failed(AnimeUpdateFailed {
        event,
        identifier,
        error_kind: kind,
        message: err.to_string(),
    })
}
