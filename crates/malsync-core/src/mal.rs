use async_trait::async_trait;
use malsync_models::{ListSnapshot, UpdatePlan};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// The two MAL list operations the pipeline needs
///
/// Authentication, retries and rate limiting belong to the implementation.
#[async_trait]
pub trait MalClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn client_name(&self) -> &str;

    /// Current list entry for `mal_id`
    async fn fetch_list_entry(&self, mal_id: u64) -> Result<ListSnapshot, Self::Error>;

    /// Apply `plan` and return the entry as MAL reports it afterwards
    async fn apply_update(&self, mal_id: u64, plan: &UpdatePlan) -> Result<ListSnapshot, Self::Error>;
}

#[derive(Debug, Error)]
pub enum SnapshotStoreError {
    #[error("list entry {0} is unavailable")]
    Unavailable(u64),
}

/// In-memory list used for dry runs and tests
///
/// Unknown ids read as a fresh plan-to-watch entry with an unknown total.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    entries: Mutex<HashMap<u64, ListSnapshot>>,
    unavailable: HashSet<u64>,
    updates: Mutex<Vec<(u64, UpdatePlan)>>,
}

impl SnapshotStore {
    pub fn new(entries: HashMap<u64, ListSnapshot>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Default::default()
        }
    }

    /// Make every request for `mal_id` fail
    pub fn with_unavailable(mut self, mal_id: u64) -> Self {
        self.unavailable.insert(mal_id);
        self
    }

    pub async fn get(&self, mal_id: u64) -> Option<ListSnapshot> {
        self.entries.lock().await.get(&mal_id).cloned()
    }

    /// Plans applied so far, in order
    pub async fn applied_updates(&self) -> Vec<(u64, UpdatePlan)> {
        self.updates.lock().await.clone()
    }

    fn check_available(&self, mal_id: u64) -> Result<(), SnapshotStoreError> {
        if self.unavailable.contains(&mal_id) {
            return Err(SnapshotStoreError::Unavailable(mal_id));
        }
        Ok(())
    }
}

#[async_trait]
impl MalClient for SnapshotStore {
    type Error = SnapshotStoreError;

    fn client_name(&self) -> &str {
        "snapshot-store"
    }

    async fn fetch_list_entry(&self, mal_id: u64) -> Result<ListSnapshot, Self::Error> {
        self.check_available(mal_id)?;
        let entries = self.entries.lock().await;
        Ok(entries.get(&mal_id).cloned().unwrap_or_default())
    }

    async fn apply_update(&self, mal_id: u64, plan: &UpdatePlan) -> Result<ListSnapshot, Self::Error> {
        self.check_available(mal_id)?;
        let mut entries = self.entries.lock().await;
        let current = entries.get(&mal_id).cloned().unwrap_or_default();
        let next = plan.apply_to(&current);
        entries.insert(mal_id, next.clone());
        drop(entries);

        self.updates.lock().await.push((mal_id, plan.clone()));
        debug!("Applied {} field(s) to MAL {} in snapshot store", plan.fields.len(), mal_id);
        Ok(next)
    }
}
