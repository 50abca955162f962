//! In-process store with atomic fetch-and-burn.
//!
//! All mutations go through one async mutex, so the read, the view decrement,
//! and the purge of a record happen as a single step. Terminal records are
//! removed on the spot; the sweeper only has to deal with secrets that expire
//! without ever being fetched.

use async_trait::async_trait;
use onceshare_core::{unix_now, EncryptedPayload, SecretId, SecretRecord, ShareError, ShareResult};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::lifecycle::{self, FetchOutcome};
use crate::store::SecretStore;

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<SecretId, SecretRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held (live or awaiting the sweeper).
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Fetch-and-burn evaluated at an explicit Unix time.
    pub async fn fetch_and_burn_at(&self, id: &SecretId, now: u64) -> ShareResult<EncryptedPayload> {
        let mut records = self.records.lock().await;

        let Some(record) = records.get_mut(id) else {
            return Err(ShareError::SecretNotFound);
        };

        match lifecycle::fetch(record, now) {
            FetchOutcome::Deliver { payload, state } => {
                if state.is_terminal() {
                    records.remove(id);
                }
                debug!(state = ?state, "secret delivered");
                Ok(payload)
            }
            FetchOutcome::Gone(state) => {
                records.remove(id);
                debug!(state = ?state, "secret purged on fetch");
                Err(ShareError::SecretNotFound)
            }
        }
    }

    /// Drop every record whose expiry has passed. Returns how many were purged.
    pub async fn sweep_expired(&self, now: u64) -> usize {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| !lifecycle::state_at(record, now).is_terminal());
        before - records.len()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn create(
        &self,
        payload: EncryptedPayload,
        expires_at: u64,
        max_views: u32,
    ) -> ShareResult<SecretId> {
        let mut records = self.records.lock().await;

        // Ids are random; a collision would silently replace a live secret.
        let mut id = SecretId::generate();
        while records.contains_key(&id) {
            id = SecretId::generate();
        }

        let record = lifecycle::new_record(id, payload, expires_at, max_views);
        debug!(
            expires_at = record.expires_at,
            views = record.remaining_views,
            "secret created"
        );
        records.insert(id, record);
        Ok(id)
    }

    async fn fetch_and_burn(&self, id: &SecretId) -> ShareResult<EncryptedPayload> {
        self.fetch_and_burn_at(id, unix_now()).await
    }
}
