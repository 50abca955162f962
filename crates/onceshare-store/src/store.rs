//! The storage contract the producer and recipient flows depend on

use async_trait::async_trait;
use onceshare_core::{EncryptedPayload, SecretId, ShareResult};

/// Remote (or local) holder of encrypted payloads.
///
/// Implementations must make `fetch_and_burn` atomic: concurrent calls for the
/// same id yield at most as many successes as the record has views, and every
/// other caller observes `SecretNotFound`.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Persist a payload. `expires_at` is a Unix timestamp in seconds;
    /// `max_views` below one is treated as one.
    async fn create(
        &self,
        payload: EncryptedPayload,
        expires_at: u64,
        max_views: u32,
    ) -> ShareResult<SecretId>;

    /// Return the payload and consume one view, purging the record on the last one.
    ///
    /// Missing, expired, and exhausted records all return `SecretNotFound`.
    async fn fetch_and_burn(&self, id: &SecretId) -> ShareResult<EncryptedPayload>;
}
