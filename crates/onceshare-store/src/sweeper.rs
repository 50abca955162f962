//! Background expiry sweep

use onceshare_core::unix_now;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::memory::MemoryStore;

/// Purge expired records every `interval` until `cancel` fires.
pub fn spawn_sweeper(
    store: Arc<MemoryStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("expiry sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let purged = store.sweep_expired(unix_now()).await;
                    if purged > 0 {
                        debug!(purged, "expired secrets swept");
                    }
                }
            }
        }
    })
}
