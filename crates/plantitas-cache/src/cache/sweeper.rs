//! Periodic removal of expired entries.

use super::traits::CacheStore;
use crate::cancel::CancellationToken;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawn a background task that purges expired entries every `interval`.
///
/// The first sweep runs after one full interval. The task exits once
/// `token` is cancelled; an in-flight purge is allowed to finish.
pub fn spawn_sweeper(
    store: Arc<dyn CacheStore>,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache expiry sweeper (interval: {:?})", interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let store = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || store.purge_expired()).await {
                Ok(Ok(purged)) => debug!("Expiry sweep removed {} entries", purged),
                Ok(Err(e)) => warn!("Expiry sweep failed: {}", e),
                Err(e) => warn!("Expiry sweep task panicked: {}", e),
            }
        }

        info!("Cache expiry sweeper stopped");
    })
}
