//! Background expiry sweep.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::cache::ResponseCache;

/// Periodically drops expired entries until shutdown.
pub struct CacheSweeper {
    cache: Arc<ResponseCache>,
    interval: Duration,
}

impl CacheSweeper {
    pub fn new(cache: Arc<ResponseCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Cache sweeper starting");

        let mut ticker = time::interval(self.interval);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = self.cache.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, "Purged expired cache entries");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
