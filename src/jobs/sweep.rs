//! Background job: evict expired tokens from the in-process store.
//!
//! Redis reclaims expired keys on its own; only `MemoryTokenStore` needs this.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

use crate::store::MemoryTokenStore;

/// How often the memory store is swept.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn the background sweep task. Call this once at startup.
pub fn spawn(store: MemoryTokenStore, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        loop {
            interval.tick().await;
            let evicted = store.evict_expired();
            if evicted > 0 {
                tracing::debug!(evicted, remaining = store.len(), "swept expired tokens");
            }
        }
    })
}
