use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{StoreError, TokenStore};

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process token store backed by a `DashMap`.
///
/// Check-and-remove happens under the shard lock via `remove_if`, so the
/// single-consumer guarantee holds across tasks and threads of one process.
/// Expired entries are never reported as present; they linger until
/// [`evict_expired`](Self::evict_expired) runs.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all expired entries. Call this periodically from a background
    /// task to bound memory usage.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| StoreError::Unavailable(format!("ttl {:?} out of range", ttl)))?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn atomic_consume(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(key, |_, entry| entry.expires_at > now && entry.value == expected);
        Ok(removed.is_some())
    }
}
