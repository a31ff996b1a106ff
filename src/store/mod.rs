//! Token store: TTL-aware key/value substrate shared by every serving instance.
//!
//! The whole no-double-admission guarantee rests on [`TokenStore::atomic_consume`]:
//! each backend implements it as one indivisible operation at the storage layer,
//! never as a read followed by a delete.
//!
//! ## Backends
//!
//! - [`RedisTokenStore`]: shared Redis; the only choice for multi-instance deployments.
//! - [`MemoryTokenStore`]: in-process `DashMap`; single process and tests.
//! - [`TimeoutStore`]: wraps any backend and bounds each call.
//!
//! ## Key pattern
//!
//! ```text
//! idempotent:token:{uuid}   → "0" (unused marker, expires after the token TTL)
//! ```

mod memory;
mod redis_store;
mod timeout;

pub use memory::MemoryTokenStore;
pub use redis_store::RedisTokenStore;
pub use timeout::TimeoutStore;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Every variant means the store could not give an answer. Callers must fail
/// closed: none of these may be read as "token absent" or "token present".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Create a fresh entry that expires after `ttl`. The caller guarantees
    /// `key` has never been used.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Remove `key` if it is present, unexpired and still holds `expected`,
    /// in a single indivisible step. Returns whether it was removed.
    ///
    /// Among any number of concurrent callers for the same key, at most one
    /// observes `true`.
    async fn atomic_consume(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Readiness check.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
