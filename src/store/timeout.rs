use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{StoreError, TokenStore};

/// Bounds every call on the wrapped store. An elapsed call is reported as
/// [`StoreError::Timeout`], never as an answer.
#[derive(Clone)]
pub struct TimeoutStore {
    inner: Arc<dyn TokenStore>,
    timeout: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn TokenStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.timeout.as_millis() as u64, "token store call timed out");
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl TokenStore for TimeoutStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.bounded("put", self.inner.put(key, value, ttl)).await
    }

    async fn atomic_consume(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.bounded("atomic_consume", self.inner.atomic_consume(key, expected))
            .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded("ping", self.inner.ping()).await
    }
}
