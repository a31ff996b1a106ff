//! Test doubles for the token store.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use idempotent::store::{MemoryTokenStore, StoreError, TokenStore};

/// Memory store that counts every call reaching it.
#[derive(Clone, Default)]
pub struct CountingStore {
    pub inner: MemoryTokenStore,
    pub puts: Arc<AtomicUsize>,
    pub consumes: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst) + self.consumes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenStore for CountingStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, value, ttl).await
    }

    async fn atomic_consume(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.consumes.fetch_add(1, Ordering::SeqCst);
        self.inner.atomic_consume(key, expected).await
    }
}

/// Store whose backend is unreachable.
pub struct UnreachableStore;

#[async_trait]
impl TokenStore for UnreachableStore {
    async fn put(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn atomic_consume(&self, _: &str, _: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// Store that answers only after `delay`.
pub struct SlowStore {
    pub inner: MemoryTokenStore,
    pub delay: Duration,
}

#[async_trait]
impl TokenStore for SlowStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner.put(key, value, ttl).await
    }

    async fn atomic_consume(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.atomic_consume(key, expected).await
    }
}
