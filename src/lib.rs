//! Idempotent: single-use tokens that guard mutating routes against
//! duplicate execution from client retries and double submits.
//!
//! Library crate shared by the binary and the integration tests in `tests/`.

pub mod api;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod middleware;
pub mod response;
pub mod store;
pub mod token;

use std::sync::Arc;

use middleware::idempotency::IdempotencyGuard;
use store::TokenStore;
use token::TokenIssuer;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub store: Arc<dyn TokenStore>,
    pub issuer: TokenIssuer,
    pub guard: Arc<IdempotencyGuard>,
    pub config: config::Config,
}

impl AppState {
    /// Wire the issuer and guard to one store handle.
    pub fn new(config: config::Config, store: Arc<dyn TokenStore>) -> Arc<Self> {
        Arc::new(Self {
            issuer: TokenIssuer::from_config(store.clone(), &config),
            guard: Arc::new(IdempotencyGuard::from_config(store.clone(), &config)),
            store,
            config,
        })
    }
}
