use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::store::{StoreError, TokenStore};

/// Value stored under every freshly issued token.
pub const UNUSED_MARKER: &str = "0";

/// Opaque single-use token. The value doubles as its store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Mints tokens and registers them in the store with a TTL.
#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn TokenStore>,
    ttl: Duration,
    prefix: String,
}

impl TokenIssuer {
    pub fn new(store: Arc<dyn TokenStore>, ttl: Duration, prefix: impl Into<String>) -> Self {
        Self {
            store,
            ttl,
            prefix: prefix.into(),
        }
    }

    pub fn from_config(store: Arc<dyn TokenStore>, cfg: &Config) -> Self {
        Self::new(store, cfg.token_ttl(), cfg.token_prefix.clone())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generate a new token and store it as unused. On a store failure no
    /// token is returned.
    #[tracing::instrument(skip(self))]
    pub async fn issue(&self) -> Result<Token, StoreError> {
        let token = Token(format!("{}{}", self.prefix, Uuid::new_v4()));

        if let Err(e) = self.store.put(token.as_str(), UNUSED_MARKER, self.ttl).await {
            tracing::error!(error = %e, "failed to register token");
            return Err(e);
        }

        tracing::debug!(ttl_secs = self.ttl.as_secs(), "token issued");
        Ok(token)
    }
}
