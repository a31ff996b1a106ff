use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderName;

/// Longest lifetime a token may be issued with (one day).
pub const MAX_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

/// Backend holding token state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Shared Redis instance. Required when more than one process serves traffic.
    Redis,
    /// In-process map. Only correct for a single serving process.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("unknown store backend '{}': expected 'redis' or 'memory'", other),
        }
    }
}

/// User-facing text carried in the response envelope for each reject kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages {
    pub illegal_argument: String,
    pub repetitive_operation: String,
    pub storage_unavailable: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            illegal_argument: "illegal argument".into(),
            repetitive_operation: "repetitive operation, please do not resubmit".into(),
            storage_unavailable: "token store unavailable, please retry later".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub store_backend: StoreBackend,
    /// Lifetime of an issued, unconsumed token.
    /// Set via IDEMPOTENT_TOKEN_TTL_SECS env var. Default: 60.
    pub token_ttl_secs: u64,
    /// Header name checked first, then query/form parameter of the same name.
    pub token_name: String,
    /// Namespace prepended to every issued token (and therefore every store key).
    pub token_prefix: String,
    /// Upper bound on a single store round-trip. Elapsed = store unavailable.
    pub store_timeout_ms: u64,
    pub messages: Messages,
}

impl Config {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            redis_url: "redis://127.0.0.1:6379".into(),
            store_backend: StoreBackend::Redis,
            token_ttl_secs: 60,
            token_name: "token".into(),
            token_prefix: "idempotent:token:".into(),
            store_timeout_ms: 500,
            messages: Messages::default(),
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

/// Build a config from an arbitrary variable lookup. Unparseable numbers fall
/// back to their defaults; values that would make the guard unsafe are errors.
pub fn load_from<F>(var: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();
    let default_messages = defaults.messages.clone();

    let store_backend = match var("IDEMPOTENT_STORE") {
        Some(v) if !v.trim().is_empty() => v.parse()?,
        _ => defaults.store_backend,
    };

    let token_ttl_secs = var("IDEMPOTENT_TOKEN_TTL_SECS")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(defaults.token_ttl_secs);
    if token_ttl_secs == 0 || token_ttl_secs > MAX_TOKEN_TTL_SECS {
        anyhow::bail!(
            "IDEMPOTENT_TOKEN_TTL_SECS must be between 1 and {}, got {}",
            MAX_TOKEN_TTL_SECS,
            token_ttl_secs
        );
    }

    let store_timeout_ms = var("IDEMPOTENT_STORE_TIMEOUT_MS")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(defaults.store_timeout_ms);
    if store_timeout_ms == 0 {
        anyhow::bail!("IDEMPOTENT_STORE_TIMEOUT_MS must be greater than zero");
    }

    let token_name = var("IDEMPOTENT_TOKEN_NAME")
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or(defaults.token_name);
    if HeaderName::from_str(&token_name).is_err() {
        anyhow::bail!("IDEMPOTENT_TOKEN_NAME '{}' is not a valid header name", token_name);
    }

    Ok(Config {
        port: var("IDEMPOTENT_PORT")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.port),
        redis_url: var("REDIS_URL").unwrap_or(defaults.redis_url),
        store_backend,
        token_ttl_secs,
        token_name,
        token_prefix: var("IDEMPOTENT_TOKEN_PREFIX").unwrap_or(defaults.token_prefix),
        store_timeout_ms,
        messages: Messages {
            illegal_argument: var("IDEMPOTENT_MSG_ILLEGAL_ARGUMENT")
                .unwrap_or(default_messages.illegal_argument),
            repetitive_operation: var("IDEMPOTENT_MSG_REPETITIVE_OPERATION")
                .unwrap_or(default_messages.repetitive_operation),
            storage_unavailable: var("IDEMPOTENT_MSG_STORAGE_UNAVAILABLE")
                .unwrap_or(default_messages.storage_unavailable),
        },
    })
}
