use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::{StoreError, TokenStore};

/// Compare-and-delete executed server-side. Redis runs a script to completion
/// before serving any other command, so concurrent consumers of one key are
/// serialized and only the first sees the marker.
const CONSUME_SCRIPT: &str = r#"
    if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("DEL", KEYS[1])
    end
    return 0
"#;

/// Redis-backed token store shared by all serving instances.
#[derive(Clone)]
pub struct RedisTokenStore {
    redis: ConnectionManager,
    consume: redis::Script,
}

impl RedisTokenStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            consume: redis::Script::new(CONSUME_SCRIPT),
        }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        // PX keeps sub-second TTLs honest; Redis rejects a zero expiry.
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut conn = self.redis.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn atomic_consume(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.redis.clone();
        let removed: i64 = self
            .consume
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed == 1)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("unexpected PING reply: {}", pong)))
        }
    }
}
