//! Redis-backed request counters

use std::time::Duration;

use async_trait::async_trait;
use redis::{Client, Script};

use super::rate_limit::RequestCounter;
use crate::error::{AppError, AppResult};

/// Counts a hit and arms the window expiry in one atomic step. A key left
/// without a TTL gets one on its next hit.
const HIT_SCRIPT: &str = r"
local hits = redis.call('INCR', KEYS[1])
if hits == 1 or redis.call('PTTL', KEYS[1]) < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return hits
";

#[derive(Clone)]
pub struct RedisCounter {
    client: Client,
    script: Script,
}

impl RedisCounter {
    /// Create a new Redis counter and check the server answers
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(Self {
            client,
            script: Script::new(HIT_SCRIPT),
        })
    }
}

fn window_millis(window: Duration) -> AppResult<i64> {
    i64::try_from(window.as_millis())
        .map_err(|_| AppError::Internal(format!("Rate limit window too large: {:?}", window)))
}

#[async_trait]
impl RequestCounter for RedisCounter {
    async fn hit(&self, key: &str, window: Duration) -> AppResult<u64> {
        let window_ms = window_millis(window)?;

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))?;

        self.script
            .key(format!("rate_limit:{}", key))
            .arg(window_ms)
            .invoke_async::<_, u64>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to count request in Redis: {}", e)))
    }
}
