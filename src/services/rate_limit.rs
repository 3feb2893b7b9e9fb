//! Fixed-window request throttling

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    config::RateLimitConfig,
    error::{AppError, AppResult},
};

/// Keyed hit counter whose entries expire after a window
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestCounter: Send + Sync {
    /// Record a hit on `key` and return the number of hits in its current window
    async fn hit(&self, key: &str, window: Duration) -> AppResult<u64>;
}

/// Expired entries of other keys are swept once per this many hits
const SWEEP_EVERY: u64 = 1024;

#[derive(Default)]
struct Windows {
    entries: HashMap<String, (u64, Instant)>,
    hits_since_sweep: u64,
}

/// Counter kept in process memory
pub struct MemoryCounter {
    windows: Mutex<Windows>,
    sweep_every: u64,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(Windows::default()),
            sweep_every: SWEEP_EVERY,
        }
    }
}

impl Default for MemoryCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestCounter for MemoryCounter {
    async fn hit(&self, key: &str, window: Duration) -> AppResult<u64> {
        let now = Instant::now();
        let mut guard = self.windows.lock().await;
        let windows = &mut *guard;

        windows.hits_since_sweep += 1;
        if windows.hits_since_sweep >= self.sweep_every {
            windows
                .entries
                .retain(|_, (_, started)| now.duration_since(*started) < window);
            windows.hits_since_sweep = 0;
        }

        let entry = windows.entries.entry(key.to_string()).or_insert((0, now));
        if now.duration_since(entry.1) >= window {
            *entry = (0, now);
        }
        entry.0 += 1;
        Ok(entry.0)
    }
}

/// Rejects requests beyond `max_requests` per key and window
#[derive(Clone)]
pub struct RateLimiter {
    counter: Arc<dyn RequestCounter>,
    window: Duration,
    max_requests: u64,
}

impl RateLimiter {
    pub fn new(counter: Arc<dyn RequestCounter>, config: &RateLimitConfig) -> Self {
        Self {
            counter,
            window: Duration::from_millis(config.window_ms),
            max_requests: config.max_requests,
        }
    }

    pub async fn check(&self, key: &str) -> AppResult<()> {
        let hits = self.counter.hit(key, self.window).await?;
        if hits > self.max_requests {
            tracing::warn!(key, hits, "Rate limit exceeded");
            return Err(AppError::TooManyRequests(
                "Too many requests, please try again later".to_string(),
            ));
        }
        Ok(())
    }
}
