use moka::future::Cache;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fixed-window request counter per key.
///
/// A window opens on the first request for a key and closes `window` later.
pub struct RateLimiter {
    limit: u32,
    counters: Cache<String, Arc<AtomicU32>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            counters: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(window)
                .build(),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Count a request for `key`. Returns false once the limit is exceeded.
    pub async fn check(&self, key: &str) -> bool {
        let counter = self
            .counters
            .get_with(key.to_string(), async { Arc::new(AtomicU32::new(0)) })
            .await;
        counter.fetch_add(1, Ordering::SeqCst) < self.limit
    }
}
