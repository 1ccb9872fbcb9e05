use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Key-value cache holding serialized current-user records.
///
/// Implementations may fail; callers treat any failure as a miss.
#[async_trait]
pub trait UserCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Cache key of a user record
pub fn user_key(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Each entry lives for the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process cache backed by moka
pub struct MokaUserCache {
    inner: Cache<String, Entry>,
}

impl MokaUserCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

#[async_trait]
impl UserCache for MokaUserCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.get(key).await.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.inner.insert(key.to_string(), Entry { value, ttl }).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_key_format() {
        let id = Uuid::parse_str("6f1c2d3e-0000-4000-8000-000000000001").unwrap();
        assert_eq!(user_key(id), "user:6f1c2d3e-0000-4000-8000-000000000001");
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let cache = MokaUserCache::new(100);
        assert!(cache.get("user:a").await.unwrap().is_none());

        cache
            .set("user:a", "{\"x\":1}".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("user:a").await.unwrap().as_deref(), Some("{\"x\":1}"));

        cache.remove("user:a").await.unwrap();
        assert!(cache.get("user:a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let cache = MokaUserCache::new(100);
        cache.set("k", "one".to_string(), Duration::from_secs(60)).await.unwrap();
        cache.set("k", "two".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_entry_expires_after_its_ttl() {
        let cache = MokaUserCache::new(100);
        cache
            .set("short", "v".to_string(), Duration::from_millis(50))
            .await
            .unwrap();
        cache
            .set("long", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(cache.get("short").await.unwrap().is_none());
        assert!(cache.get("long").await.unwrap().is_some());
    }
}
