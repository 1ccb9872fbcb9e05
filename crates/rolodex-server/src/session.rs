//! Login and current-user resolution.

use crate::auth::{
    create_access_token, validate_access_token, verify_dummy_password, verify_password, AuthError,
};
use crate::cache::{user_key, UserCache};
use crate::config::AuthConfig;
use anyhow::Result;
use async_trait::async_trait;
use rolodex_common::models::auth::UserProfile;
use rolodex_db::{UserRepo, UserRow};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

/// Read access to user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRow>>;
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRow>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>>;
}

#[async_trait]
impl UserStore for PgPool {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        UserRepo::get_by_username(self, username).await
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRow>> {
        UserRepo::get_by_id(self, user_id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        UserRepo::get_by_email(self, email).await
    }
}

/// Check credentials and issue an access token.
///
/// Unknown usernames and wrong passwords yield the same error.
pub async fn authenticate(
    store: &dyn UserStore,
    cfg: &AuthConfig,
    username: &str,
    password: &str,
) -> Result<String, AuthError> {
    let Some(user) = store.find_by_username(username).await? else {
        verify_dummy_password(password);
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        return Err(AuthError::InvalidCredentials);
    }
    if !user.confirmed {
        return Err(AuthError::EmailNotConfirmed);
    }

    Ok(create_access_token(user.user_id, &user.username, cfg)?)
}

/// Resolve the user behind an access token, reading through `cache`.
pub async fn resolve_current_user(
    store: &dyn UserStore,
    cache: &dyn UserCache,
    cfg: &AuthConfig,
    ttl: Duration,
    token: &str,
) -> Result<UserProfile, AuthError> {
    let claims = validate_access_token(token, cfg)?;
    let key = user_key(claims.id);

    match cache.get(&key).await {
        Ok(Some(raw)) => match serde_json::from_str::<UserProfile>(&raw) {
            Ok(profile) => return Ok(profile),
            Err(e) => tracing::warn!("Discarding undecodable cache entry {}: {}", key, e),
        },
        Ok(None) => {}
        Err(e) => tracing::warn!("User cache read failed for {}: {:#}", key, e),
    }

    let user = store
        .find_by_username(&claims.sub)
        .await?
        .ok_or(AuthError::InvalidToken)?;
    let profile = user.profile();

    match serde_json::to_string(&profile) {
        Ok(raw) => {
            if let Err(e) = cache.set(&key, raw, ttl).await {
                tracing::warn!("User cache write failed for {}: {:#}", key, e);
            }
        }
        Err(e) => tracing::warn!("Failed to serialize user {}: {}", key, e),
    }

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{create_email_token, hash_password};
    use crate::cache::MokaUserCache;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct FakeStore {
        users: Vec<UserRow>,
        lookups: AtomicUsize,
    }

    impl FakeStore {
        fn with_user(username: &str, password: &str, confirmed: bool) -> Self {
            let now = Utc::now();
            Self {
                users: vec![UserRow {
                    user_id: Uuid::new_v4(),
                    username: username.to_string(),
                    email: format!("{}@example.com", username),
                    password_hash: hash_password(password).unwrap(),
                    avatar: None,
                    role: "user".to_string(),
                    confirmed,
                    created_at: now,
                    updated_at: now,
                }],
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl UserStore for FakeStore {
        async fn find_by_username(&self, username: &str) -> Result<Option<UserRow>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.users.iter().find(|u| u.username == username).cloned())
        }
        async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRow>> {
            Ok(self.users.iter().find(|u| u.user_id == user_id).cloned())
        }
        async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>> {
            Ok(self.users.iter().find(|u| u.email == email).cloned())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl UserStore for FailingStore {
        async fn find_by_username(&self, _: &str) -> Result<Option<UserRow>> {
            anyhow::bail!("connection refused")
        }
        async fn find_by_id(&self, _: Uuid) -> Result<Option<UserRow>> {
            anyhow::bail!("connection refused")
        }
        async fn find_by_email(&self, _: &str) -> Result<Option<UserRow>> {
            anyhow::bail!("connection refused")
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl UserCache for BrokenCache {
        async fn get(&self, _: &str) -> Result<Option<String>> {
            anyhow::bail!("cache down")
        }
        async fn set(&self, _: &str, _: String, _: Duration) -> Result<()> {
            anyhow::bail!("cache down")
        }
        async fn remove(&self, _: &str) -> Result<()> {
            anyhow::bail!("cache down")
        }
    }

    #[derive(Default)]
    struct RecordingCache {
        writes: Mutex<Vec<(String, Duration)>>,
        inner: Mutex<Option<(String, String)>>,
    }

    #[async_trait]
    impl UserCache for RecordingCache {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner.as_ref().filter(|(k, _)| k == key).map(|(_, v)| v.clone()))
        }
        async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
            self.writes.lock().unwrap().push((key.to_string(), ttl));
            *self.inner.lock().unwrap() = Some((key.to_string(), value));
            Ok(())
        }
        async fn remove(&self, _: &str) -> Result<()> {
            *self.inner.lock().unwrap() = None;
            Ok(())
        }
    }

    fn cfg() -> AuthConfig {
        AuthConfig {
            jwt_secret: "session-test-secret".to_string(),
            jwt_algorithm: "HS256".to_string(),
            access_token_ttl_secs: 3600,
            email_token_ttl_secs: 604_800,
            initial_admin: None,
        }
    }

    const TTL: Duration = Duration::from_secs(500);

    #[tokio::test]
    async fn test_authenticate_confirmed_user() {
        let store = FakeStore::with_user("alice", "pw-alice", true);
        let token = authenticate(&store, &cfg(), "alice", "pw-alice").await.unwrap();
        let claims = validate_access_token(&token, &cfg()).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.id, store.users[0].user_id);
    }

    #[tokio::test]
    async fn test_unconfirmed_user_is_denied() {
        let store = FakeStore::with_user("bob", "pw-bob", false);
        let err = authenticate(&store, &cfg(), "bob", "pw-bob").await.unwrap_err();
        assert!(matches!(err, AuthError::EmailNotConfirmed));
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_password_look_the_same() {
        let store = FakeStore::with_user("carol", "pw-carol", true);
        let unknown = authenticate(&store, &cfg(), "nobody", "pw-carol")
            .await
            .unwrap_err();
        let wrong = authenticate(&store, &cfg(), "carol", "nope")
            .await
            .unwrap_err();
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_unknown_user_costs_a_password_verify() {
        let store = FakeStore::with_user("carol", "right", true);
        // Warm up the fixed hash so its one-off hashing is not timed.
        let _ = authenticate(&store, &cfg(), "nobody", "x").await;

        let started = Instant::now();
        for _ in 0..3 {
            let _ = authenticate(&store, &cfg(), "nobody", "x").await;
        }
        let unknown = started.elapsed();

        let started = Instant::now();
        for _ in 0..3 {
            let _ = authenticate(&store, &cfg(), "carol", "x").await;
        }
        let wrong = started.elapsed();

        assert!(
            wrong < unknown * 10 && unknown < wrong * 10,
            "unknown user took {:?}, wrong password took {:?}",
            unknown,
            wrong
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_internal() {
        let err = authenticate(&FailingStore, &cfg(), "x", "y").await.unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }

    #[tokio::test]
    async fn test_resolve_fills_cache_then_hits_it() {
        let store = FakeStore::with_user("dave", "pw", true);
        let cache = RecordingCache::default();
        let user_id = store.users[0].user_id;
        let token = create_access_token(user_id, "dave", &cfg()).unwrap();

        let first = resolve_current_user(&store, &cache, &cfg(), TTL, &token)
            .await
            .unwrap();
        let second = resolve_current_user(&store, &cache, &cfg(), TTL, &token)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
        let writes = cache.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0], (user_key(user_id), TTL));
    }

    #[tokio::test]
    async fn test_cached_and_fresh_records_are_identical() {
        let store = FakeStore::with_user("erin", "pw", true);
        let token = create_access_token(store.users[0].user_id, "erin", &cfg()).unwrap();

        let cache = MokaUserCache::new(10);
        let cached_path = {
            resolve_current_user(&store, &cache, &cfg(), TTL, &token)
                .await
                .unwrap();
            resolve_current_user(&store, &cache, &cfg(), TTL, &token)
                .await
                .unwrap()
        };
        let store_path = resolve_current_user(&store, &BrokenCache, &cfg(), TTL, &token)
            .await
            .unwrap();
        assert_eq!(cached_path, store_path);
        assert_eq!(store_path, store.users[0].profile());
    }

    #[tokio::test]
    async fn test_broken_cache_falls_back_to_store() {
        let store = FakeStore::with_user("frank", "pw", true);
        let token = create_access_token(store.users[0].user_id, "frank", &cfg()).unwrap();
        for _ in 0..2 {
            let profile = resolve_current_user(&store, &BrokenCache, &cfg(), TTL, &token)
                .await
                .unwrap();
            assert_eq!(profile.username, "frank");
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_undecodable_cache_entry_is_a_miss() {
        let store = FakeStore::with_user("gina", "pw", true);
        let user_id = store.users[0].user_id;
        let cache = MokaUserCache::new(10);
        cache
            .set(&user_key(user_id), "not json".to_string(), TTL)
            .await
            .unwrap();
        let token = create_access_token(user_id, "gina", &cfg()).unwrap();

        let profile = resolve_current_user(&store, &cache, &cfg(), TTL, &token)
            .await
            .unwrap();
        assert_eq!(profile.id, user_id);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_email_token_is_not_a_bearer_credential() {
        let store = FakeStore::with_user("hank", "pw", true);
        let token = create_email_token("hank@example.com", &cfg()).unwrap();
        let err = resolve_current_user(&store, &BrokenCache, &cfg(), TTL, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_token_for_deleted_user_is_invalid() {
        let store = FakeStore::default();
        let token = create_access_token(Uuid::new_v4(), "ghost", &cfg()).unwrap();
        let err = resolve_current_user(&store, &BrokenCache, &cfg(), TTL, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }
}
