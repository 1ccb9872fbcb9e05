use crate::avatar::{AvatarStore, CloudinaryStore};
use crate::cache::{MokaUserCache, UserCache};
use crate::config::ServerConfig;
use crate::mailer::{HttpMailer, LogMailer, Mailer};
use crate::rate_limit::RateLimiter;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<ServerConfig>,
    pub cache: Arc<dyn UserCache>,
    pub mailer: Arc<dyn Mailer>,
    /// None when avatar uploads are not configured
    pub avatars: Option<Arc<dyn AvatarStore>>,
    pub me_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Build state with the backends selected by `config`
    pub fn new(pool: PgPool, config: ServerConfig) -> Self {
        let cache: Arc<dyn UserCache> = Arc::new(MokaUserCache::new(config.cache.max_capacity));
        let mailer: Arc<dyn Mailer> = match &config.mail {
            Some(mail) => Arc::new(HttpMailer::new(mail.clone())),
            None => Arc::new(LogMailer),
        };
        let avatars = config
            .avatar
            .clone()
            .map(|cfg| Arc::new(CloudinaryStore::new(cfg)) as Arc<dyn AvatarStore>);
        let me_limiter = Arc::new(RateLimiter::per_minute(config.rate_limit.me_per_minute));

        Self {
            pool,
            config: Arc::new(config),
            cache,
            mailer,
            avatars,
            me_limiter,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn UserCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_avatar_store(mut self, avatars: Arc<dyn AvatarStore>) -> Self {
        self.avatars = Some(avatars);
        self
    }

    /// How long a resolved user stays in the cache
    pub fn user_ttl(&self) -> Duration {
        Duration::from_secs(self.config.cache.user_ttl_secs)
    }
}
