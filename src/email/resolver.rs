use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::EmailConfig;
use crate::clock::DynClock;
use crate::settings::DynSettingsStore;

pub const DEFAULT_CONFIG_TTL_SECONDS: i64 = 60;

struct CachedConfig {
    config: Arc<EmailConfig>,
    fetched_at: DateTime<Utc>,
}

/// Resolves the email configuration from site settings, caching it for a
/// fixed TTL.
pub struct EmailConfigService {
    store: DynSettingsStore,
    clock: DynClock,
    ttl: Duration,
    cache: RwLock<Option<CachedConfig>>,
}

impl EmailConfigService {
    pub fn new(store: DynSettingsStore, clock: DynClock) -> Self {
        Self::with_ttl(store, clock, Duration::seconds(DEFAULT_CONFIG_TTL_SECONDS))
    }

    pub fn with_ttl(store: DynSettingsStore, clock: DynClock, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            cache: RwLock::new(None),
        }
    }

    /// Returns the cached config while it is fresh. A settings read failure
    /// yields the built-in defaults, which are not cached.
    pub async fn get_config(&self) -> Arc<EmailConfig> {
        let now = self.clock.now();

        if let Some(cached) = self.cache.read().await.as_ref()
            && now - cached.fetched_at < self.ttl
        {
            return cached.config.clone();
        }

        match self.store.load().await {
            Ok(settings) => {
                debug!("Refreshing email configuration from settings");
                let config = Arc::new(EmailConfig::from_settings(&settings.email));
                *self.cache.write().await = Some(CachedConfig {
                    config: config.clone(),
                    fetched_at: now,
                });
                config
            }
            Err(e) => {
                warn!("Failed to read email settings, using defaults: {}", e);
                Arc::new(EmailConfig::default())
            }
        }
    }

    pub async fn clear_cache(&self) {
        *self.cache.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::email::ProviderKind;
    use crate::settings::{MemorySettingsStore, SettingsStore, SiteSettings};

    fn settings_with_provider(provider: &str) -> SiteSettings {
        let mut settings = SiteSettings::default();
        settings.email.email_provider = Some(provider.to_string());
        settings
    }

    fn service(store: Arc<MemorySettingsStore>, clock: Arc<ManualClock>) -> EmailConfigService {
        EmailConfigService::new(store, clock)
    }

    #[tokio::test]
    async fn test_config_is_cached_within_ttl() {
        let store = Arc::new(MemorySettingsStore::new(settings_with_provider("sendgrid")));
        let clock = Arc::new(ManualClock::default());
        let service = service(store.clone(), clock.clone());

        let first = service.get_config().await;
        clock.advance(Duration::seconds(59));
        let second = service.get_config().await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.read_count(), 1);
        assert_eq!(first.provider, ProviderKind::Sendgrid);
    }

    #[tokio::test]
    async fn test_config_is_refreshed_after_ttl() {
        let store = Arc::new(MemorySettingsStore::new(settings_with_provider("sendgrid")));
        let clock = Arc::new(ManualClock::default());
        let service = service(store.clone(), clock.clone());

        let first = service.get_config().await;
        store.save(&settings_with_provider("gmail")).await.unwrap();
        clock.advance(Duration::seconds(60));
        let second = service.get_config().await;

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(store.read_count(), 2);
        assert_eq!(second.provider, ProviderKind::Gmail);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_fresh_read() {
        let store = Arc::new(MemorySettingsStore::new(settings_with_provider("smtp")));
        let clock = Arc::new(ManualClock::default());
        let service = service(store.clone(), clock.clone());

        service.get_config().await;
        store.save(&settings_with_provider("gmail")).await.unwrap();
        service.clear_cache().await;
        let config = service.get_config().await;

        assert_eq!(store.read_count(), 2);
        assert_eq!(config.provider, ProviderKind::Gmail);
    }

    #[tokio::test]
    async fn test_read_failure_returns_uncached_defaults() {
        let store = Arc::new(MemorySettingsStore::new(settings_with_provider("gmail")));
        store.set_failing(true);
        let clock = Arc::new(ManualClock::default());
        let service = service(store.clone(), clock.clone());

        let config = service.get_config().await;
        assert_eq!(*config, EmailConfig::default());

        store.set_failing(false);
        let config = service.get_config().await;
        assert_eq!(config.provider, ProviderKind::Gmail);
        assert_eq!(store.read_count(), 2);
    }
}
