use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use reqwest::Client;
use tokio::sync::Mutex;
use tokio::sync::RwLock;

use crate::config::AuthConfig;
use crate::config::KeySourceConfig;
use crate::error::Error;
use crate::error::LoadError;
use crate::error::Result;
use crate::key_set::KeySet;
use crate::source::KeySetSource;
use crate::source::RemoteSource;
use crate::source::StaticSource;

#[derive(Clone)]
struct CachedKeySet {
    key_set: Arc<KeySet>,
    loaded_at: DateTime<Utc>,
}

impl CachedKeySet {
    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        // A load stamped in the future is treated as fresh
        match now.signed_duration_since(self.loaded_at).to_std() {
            Ok(age) => age >= ttl,
            Err(_) => false,
        }
    }
}

#[derive(Default)]
struct CacheState {
    cached: Option<CachedKeySet>,
    last_refresh_error: Option<String>,
}

/// Point-in-time view of the cache, for observability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    /// When the served key set was loaded, `None` before the first load
    pub last_loaded_at: Option<DateTime<Utc>>,
    /// Error of the most recent failed load since the last success
    pub last_refresh_error: Option<String>,
    /// Whether a refresh is currently in flight
    pub refreshing: bool,
}

struct Inner {
    source: Arc<dyn KeySetSource>,
    ttl: Option<Duration>,
    fetch_timeout: Duration,
    state: RwLock<CacheState>,
    /// Serializes the first, blocking load
    initial_load: Mutex<()>,
    /// Set while a refresh is in flight
    refreshing: AtomicBool,
}

/// Clears the in-flight marker when the refresh ends, however it ends
struct RefreshGuard {
    inner: Arc<Inner>,
}

impl RefreshGuard {
    fn acquire(inner: &Arc<Inner>) -> Option<Self> {
        inner
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                inner: Arc::clone(inner),
            })
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.inner.refreshing.store(false, Ordering::Release);
    }
}

/// Cache for the trusted key set with TTL-based refresh
///
/// Once a key set has been loaded, callers are always served from memory:
/// an expired entry is returned as-is while a single background task
/// fetches its replacement. Only the very first load blocks the caller.
/// A failed refresh keeps the previous key set in service.
///
/// Cloning is cheap and clones share the same cache.
#[derive(Clone)]
pub struct KeySetCache {
    inner: Arc<Inner>,
}

impl KeySetCache {
    /// Create a cache over `source`.
    ///
    /// A `ttl` of `None` or zero disables caching: every [`get`](Self::get)
    /// loads from the source. Each load is bounded by `fetch_timeout`.
    pub fn new(
        source: Arc<dyn KeySetSource>,
        ttl: Option<Duration>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                ttl: ttl.filter(|ttl| !ttl.is_zero()),
                fetch_timeout,
                state: RwLock::new(CacheState::default()),
                initial_load: Mutex::new(()),
                refreshing: AtomicBool::new(false),
            }),
        }
    }

    /// Build the configured source and load the initial key set.
    ///
    /// # Errors
    /// Fails with `Error::KeyLoad` if the first load fails and with
    /// `Error::NoKeysAvailable` if it yields no keys. Both are fatal.
    pub async fn from_config(config: &AuthConfig) -> Result<Self> {
        let source: Arc<dyn KeySetSource> = match config.key_source() {
            KeySourceConfig::Static(document) => {
                Arc::new(StaticSource::from_json(document.as_bytes()).map_err(Error::KeyLoad)?)
            }
            KeySourceConfig::Remote(url) => {
                let client = match &config.http_client {
                    Some(client) => client.clone(),
                    None => Client::builder()
                        .timeout(config.fetch_timeout())
                        .build()
                        .map_err(|err| Error::KeyLoad(LoadError::Fetch(err)))?,
                };
                Arc::new(RemoteSource::new(url.as_str(), client))
            }
        };

        // Loading a static source is free, so it is never cached
        let ttl = if source.is_static() {
            None
        } else {
            config.refresh_ttl()
        };
        let cache = Self::new(source, ttl, config.fetch_timeout());

        let key_set = cache.get(Utc::now()).await?;
        if key_set.is_empty() {
            return Err(Error::NoKeysAvailable);
        }

        Ok(cache)
    }

    /// Get the key set to verify against at time `now`.
    ///
    /// Triggers a background refresh when the cached set is at least one
    /// TTL old, but still returns the cached set.
    ///
    /// # Errors
    /// Only fails when no key set has ever been loaded and loading one now
    /// fails (`Error::KeyLoad`).
    pub async fn get(&self, now: DateTime<Utc>) -> Result<Arc<KeySet>> {
        let Some(ttl) = self.inner.ttl else {
            return self.load_uncached(now).await;
        };

        if let Some(cached) = self.cached().await {
            if cached.is_expired(now, ttl) {
                self.spawn_refresh(now);
            } else {
                tracing::debug!(loaded_at = %cached.loaded_at, "key set cache hit");
            }
            return Ok(cached.key_set);
        }

        self.initial_load(now).await
    }

    /// Reload the key set now, unless a refresh is already in flight, in which
    /// case the currently cached set is returned.
    ///
    /// # Errors
    /// `Error::KeyLoad` if nothing was ever loaded, `Error::StaleKeySet` if an
    /// older key set stays in service.
    pub async fn refresh(&self, now: DateTime<Utc>) -> Result<Arc<KeySet>> {
        match RefreshGuard::acquire(&self.inner) {
            Some(_guard) => self.reload(now).await,
            None => match self.cached().await {
                Some(cached) => Ok(cached.key_set),
                None => self.initial_load(now).await,
            },
        }
    }

    pub async fn status(&self) -> CacheStatus {
        let state = self.inner.state.read().await;
        CacheStatus {
            last_loaded_at: state.cached.as_ref().map(|cached| cached.loaded_at),
            last_refresh_error: state.last_refresh_error.clone(),
            refreshing: self.inner.refreshing.load(Ordering::Acquire),
        }
    }

    async fn cached(&self) -> Option<CachedKeySet> {
        self.inner.state.read().await.cached.clone()
    }

    async fn initial_load(&self, now: DateTime<Utc>) -> Result<Arc<KeySet>> {
        let _guard = self.inner.initial_load.lock().await;

        // Another caller may have finished the load while we waited
        if let Some(cached) = self.cached().await {
            return Ok(cached.key_set);
        }

        let key_set = self.load().await.map_err(Error::KeyLoad)?;
        tracing::info!(keys = key_set.len(), "initial key set loaded");

        Ok(self.store(key_set, now).await)
    }

    async fn load_uncached(&self, now: DateTime<Utc>) -> Result<Arc<KeySet>> {
        match self.load_replacement().await {
            Ok(key_set) => Ok(self.store(key_set, now).await),
            Err(err) => {
                let mut state = self.inner.state.write().await;
                let Some(cached) = state.cached.clone() else {
                    return Err(Error::KeyLoad(err));
                };
                tracing::warn!(error = %err, loaded_at = %cached.loaded_at, "key set load failed, serving previous key set");
                state.last_refresh_error = Some(err.to_string());
                Ok(cached.key_set)
            }
        }
    }

    fn spawn_refresh(&self, now: DateTime<Utc>) {
        let Some(guard) = RefreshGuard::acquire(&self.inner) else {
            tracing::debug!("key set refresh already in flight");
            return;
        };

        tracing::debug!("key set expired, refreshing in background");
        let cache = self.clone();
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(err) = cache.reload(now).await {
                tracing::warn!(error = %err, "background key set refresh failed");
            }
        });
    }

    #[tracing::instrument(skip(self))]
    async fn reload(&self, now: DateTime<Utc>) -> Result<Arc<KeySet>> {
        match self.load_replacement().await {
            Ok(key_set) => {
                tracing::info!(keys = key_set.len(), "key set refreshed");
                Ok(self.store(key_set, now).await)
            }
            Err(source) => {
                let mut state = self.inner.state.write().await;
                state.last_refresh_error = Some(source.to_string());
                match &state.cached {
                    Some(cached) => Err(Error::StaleKeySet {
                        source,
                        last_loaded_at: cached.loaded_at,
                    }),
                    None => Err(Error::KeyLoad(source)),
                }
            }
        }
    }

    /// Load a set to replace the cached one. An empty set never replaces
    /// keys that are already in service.
    async fn load_replacement(&self) -> std::result::Result<KeySet, LoadError> {
        let key_set = self.load().await?;
        let in_service = self
            .cached()
            .await
            .is_some_and(|cached| !cached.key_set.is_empty());
        if key_set.is_empty() && in_service {
            return Err(LoadError::EmptyKeySet);
        }
        Ok(key_set)
    }

    async fn load(&self) -> std::result::Result<KeySet, LoadError> {
        let timeout = self.inner.fetch_timeout;
        tokio::time::timeout(timeout, self.inner.source.load())
            .await
            .map_err(|_| LoadError::Timeout(timeout))?
    }

    async fn store(&self, key_set: KeySet, now: DateTime<Utc>) -> Arc<KeySet> {
        let key_set = Arc::new(key_set);
        let mut state = self.inner.state.write().await;
        state.cached = Some(CachedKeySet {
            key_set: Arc::clone(&key_set),
            loaded_at: now,
        });
        state.last_refresh_error = None;
        key_set
    }
}
