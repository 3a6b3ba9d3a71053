//! Remote key set retrieval and caching.

use std::io::Read as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("key set request failed: {0}")]
    Transport(String),

    #[error("key set endpoint answered with status {0}")]
    Status(u16),

    #[error("key set response could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("key set response exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("key set document is invalid: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where key sets come from.
pub trait KeySetSource: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`KeySetError`] when the key set cannot be obtained.
    fn fetch(&self) -> Result<JwkSet, KeySetError>;
}

/// Blocking HTTP fetch bounded by connect/read timeouts and a body size limit.
pub struct HttpKeySetSource {
    agent: ureq::Agent,
    url: Url,
    size_limit: u64,
}

impl HttpKeySetSource {
    #[must_use]
    pub fn new(url: Url, connect_timeout: Duration, read_timeout: Duration, size_limit: u64) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .build();
        Self {
            agent,
            url,
            size_limit,
        }
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl KeySetSource for HttpKeySetSource {
    fn fetch(&self) -> Result<JwkSet, KeySetError> {
        let response = match self.agent.request_url("GET", &self.url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(KeySetError::Status(code)),
            Err(ureq::Error::Transport(t)) => return Err(KeySetError::Transport(t.to_string())),
        };

        let mut body = Vec::new();
        response
            .into_reader()
            .take(self.size_limit.saturating_add(1))
            .read_to_end(&mut body)?;
        if u64::try_from(body.len()).unwrap_or(u64::MAX) > self.size_limit {
            return Err(KeySetError::TooLarge {
                limit: self.size_limit,
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

/// An immutable key set snapshot.
#[derive(Debug)]
pub struct CachedKeySet {
    keys: JwkSet,
    fetched_at: Instant,
}

impl CachedKeySet {
    #[must_use]
    pub fn keys(&self) -> &JwkSet {
        &self.keys
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Read-mostly key set cache.
///
/// Readers clone an `Arc` snapshot and never wait for a refresh once a key set is cached.
/// Refreshes are single-flight: only the thread holding `refresh_lock` fetches.
pub struct KeySetCache {
    source: Box<dyn KeySetSource>,
    ttl: Duration,
    min_refresh: Duration,
    cached: RwLock<Option<Arc<CachedKeySet>>>,
    refresh_lock: Mutex<()>,
}

impl KeySetCache {
    #[must_use]
    pub fn new(source: Box<dyn KeySetSource>, ttl: Duration, min_refresh: Duration) -> Self {
        Self {
            source,
            ttl,
            min_refresh,
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    fn snapshot(&self) -> Option<Arc<CachedKeySet>> {
        self.cached.read().clone()
    }

    fn is_fresh(&self, set: &CachedKeySet) -> bool {
        set.age() < self.ttl
    }

    fn fetch_and_store(&self) -> Result<Arc<CachedKeySet>, KeySetError> {
        let keys = self.source.fetch()?;
        tracing::info!(keys = keys.keys.len(), "remote key set refreshed");
        let set = Arc::new(CachedKeySet {
            keys,
            fetched_at: Instant::now(),
        });
        *self.cached.write() = Some(Arc::clone(&set));
        Ok(set)
    }

    /// Returns a usable key set, fetching or refreshing it as needed.
    ///
    /// A stale set is refreshed by at most one thread; everyone else keeps using the stale
    /// set meanwhile. A failed refresh keeps the stale set. Only the very first fetch can fail.
    ///
    /// # Errors
    ///
    /// Returns a [`KeySetError`] when nothing is cached and the fetch fails.
    pub fn current(&self) -> Result<Arc<CachedKeySet>, KeySetError> {
        match self.snapshot() {
            Some(set) if self.is_fresh(&set) => Ok(set),
            Some(stale) => {
                let Some(_guard) = self.refresh_lock.try_lock() else {
                    return Ok(stale);
                };
                if let Some(set) = self.snapshot().filter(|s| !Arc::ptr_eq(s, &stale)) {
                    return Ok(set);
                }
                match self.fetch_and_store() {
                    Ok(set) => Ok(set),
                    Err(e) => {
                        tracing::warn!(error = %e, "key set refresh failed, keeping stale key set");
                        Ok(stale)
                    }
                }
            }
            None => {
                let _guard = self.refresh_lock.lock();
                if let Some(set) = self.snapshot() {
                    return Ok(set);
                }
                self.fetch_and_store()
            }
        }
    }

    /// Refreshes after `seen` lacked a requested key.
    ///
    /// Returns `Ok(None)` when `seen` is younger than the minimum refresh interval.
    /// Returns the newer snapshot without fetching when another thread already replaced `seen`.
    ///
    /// # Errors
    ///
    /// Returns a [`KeySetError`] when the refresh fetch fails.
    pub fn refresh_after_miss(
        &self,
        seen: &Arc<CachedKeySet>,
    ) -> Result<Option<Arc<CachedKeySet>>, KeySetError> {
        let _guard = self.refresh_lock.lock();
        if let Some(set) = self.snapshot().filter(|s| !Arc::ptr_eq(s, seen)) {
            return Ok(Some(set));
        }
        if seen.age() < self.min_refresh {
            tracing::debug!("unknown key id, refresh rate limited");
            return Ok(None);
        }
        self.fetch_and_store().map(Some)
    }

    /// Fetches unconditionally.
    ///
    /// # Errors
    ///
    /// Returns a [`KeySetError`] when the fetch fails; the cached set is left unchanged.
    pub fn refresh(&self) -> Result<Arc<CachedKeySet>, KeySetError> {
        let _guard = self.refresh_lock.lock();
        self.fetch_and_store()
    }
}
