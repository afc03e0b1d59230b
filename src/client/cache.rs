//! Per-credential client handle cache.
//!
//! # Responsibilities
//! - Reuse one [`ClientHandle`] per credential while it stays in use
//! - Enforce the idle timeout (lazily on lookup, eagerly in the sweeper)
//! - Bound the keyed map with least-recently-used eviction
//! - Hold the single privileged handle outside the keyed map
//!
//! # Design Decisions
//! - One mutex over the map keeps the capacity check and insert atomic
//! - The privileged handle lives in an `ArcSwapOption`; a separate build lock
//!   makes concurrent first callers share one instance

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};
use url::Url;

use crate::client::credential::Credential;
use crate::client::handle::ClientHandle;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult, RemoteError};
use crate::observability::metrics;
use crate::observability::telemetry::{emit, TelemetryEvent, TelemetrySink};
use crate::resilience::classifier::classify;

/// Sizing and connection parameters for the cache.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub max_size: usize,
    pub ttl: Duration,
    pub endpoint: Url,
    pub project_id: String,
    pub request_timeout: Duration,
    pub privileged_credential: Option<Credential>,
}

impl CacheSettings {
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| GatewayError::Config(format!("invalid endpoint '{}': {}", config.endpoint, e)))?;
        Ok(Self {
            max_size: config.max_cache_size,
            ttl: config.cache_timeout(),
            endpoint,
            project_id: config.project_id.clone(),
            request_timeout: config.request_timeout(),
            privileged_credential: config
                .privileged_credential
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .map(|c| Credential::ApiKey(c.trim().to_string())),
        })
    }
}

struct CacheEntry {
    handle: Arc<ClientHandle>,
    last_used_at: Instant,
}

/// Counters exposed on the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub admin_handle_built: bool,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

/// Cache of client handles keyed by credential.
pub struct ClientCache {
    settings: CacheSettings,
    entries: Mutex<HashMap<Credential, CacheEntry>>,
    admin: ArcSwapOption<ClientHandle>,
    admin_build: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    telemetry: Arc<dyn TelemetrySink>,
}

impl ClientCache {
    pub fn new(settings: CacheSettings, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            settings,
            entries: Mutex::new(HashMap::new()),
            admin: ArcSwapOption::empty(),
            admin_build: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            telemetry,
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Credential, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live handle, refreshing its last-used time.
    ///
    /// An entry idle for the full timeout counts as a miss and is dropped.
    pub fn get(&self, credential: &Credential) -> Option<Arc<ClientHandle>> {
        let now = Instant::now();
        let mut entries = self.lock();

        let expired = match entries.get_mut(credential) {
            Some(entry) if now.duration_since(entry.last_used_at) < self.settings.ttl => {
                entry.last_used_at = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.handle.clone());
            }
            Some(_) => true,
            None => false,
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        if expired {
            entries.remove(credential);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_size(entries.len());
            tracing::debug!(credential = %credential, "Cached client handle expired");
        }
        None
    }

    /// Insert a handle, evicting the least recently used entry when full.
    ///
    /// Returns the evicted credential, if any.
    pub fn put(&self, credential: Credential, handle: Arc<ClientHandle>) -> Option<Credential> {
        let now = Instant::now();
        let mut entries = self.lock();

        let mut evicted = None;
        if !entries.contains_key(&credential) && entries.len() >= self.settings.max_size {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                evicted = Some(oldest);
            }
        }

        // A zero capacity cache stores nothing.
        if entries.len() < self.settings.max_size || entries.contains_key(&credential) {
            entries.insert(credential, CacheEntry { handle, last_used_at: now });
        }
        let size = entries.len();
        drop(entries);

        metrics::record_cache_size(size);
        if let Some(ref evicted) = evicted {
            tracing::debug!(credential = %evicted, size, "Evicted least recently used client handle");
            emit(
                self.telemetry.as_ref(),
                TelemetryEvent::new("cache_eviction").with("size", size),
            );
        }
        evicted
    }

    /// Build a handle for `credential` without caching it. Never touches the network.
    pub fn build_handle(&self, credential: Credential) -> Result<ClientHandle, RemoteError> {
        ClientHandle::build(
            credential,
            &self.settings.endpoint,
            &self.settings.project_id,
            self.settings.request_timeout,
        )
    }

    /// Cached handle for `credential`, building and inserting one on a miss.
    pub fn get_or_build(&self, credential: &Credential) -> GatewayResult<Arc<ClientHandle>> {
        if let Some(handle) = self.get(credential) {
            return Ok(handle);
        }
        let handle = Arc::new(self.build_handle(credential.clone()).map_err(build_error)?);
        self.put(credential.clone(), handle.clone());
        Ok(handle)
    }

    /// The privileged handle, built on first use and kept until [`reset`](Self::reset).
    pub fn admin_handle(&self) -> GatewayResult<Arc<ClientHandle>> {
        if let Some(handle) = self.admin.load_full() {
            return Ok(handle);
        }

        let _guard = self.admin_build.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = self.admin.load_full() {
            return Ok(handle);
        }

        let credential = self
            .settings
            .privileged_credential
            .clone()
            .ok_or_else(|| GatewayError::Config("no privileged credential configured".to_string()))?;
        let handle = Arc::new(self.build_handle(credential).map_err(build_error)?);
        self.admin.store(Some(handle.clone()));
        tracing::info!("Privileged client handle initialized");
        Ok(handle)
    }

    /// Drop every entry idle for longer than the timeout. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let ttl = self.settings.ttl;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.last_used_at) < ttl);
        let removed = before - entries.len();
        let size = entries.len();
        drop(entries);

        if removed > 0 {
            self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
            metrics::record_cache_size(size);
            tracing::info!(removed, remaining = size, "Swept idle client handles");
            emit(
                self.telemetry.as_ref(),
                TelemetryEvent::new("cache_sweep")
                    .with("removed", removed)
                    .with("remaining", size),
            );
        }
        removed
    }

    pub fn remove(&self, credential: &Credential) -> bool {
        let mut entries = self.lock();
        let removed = entries.remove(credential).is_some();
        metrics::record_cache_size(entries.len());
        removed
    }

    pub fn contains(&self, credential: &Credential) -> bool {
        self.lock().contains_key(credential)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.settings.max_size,
            admin_handle_built: self.admin.load().is_some(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    /// Clear keyed entries and discard the privileged handle.
    pub fn reset(&self) {
        let cleared = {
            let mut entries = self.lock();
            let cleared = entries.len();
            entries.clear();
            cleared
        };
        self.admin.store(None);
        metrics::record_cache_size(0);
        tracing::info!(cleared, "Client cache reset");
    }

    /// Periodically sweep idle handles until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = interval.as_secs(), "Client cache sweeper starting");
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Client cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

fn build_error(error: RemoteError) -> GatewayError {
    GatewayError::Remote {
        category: classify(&error).category,
        attempts: 0,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::observability::telemetry::MemoryTelemetry;

    fn settings(max_size: usize) -> CacheSettings {
        CacheSettings {
            max_size,
            ttl: Duration::from_secs(1800),
            endpoint: Url::parse("http://127.0.0.1:9/v1").unwrap(),
            project_id: "demo".into(),
            request_timeout: Duration::from_secs(5),
            privileged_credential: Some(Credential::ApiKey("standard_admin_key_123456".into())),
        }
    }

    fn cache(max_size: usize) -> (Arc<ClientCache>, Arc<MemoryTelemetry>) {
        let telemetry = Arc::new(MemoryTelemetry::new());
        (Arc::new(ClientCache::new(settings(max_size), telemetry.clone())), telemetry)
    }

    fn cred(i: usize) -> Credential {
        Credential::Bearer(format!("aGVhZGVy.cGF5bG9hZA.{i}"))
    }

    fn handle(cache: &ClientCache, c: &Credential) -> Arc<ClientHandle> {
        Arc::new(cache.build_handle(c.clone()).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_eviction_keeps_size_bound() {
        let (cache, telemetry) = cache(50);
        for i in 0..50 {
            cache.put(cred(i), handle(&cache, &cred(i)));
            time::advance(Duration::from_millis(10)).await;
        }
        // Touch the oldest so the second oldest becomes the LRU entry.
        assert!(cache.get(&cred(0)).is_some());
        time::advance(Duration::from_millis(10)).await;

        let evicted = cache.put(cred(50), handle(&cache, &cred(50)));
        assert_eq!(evicted, Some(cred(1)));
        assert_eq!(cache.len(), 50);
        assert!(cache.contains(&cred(0)));
        assert!(!cache.contains(&cred(1)));
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(telemetry.count("cache_eviction"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_existing_key_does_not_evict() {
        let (cache, _) = cache(2);
        cache.put(cred(0), handle(&cache, &cred(0)));
        cache.put(cred(1), handle(&cache, &cred(1)));
        assert_eq!(cache.put(cred(1), handle(&cache, &cred(1))), None);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_a_miss() {
        let (cache, _) = cache(10);
        cache.put(cred(0), handle(&cache, &cred(0)));

        time::advance(Duration::from_secs(1799)).await;
        assert!(cache.get(&cred(0)).is_some());

        // The hit above refreshed last_used_at.
        time::advance(Duration::from_secs(1799)).await;
        assert!(cache.get(&cred(0)).is_some());

        time::advance(Duration::from_secs(1800)).await;
        assert!(cache.get(&cred(0)).is_none());
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.expirations), (2, 1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_build_reuses_handle() {
        let (cache, _) = cache(10);
        let first = cache.get_or_build(&cred(7)).unwrap();
        let second = cache.get_or_build(&cred(7)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_handle_is_singleton_until_reset() {
        let (cache, _) = cache(10);
        let a = cache.admin_handle().unwrap();
        let b = cache.admin_handle().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.credential.is_privileged());
        assert_eq!(cache.len(), 0);

        cache.reset();
        let c = cache.admin_handle().unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_handle_requires_credential() {
        let mut s = settings(10);
        s.privileged_credential = None;
        let cache = ClientCache::new(s, Arc::new(MemoryTelemetry::new()));
        assert!(matches!(cache.admin_handle(), Err(GatewayError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_idle_entries() {
        let (cache, telemetry) = cache(10);
        let shutdown = Shutdown::new();
        let sweeper = tokio::spawn(cache.clone().run_sweeper(Duration::from_secs(600), shutdown.subscribe()));

        cache.put(cred(0), handle(&cache, &cred(0)));
        time::sleep(Duration::from_secs(1200)).await;
        cache.put(cred(1), handle(&cache, &cred(1)));

        // Sweep at t=1800 removes cred(0), idle for exactly the timeout.
        time::sleep(Duration::from_secs(601)).await;
        assert!(!cache.contains(&cred(0)));
        assert!(cache.contains(&cred(1)));
        assert_eq!(telemetry.count("cache_sweep"), 1);

        shutdown.trigger();
        sweeper.await.unwrap();
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = GatewayConfig::default();
        config.privileged_credential = Some("  standard_key  ".into());
        let s = CacheSettings::from_config(&config).unwrap();
        assert_eq!(s.privileged_credential, Some(Credential::ApiKey("standard_key".into())));
        assert_eq!(s.max_size, 50);

        config.endpoint = "not a url".into();
        assert!(matches!(CacheSettings::from_config(&config), Err(GatewayError::Config(_))));
    }
}
