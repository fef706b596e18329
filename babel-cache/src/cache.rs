//! Public cache handle.
//!
//! [`TranslationCache`] is the entry point for callers. It is cheap to clone
//! and every clone talks to the same generation. All operations degrade
//! gracefully while the cache is unavailable (after shutdown, or once the
//! owner has exhausted its restart budget): reads miss, writes succeed
//! without storing, and counts are zero.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use babel_core::{
    AuditSink, BabelResult, CacheConfig, CacheError, CacheKey, CacheValue, KeyPart, Locale,
    TracingAuditSink, WarmupSource,
};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::owner::Command;
use crate::pattern::KeyPattern;
use crate::signer::Signer;
use crate::stats::CacheStats;
use crate::store::Store;
use crate::supervisor::{read_slot, supervise, CacheFactory, RestartPolicy, StoreSlot};
use crate::validator::KeyValidator;

// ============================================================================
// BUILDER
// ============================================================================

/// Configures collaborators before starting a [`TranslationCache`].
pub struct CacheBuilder {
    config: CacheConfig,
    audit: Arc<dyn AuditSink>,
    warmup_source: Option<Arc<dyn WarmupSource>>,
}

impl CacheBuilder {
    fn new(config: CacheConfig) -> Self {
        Self {
            config,
            audit: Arc::new(TracingAuditSink),
            warmup_source: None,
        }
    }

    /// Send audit events somewhere other than the `babel::audit` log target.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    /// Source used by [`TranslationCache::warmup`]. Without one, warmup
    /// requests are ignored.
    pub fn with_warmup_source(mut self, source: Arc<dyn WarmupSource>) -> Self {
        self.warmup_source = Some(source);
        self
    }

    /// Validate the configuration and start the owner under supervision.
    ///
    /// # Errors
    /// - `Config` if the configuration is invalid, including a missing
    ///   secret in production
    /// - `RuntimeUnavailable` if called outside a Tokio runtime
    pub fn start(self) -> BabelResult<TranslationCache> {
        self.config.validate()?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| CacheError::RuntimeUnavailable)?;

        let config = self.config;
        let factory = CacheFactory {
            validator: KeyValidator::with_registered_resources(
                config.registered_resources.iter().cloned(),
            ),
            signer: Signer::new(config.resolve_secret(), config.max_payload_bytes),
            audit: self.audit,
            warmup_source: self.warmup_source,
            default_ttl: config.default_ttl,
            cleanup_interval: config.cleanup_interval,
        };
        let policy = RestartPolicy::new(config.max_restarts, config.restart_window);

        let (store, owner) = factory.build();
        let slot: StoreSlot = Arc::new(RwLock::new(Some(store)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let supervisor = runtime.spawn(supervise(factory, owner, slot.clone(), shutdown_rx, policy));

        tracing::info!(
            default_ttl_secs = config.default_ttl.as_secs(),
            cleanup_interval_secs = config.cleanup_interval.as_secs(),
            registered_resources = config.registered_resources.len(),
            production = config.production,
            "Translation cache started"
        );

        Ok(TranslationCache {
            shared: Arc::new(Shared {
                slot,
                shutdown_tx,
                supervisor: Mutex::new(Some(supervisor)),
            }),
        })
    }
}

// ============================================================================
// HANDLE
// ============================================================================

struct Shared {
    slot: StoreSlot,
    shutdown_tx: watch::Sender<bool>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

/// Signed, expiring translation cache.
///
/// Dropping the last clone stops the owner.
#[derive(Clone)]
pub struct TranslationCache {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for TranslationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationCache")
            .field("available", &self.is_available())
            .field("size", &self.size())
            .finish()
    }
}

impl TranslationCache {
    pub fn builder(config: CacheConfig) -> CacheBuilder {
        CacheBuilder::new(config)
    }

    /// Start with the default audit sink and no warmup source.
    ///
    /// # Errors
    /// See [`CacheBuilder::start`].
    pub fn start(config: CacheConfig) -> BabelResult<Self> {
        CacheBuilder::new(config).start()
    }

    /// Canonical translation key. Not validated until used.
    pub fn build_key(
        resource: &str,
        field: &str,
        locale: &str,
        record_id: impl Into<KeyPart>,
    ) -> CacheKey {
        CacheKey::translation(resource, field, locale, record_id)
    }

    fn store(&self) -> Option<Store> {
        read_slot(&self.shared.slot)
    }

    /// False after shutdown or once the owner can no longer be restarted.
    pub fn is_available(&self) -> bool {
        self.store().is_some()
    }

    // === Reads and writes ===

    /// Look up a key. Any failure is a miss.
    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.store()?.get(key)
    }

    /// Store a value under `key`, replacing any previous value.
    ///
    /// `ttl` falls back to the configured default. While the cache is
    /// unavailable this succeeds without storing anything.
    ///
    /// # Errors
    /// - `KeyInvalid` if a canonical key fails validation
    /// - `Signature` if the value cannot be encoded within limits
    pub fn put(
        &self,
        key: &CacheKey,
        value: impl Into<CacheValue>,
        ttl: Option<Duration>,
    ) -> BabelResult<()> {
        match self.store() {
            Some(store) => Ok(store.put(key, &value.into(), ttl)?),
            None => {
                tracing::trace!("Cache unavailable; dropping write");
                Ok(())
            }
        }
    }

    /// Return the cached value, or compute, store, and return it.
    ///
    /// A value that cannot be stored (invalid key, oversized payload) is
    /// still returned.
    pub fn get_or_compute<F, V>(&self, key: &CacheKey, ttl: Option<Duration>, compute: F) -> CacheValue
    where
        F: FnOnce() -> V,
        V: Into<CacheValue>,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = compute().into();
        self.store_computed(key, &value, ttl);
        value
    }

    /// Like [`get_or_compute`](Self::get_or_compute) for fallible
    /// computations. Errors are returned as-is and nothing is stored.
    ///
    /// # Errors
    /// Whatever `compute` returns.
    pub fn try_get_or_compute<F, V, E>(
        &self,
        key: &CacheKey,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<CacheValue, E>
    where
        F: FnOnce() -> Result<V, E>,
        V: Into<CacheValue>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = compute()?.into();
        self.store_computed(key, &value, ttl);
        Ok(value)
    }

    fn store_computed(&self, key: &CacheKey, value: &CacheValue, ttl: Option<Duration>) {
        if let Some(store) = self.store() {
            if let Err(e) = store.put(key, value, ttl) {
                tracing::warn!(key = %key.redacted(), error = %e, "Computed value not cached");
            }
        }
    }

    /// Remove a key. Absent keys are a no-op.
    pub fn delete(&self, key: &CacheKey) {
        if let Some(store) = self.store() {
            store.delete(key);
        }
    }

    /// Current number of entries, including expired ones not yet swept.
    pub fn size(&self) -> usize {
        self.store().map(|store| store.len()).unwrap_or(0)
    }

    // === Owner-driven operations ===

    /// Delete every key matching `pattern` and return how many were removed.
    ///
    /// # Errors
    /// `InvalidPattern` if the pattern cannot be compiled.
    pub async fn delete_pattern(&self, pattern: &KeyPattern) -> BabelResult<u64> {
        let matcher = pattern.compile()?;
        let removed = self
            .request(|reply| Command::DeletePattern {
                pattern: pattern.clone(),
                matcher,
                reply,
            })
            .await
            .unwrap_or(0);
        Ok(removed)
    }

    /// Drop every translation of one record.
    pub async fn invalidate_resource(&self, resource: &str, record_id: impl Into<KeyPart>) -> u64 {
        self.invalidate(KeyPattern::for_record(resource, record_id)).await
    }

    /// Drop every translation of one field of a resource.
    pub async fn invalidate_field(&self, resource: &str, field: &str) -> u64 {
        self.invalidate(KeyPattern::for_field(resource, field)).await
    }

    /// Drop every translation in one locale.
    pub async fn invalidate_locale(&self, locale: &str) -> u64 {
        self.invalidate(KeyPattern::for_locale(locale)).await
    }

    async fn invalidate(&self, pattern: KeyPattern) -> u64 {
        match self.delete_pattern(&pattern).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "Invalidation failed");
                0
            }
        }
    }

    /// Remove every entry. The removed entries count as evictions.
    pub async fn clear(&self) {
        self.request(|reply| Command::Clear { reply }).await;
    }

    /// Run an expiry sweep now and return how many entries it removed.
    pub async fn sweep(&self) -> u64 {
        self.request(|reply| Command::Sweep { reply })
            .await
            .unwrap_or(0)
    }

    /// Schedule background population for every resource and locale pair.
    ///
    /// Returns immediately. Load failures are logged, never returned.
    pub fn warmup<I, S>(&self, resources: I, locales: &[Locale])
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let resources: Vec<String> = resources.into_iter().map(Into::into).collect();
        if resources.is_empty() || locales.is_empty() {
            return;
        }
        let sent = self.store().is_some_and(|store| {
            store.send(Command::Warmup {
                resources,
                locales: locales.to_vec(),
            })
        });
        if !sent {
            tracing::debug!("Cache unavailable; warmup skipped");
        }
    }

    /// Counters plus current size and approximate memory.
    ///
    /// Counters reflect every operation whose report reached the owner
    /// before this call.
    pub async fn stats(&self) -> CacheStats {
        let Some(store) = self.store() else {
            return CacheStats::default();
        };
        let counters = self
            .request(|reply| Command::Snapshot { reply })
            .await
            .unwrap_or_default();
        counters.snapshot(store.len(), store.approximate_memory())
    }

    /// Send a command to the current owner and wait for its reply. `None`
    /// when the cache is unavailable or the owner died before replying.
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let store = self.store()?;
        let (reply, rx) = oneshot::channel();
        if !store.send(command(reply)) {
            return None;
        }
        rx.await.ok()
    }

    // === Lifecycle ===

    /// Stop the owner and wait for it to exit. Afterwards every clone of
    /// this handle behaves as unavailable. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let _ = self.shared.shutdown_tx.send(true);
        let supervisor = self
            .shared
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = supervisor {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Cache supervisor did not exit cleanly");
            }
            tracing::info!("Translation cache stopped");
        }
    }

    #[cfg(test)]
    fn crash_owner(&self) -> bool {
        self.store().is_some_and(|store| store.send(Command::Crash))
    }

    #[cfg(test)]
    fn generation(&self) -> Option<Store> {
        self.store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use babel_core::{BabelError, CacheSecret};

    fn config() -> CacheConfig {
        CacheConfig::default().with_secret(CacheSecret::new(vec![7u8; 32]).unwrap())
    }

    async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        check()
    }

    #[test]
    fn test_start_requires_runtime() {
        let err = TranslationCache::start(config()).unwrap_err();
        assert!(matches!(err, BabelError::Cache(CacheError::RuntimeUnavailable)));
    }

    #[tokio::test]
    async fn test_production_requires_secret() {
        let err = TranslationCache::start(CacheConfig::default().with_production(true)).unwrap_err();
        assert!(matches!(err, BabelError::Config(_)));
    }

    #[tokio::test]
    async fn test_restart_after_crash_serves_empty_cache() {
        let cache = TranslationCache::start(config()).unwrap();
        let key = TranslationCache::build_key("Product", "name", "es", "42");
        cache.put(&key, "Producto", None).unwrap();
        let first = cache.generation().unwrap();

        assert!(cache.crash_owner());
        let restarted = wait_until(|| {
            cache
                .generation()
                .is_some_and(|current| !current.same_generation(&first))
        })
        .await;
        assert!(restarted);

        assert_eq!(cache.get(&key), None);
        cache.put(&key, "Producto", None).unwrap();
        assert_eq!(cache.get(&key), Some(CacheValue::from("Producto")));

        // Counters belong to the new generation.
        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.evictions), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_crash_loop_degrades_to_unavailable() {
        let cache = TranslationCache::start(
            config().with_restart_policy(2, Duration::from_secs(30)),
        )
        .unwrap();

        for _ in 0..2 {
            let before = cache.generation().unwrap();
            assert!(cache.crash_owner());
            let restarted = wait_until(|| {
                cache
                    .generation()
                    .is_some_and(|now| !now.same_generation(&before))
            })
            .await;
            assert!(restarted);
        }

        // Third panic inside the window exceeds the budget.
        assert!(cache.crash_owner());
        assert!(wait_until(|| !cache.is_available()).await);
        let key = TranslationCache::build_key("Product", "name", "es", 1i64);
        assert!(cache.put(&key, "x", None).is_ok());
        assert_eq!(cache.get(&key), None);
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.stats().await, CacheStats::default());
    }
}
