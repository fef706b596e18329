//! Concurrent signed-entry table.
//!
//! Callers read and write the table directly; nothing on the get/put path
//! waits on the owner task. Counter updates and audit events are handed off
//! without blocking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use babel_core::{
    AuditEvent, AuditSink, CacheError, CacheKey, CacheValue, KeyRejection, SignatureError,
};
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;

use crate::owner::Command;
use crate::pattern::PatternMatcher;
use crate::signer::{SignedPayload, Signer};
use crate::stats::StatsEvent;
use crate::validator::KeyValidator;

/// Longest TTL honored; larger values are clamped (about ten years).
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// A stored entry: signed payload plus absolute expiry.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    payload: Arc<SignedPayload>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(payload: SignedPayload, expires_at: Instant) -> Self {
        Self {
            payload: Arc::new(payload),
            expires_at,
        }
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Same stored entry, not merely an equal one.
    fn is_same(&self, other: &CacheEntry) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload) && self.expires_at == other.expires_at
    }
}

struct StoreInner {
    entries: DashMap<CacheKey, CacheEntry>,
    validator: KeyValidator,
    signer: Signer,
    audit: Arc<dyn AuditSink>,
    default_ttl: Duration,
    commands: UnboundedSender<Command>,
}

/// Handle to one generation of the cache table. Cheap to clone.
#[derive(Clone)]
pub(crate) struct Store {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("entries", &self.inner.entries.len())
            .field("default_ttl", &self.inner.default_ttl)
            .finish_non_exhaustive()
    }
}

impl Store {
    pub(crate) fn new(
        validator: KeyValidator,
        signer: Signer,
        audit: Arc<dyn AuditSink>,
        default_ttl: Duration,
        commands: UnboundedSender<Command>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: DashMap::new(),
                validator,
                signer,
                audit,
                default_ttl,
                commands,
            }),
        }
    }

    // === Reads and writes ===

    /// Look up a key.
    ///
    /// Invalid keys, absent keys, expired entries, and entries that fail
    /// verification are all misses. Expired and unverifiable entries are
    /// removed as a side effect.
    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        if let Err(rejection) = self.inner.validator.validate(key) {
            self.report_rejection(key, &rejection, "get");
            self.record(StatsEvent::Miss);
            return None;
        }

        let observed = match self.inner.entries.get(key) {
            Some(entry) => entry.value().clone(),
            None => {
                self.record(StatsEvent::Miss);
                return None;
            }
        };

        if observed.is_expired_at(Instant::now()) {
            self.remove_observed(key, &observed);
            self.record(StatsEvent::Miss);
            return None;
        }

        match self.inner.signer.verify(&observed.payload) {
            Ok(value) => {
                self.record(StatsEvent::Hit);
                Some(value)
            }
            Err(err) => {
                self.remove_observed(key, &observed);
                self.report_verification_failure(key, err);
                self.record(StatsEvent::Miss);
                None
            }
        }
    }

    /// Validate, sign, and upsert a value.
    ///
    /// `ttl` defaults to the configured TTL. Nothing is written on error.
    pub fn put(
        &self,
        key: &CacheKey,
        value: &CacheValue,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        if let Err(rejection) = self.inner.validator.validate(key) {
            self.report_rejection(key, &rejection, "put");
            return Err(rejection.into());
        }

        let payload = match self.inner.signer.sign(value) {
            Ok(payload) => payload,
            Err(err) => {
                let reason = err.to_string();
                self.inner
                    .audit
                    .record(AuditEvent::signing_failed(key.redacted(), reason));
                return Err(err.into());
            }
        };

        let ttl = ttl.unwrap_or(self.inner.default_ttl).min(MAX_TTL);
        let entry = CacheEntry::new(payload, Instant::now() + ttl);
        self.inner.entries.insert(key.clone(), entry);
        Ok(())
    }

    /// Remove a key. Absent keys are a no-op.
    pub fn delete(&self, key: &CacheKey) {
        self.inner.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn contains_key(&self, key: &CacheKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    // === Bulk operations (driven by the owner) ===

    /// Remove every entry, returning how many were removed.
    pub(crate) fn clear_entries(&self) -> u64 {
        let mut removed = 0u64;
        self.inner.entries.retain(|_, _| {
            removed += 1;
            false
        });
        removed
    }

    /// Remove entries whose expiry has passed.
    pub(crate) fn sweep_expired(&self) -> u64 {
        let now = Instant::now();
        let mut removed = 0u64;
        self.inner.entries.retain(|_, entry| {
            let keep = !entry.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Keys currently matching `matcher`. Scans the whole table.
    pub fn select(&self, matcher: &PatternMatcher) -> Vec<CacheKey> {
        self.inner
            .entries
            .iter()
            .filter(|entry| matcher.matches(entry.key()))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Select matching keys and delete them, returning the number removed.
    pub(crate) fn delete_matching(&self, matcher: &PatternMatcher) -> u64 {
        self.select(matcher)
            .iter()
            .filter(|key| self.inner.entries.remove(*key).is_some())
            .count() as u64
    }

    /// Approximate bytes held by keys, payloads, and entry bookkeeping.
    pub fn approximate_memory(&self) -> usize {
        self.inner
            .entries
            .iter()
            .map(|entry| {
                entry.key().approximate_size()
                    + entry.value().payload.len()
                    + std::mem::size_of::<CacheEntry>()
            })
            .sum()
    }

    // === Plumbing ===

    /// True if both handles point at the same table.
    pub(crate) fn same_generation(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn send(&self, command: Command) -> bool {
        self.inner.commands.send(command).is_ok()
    }

    pub(crate) fn audit(&self, event: AuditEvent) {
        self.inner.audit.record(event);
    }

    fn record(&self, event: StatsEvent) {
        // Owner gone means counters are gone too; nothing to report to.
        let _ = self.inner.commands.send(Command::Record(event));
    }

    /// Remove `key` only if it still holds the entry we looked at, so a
    /// concurrent fresh put survives.
    fn remove_observed(&self, key: &CacheKey, observed: &CacheEntry) {
        self.inner
            .entries
            .remove_if(key, |_, current| current.is_same(observed));
    }

    fn report_rejection(&self, key: &CacheKey, rejection: &KeyRejection, operation: &str) {
        self.inner.audit.record(AuditEvent::key_rejected(
            rejection.code(),
            key.redacted(),
            operation,
        ));
    }

    fn report_verification_failure(&self, key: &CacheKey, err: SignatureError) {
        let event = match err {
            SignatureError::SignatureInvalid => AuditEvent::signature_invalid(key.redacted()),
            SignatureError::VerificationFailed { reason }
            | SignatureError::SigningFailed { reason } => {
                AuditEvent::verification_failed(key.redacted(), reason)
            }
        };
        self.inner.audit.record(event);
    }

    #[cfg(test)]
    pub(crate) fn tamper(
        &self,
        key: &CacheKey,
        f: impl FnOnce(&mut Vec<u8>, &mut [u8; crate::signer::TAG_LEN]),
    ) {
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            let (mut bytes, mut tag) = (*entry.payload).clone().into_parts();
            f(&mut bytes, &mut tag);
            entry.payload = Arc::new(SignedPayload::from_parts(bytes, tag));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use babel_core::CacheSecret;
    use std::sync::Mutex;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<AuditEvent>>);

    impl AuditSink for RecordingSink {
        fn record(&self, event: AuditEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl RecordingSink {
        fn names(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().iter().map(AuditEvent::name).collect()
        }
    }

    fn store_with(ttl: Duration) -> (Store, Arc<RecordingSink>, UnboundedReceiver<Command>) {
        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = unbounded_channel();
        let store = Store::new(
            KeyValidator::new(),
            Signer::new(CacheSecret::new(vec![3u8; 32]).unwrap(), 64 * 1024),
            sink.clone(),
            ttl,
            tx,
        );
        (store, sink, rx)
    }

    fn stats_events(rx: &mut UnboundedReceiver<Command>) -> Vec<StatsEvent> {
        let mut events = Vec::new();
        while let Ok(command) = rx.try_recv() {
            if let Command::Record(event) = command {
                events.push(event);
            }
        }
        events
    }

    fn product_key() -> CacheKey {
        CacheKey::translation("Product", "name", "es", "42")
    }

    #[test]
    fn test_put_then_get() {
        let (store, _, mut rx) = store_with(Duration::from_secs(60));
        store.put(&product_key(), &CacheValue::from("Producto"), None).unwrap();

        assert_eq!(store.get(&product_key()), Some(CacheValue::from("Producto")));
        assert_eq!(store.len(), 1);
        assert_eq!(stats_events(&mut rx), vec![StatsEvent::Hit]);
    }

    #[test]
    fn test_last_put_wins() {
        let (store, _, _rx) = store_with(Duration::from_secs(60));
        store.put(&product_key(), &CacheValue::from("uno"), None).unwrap();
        store.put(&product_key(), &CacheValue::from("dos"), None).unwrap();
        assert_eq!(store.get(&product_key()), Some(CacheValue::from("dos")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_key_is_a_miss() {
        let (store, _, mut rx) = store_with(Duration::from_secs(60));
        assert_eq!(store.get(&product_key()), None);
        assert_eq!(stats_events(&mut rx), vec![StatsEvent::Miss]);
    }

    #[test]
    fn test_expired_entry_is_removed_on_read() {
        let (store, _, mut rx) = store_with(Duration::from_secs(60));
        store
            .put(&product_key(), &CacheValue::from("Producto"), Some(Duration::from_millis(20)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(store.get(&product_key()), None);
        assert_eq!(store.len(), 0);
        assert_eq!(stats_events(&mut rx), vec![StatsEvent::Miss]);
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let (store, _, _rx) = store_with(Duration::from_secs(60));
        store
            .put(&product_key(), &CacheValue::from("x"), Some(Duration::ZERO))
            .unwrap();
        assert_eq!(store.get(&product_key()), None);
    }

    #[test]
    fn test_tampered_tag_is_a_miss_and_removed() {
        let (store, sink, mut rx) = store_with(Duration::from_secs(60));
        store.put(&product_key(), &CacheValue::from("Producto"), None).unwrap();
        store.tamper(&product_key(), |_, tag| tag[0] ^= 0x01);

        assert_eq!(store.get(&product_key()), None);
        assert!(!store.contains_key(&product_key()));
        assert_eq!(sink.names(), vec!["signature_invalid"]);
        assert_eq!(stats_events(&mut rx), vec![StatsEvent::Miss]);
    }

    #[test]
    fn test_tampered_bytes_is_a_miss_and_removed() {
        let (store, sink, _rx) = store_with(Duration::from_secs(60));
        store.put(&product_key(), &CacheValue::from("Producto"), None).unwrap();
        store.tamper(&product_key(), |bytes, _| bytes[1] ^= 0x40);

        assert_eq!(store.get(&product_key()), None);
        assert_eq!(store.len(), 0);
        assert_eq!(sink.names(), vec!["signature_invalid"]);
    }

    #[test]
    fn test_invalid_key_rejected_on_put_and_get() {
        let (store, sink, mut rx) = store_with(Duration::from_secs(60));
        let bad = CacheKey::translation("Product", "name", "ES", "42");

        let err = store.put(&bad, &CacheValue::from("x"), None).unwrap_err();
        assert_eq!(err, CacheError::KeyInvalid(KeyRejection::InvalidLocaleFormat));
        assert_eq!(store.len(), 0);

        assert_eq!(store.get(&bad), None);
        assert_eq!(sink.names(), vec!["key_rejected", "key_rejected"]);
        assert_eq!(stats_events(&mut rx), vec![StatsEvent::Miss]);

        // The raw key never reaches the audit record.
        let events = sink.0.lock().unwrap();
        match &events[0] {
            AuditEvent::KeyRejected { key, reason, operation, .. } => {
                assert_eq!(reason, "invalid_locale_format");
                assert_eq!(operation, "put");
                assert!(!key.contains("Product"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_signing_failure_rejects_write() {
        let sink = Arc::new(RecordingSink::default());
        let (tx, _rx) = unbounded_channel();
        let store = Store::new(
            KeyValidator::new(),
            Signer::new(CacheSecret::generate(), 16),
            sink.clone(),
            Duration::from_secs(60),
            tx,
        );

        let result = store.put(&product_key(), &CacheValue::from("x".repeat(64)), None);
        assert!(matches!(result, Err(CacheError::Signature(SignatureError::SigningFailed { .. }))));
        assert_eq!(store.len(), 0);
        assert_eq!(sink.names(), vec!["signing_failed"]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (store, _, _rx) = store_with(Duration::from_secs(60));
        store.put(&product_key(), &CacheValue::from("x"), None).unwrap();
        store.delete(&product_key());
        store.delete(&product_key());
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let (store, _, _rx) = store_with(Duration::from_secs(60));
        let short = CacheKey::translation("Product", "name", "es", 1i64);
        let long = CacheKey::translation("Product", "name", "es", 2i64);
        store.put(&short, &CacheValue::from("a"), Some(Duration::from_millis(10))).unwrap();
        store.put(&long, &CacheValue::from("b"), None).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(store.sweep_expired(), 1);
        assert!(!store.contains_key(&short));
        assert!(store.contains_key(&long));
    }

    #[test]
    fn test_clear_counts_removed() {
        let (store, _, _rx) = store_with(Duration::from_secs(60));
        assert_eq!(store.clear_entries(), 0);
        for id in 0..5i64 {
            store
                .put(&CacheKey::translation("Product", "name", "es", id), &CacheValue::Int(id), None)
                .unwrap();
        }
        assert_eq!(store.clear_entries(), 5);
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_matching() {
        let (store, _, _rx) = store_with(Duration::from_secs(60));
        for (field, locale) in [("name", "es"), ("name", "fr"), ("description", "es")] {
            store
                .put(&CacheKey::translation("Product", field, locale, 1i64), &CacheValue::from(field), None)
                .unwrap();
        }
        let matcher = crate::pattern::KeyPattern::for_field("Product", "name")
            .compile()
            .unwrap();

        assert_eq!(store.select(&matcher).len(), 2);
        assert_eq!(store.delete_matching(&matcher), 2);
        assert_eq!(store.len(), 1);
        assert!(store.contains_key(&CacheKey::translation("Product", "description", "es", 1i64)));
    }

    #[test]
    fn test_memory_grows_with_entries() {
        let (store, _, _rx) = store_with(Duration::from_secs(60));
        assert_eq!(store.approximate_memory(), 0);
        store.put(&product_key(), &CacheValue::from("Producto"), None).unwrap();
        assert!(store.approximate_memory() > "Producto".len());
    }

    #[test]
    fn test_non_canonical_keys_pass_through() {
        let (store, sink, _rx) = store_with(Duration::from_secs(60));
        let legacy = CacheKey::from_parts(vec!["legacy".into(), "ES".into()]);
        store.put(&legacy, &CacheValue::from("x"), None).unwrap();
        assert_eq!(store.get(&legacy), Some(CacheValue::from("x")));
        assert!(sink.names().is_empty());
    }
}
