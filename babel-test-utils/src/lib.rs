//! Babel Test Utilities
//!
//! Shared test infrastructure for the Babel workspace:
//! - Proptest generators for keys, locales, and values
//! - Recording and scripted collaborators (audit sink, warmup source)
//! - Fixtures for common configurations
//! - Tracing setup for tests

pub use babel_core::{
    AuditEvent, AuditSink, BabelError, BabelResult, CacheConfig, CacheError, CacheKey,
    CacheSecret, CacheValue, KeyPart, KeyRejection, Locale, WarmupEntry, WarmupError,
    WarmupSource,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

// ============================================================================
// MOCK COLLABORATORS
// ============================================================================

/// Audit sink that keeps every event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Event names, oldest first.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(AuditEvent::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Warmup source backed by a fixed table of `(resource, locale)` entries.
///
/// Pairs registered with [`fail_on`](Self::fail_on) return an error; pairs
/// never registered return no entries.
#[derive(Debug, Default)]
pub struct StaticWarmupSource {
    entries: HashMap<(String, String), Vec<WarmupEntry>>,
    failures: HashMap<(String, String), String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StaticWarmupSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(
        mut self,
        resource: &str,
        locale: &str,
        entries: impl IntoIterator<Item = WarmupEntry>,
    ) -> Self {
        self.entries
            .entry((resource.to_string(), locale.to_string()))
            .or_default()
            .extend(entries);
        self
    }

    pub fn fail_on(mut self, resource: &str, locale: &str, message: &str) -> Self {
        self.failures.insert(
            (resource.to_string(), locale.to_string()),
            message.to_string(),
        );
        self
    }

    /// `(resource, locale)` pairs requested so far, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl WarmupSource for StaticWarmupSource {
    async fn load(&self, resource: &str, locale: &Locale) -> Result<Vec<WarmupEntry>, WarmupError> {
        let pair = (resource.to_string(), locale.as_str().to_string());
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pair.clone());

        if let Some(message) = self.failures.get(&pair) {
            return Err(message.clone().into());
        }
        Ok(self.entries.get(&pair).cloned().unwrap_or_default())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cache keys and values.

    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    // === Key Part Generators ===

    /// Well-formed resource type name, optionally dotted.
    pub fn arb_resource() -> impl Strategy<Value = String> {
        "[A-Z][a-zA-Z0-9_]{0,24}(\\.[A-Z][a-zA-Z0-9_]{0,16}){0,2}"
    }

    /// Non-empty field name.
    pub fn arb_field() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,30}"
    }

    /// Locale string in `ll` or `ll_RR` form.
    pub fn arb_locale_str() -> impl Strategy<Value = String> {
        "[a-z]{2}(_[A-Z]{2})?"
    }

    /// Parsed locale.
    pub fn arb_locale() -> impl Strategy<Value = Locale> {
        arb_locale_str().prop_filter_map("locale must parse", |raw| Locale::parse(&raw).ok())
    }

    /// Record id, either an integer or a short text id.
    pub fn arb_record_id() -> impl Strategy<Value = KeyPart> {
        prop_oneof![
            any::<i64>().prop_map(KeyPart::Int),
            "[A-Za-z0-9_-]{1,36}".prop_map(KeyPart::Text),
        ]
    }

    /// Canonical translation key that passes validation.
    pub fn arb_valid_key() -> impl Strategy<Value = CacheKey> {
        (arb_resource(), arb_field(), arb_locale_str(), arb_record_id())
            .prop_map(|(resource, field, locale, id)| CacheKey::translation(resource, field, locale, id))
    }

    /// Locale strings that must be rejected.
    pub fn arb_invalid_locale() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Z]{2}",
            "[a-z]{2}-[A-Z]{2}",
            "[a-z]{2}_[a-z]{2}",
            "[a-z]{3,10}",
            "[a-z]{2}_[A-Z]{2}\\.[A-Z0-9-]{5,8}",
        ]
    }

    // === Value Generators ===

    /// Scalar cache value. Floats are finite so values compare equal to
    /// themselves.
    pub fn arb_scalar_value() -> impl Strategy<Value = CacheValue> {
        prop_oneof![
            Just(CacheValue::Null),
            any::<bool>().prop_map(CacheValue::Bool),
            any::<i64>().prop_map(CacheValue::Int),
            (-1.0e12f64..1.0e12).prop_map(CacheValue::Float),
            "\\PC{0,48}".prop_map(CacheValue::Text),
            prop::collection::vec(any::<u8>(), 0..32).prop_map(CacheValue::Bytes),
        ]
    }

    /// Nested cache value a few levels deep.
    pub fn arb_cache_value() -> impl Strategy<Value = CacheValue> {
        arb_scalar_value().prop_recursive(4, 48, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(CacheValue::List),
                prop::collection::btree_map("[a-z_]{1,12}", inner, 0..6)
                    .prop_map(|map: BTreeMap<String, CacheValue>| CacheValue::Map(map)),
            ]
        })
    }

    /// TTL between 1s and 1h.
    pub fn arb_ttl() -> impl Strategy<Value = Duration> {
        (1u64..3600).prop_map(Duration::from_secs)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made configurations and keys.

    use super::*;

    /// Fixed 32-byte signing secret.
    pub fn test_secret() -> CacheSecret {
        CacheSecret::new((0u8..32).collect()).unwrap_or_else(|_| CacheSecret::generate())
    }

    /// Configuration with a fixed secret and long sweep interval so tests
    /// control expiry explicitly.
    pub fn test_config() -> CacheConfig {
        CacheConfig::default()
            .with_secret(test_secret())
            .with_default_ttl(Duration::from_secs(60))
            .with_cleanup_interval(Duration::from_secs(3600))
    }

    /// Configuration whose background sweep runs every `interval`.
    pub fn sweeping_config(interval: Duration) -> CacheConfig {
        test_config().with_cleanup_interval(interval)
    }

    pub fn product_name_key(locale: &str, id: i64) -> CacheKey {
        CacheKey::translation("Product", "name", locale, id)
    }

    pub fn locale(raw: &str) -> Locale {
        Locale::parse(raw).unwrap_or_else(|e| panic!("fixture locale {raw:?} is invalid: {e}"))
    }
}

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-writer subscriber honoring `RUST_LOG`. Safe to call from
/// every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// TESTS
// ============================================================================
