//! Startup, shutdown, degradation, and warmup.

use std::sync::Arc;
use std::time::Duration;

use babel_cache::{CacheStats, KeyPattern, TranslationCache};
use babel_test_utils::fixtures::{locale, product_name_key, test_config};
use babel_test_utils::{
    init_test_tracing, BabelError, CacheConfig, CacheValue, StaticWarmupSource, WarmupEntry,
};

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

// ============================================================================
// STARTUP
// ============================================================================

#[test]
fn start_outside_runtime_fails() {
    let err = TranslationCache::start(test_config()).unwrap_err();
    assert!(err.to_string().contains("runtime"));
}

#[tokio::test]
async fn production_without_secret_fails() {
    let err = TranslationCache::start(CacheConfig::default().with_production(true)).unwrap_err();
    assert!(matches!(err, BabelError::Config(_)));
}

#[tokio::test]
async fn zero_ttl_config_fails() {
    let err = TranslationCache::start(test_config().with_default_ttl(Duration::ZERO)).unwrap_err();
    assert!(matches!(err, BabelError::Config(_)));
}

#[tokio::test]
async fn oversized_cleanup_interval_fails_at_startup() {
    let config = test_config().with_cleanup_interval(Duration::from_secs(u64::MAX));
    let err = TranslationCache::start(config).unwrap_err();
    assert!(matches!(err, BabelError::Config(_)));
}

#[tokio::test]
async fn development_without_secret_generates_one() {
    init_test_tracing();
    let cache = TranslationCache::start(CacheConfig::default()).unwrap();
    let key = product_name_key("es", 1);
    cache.put(&key, "Producto", None).unwrap();
    assert_eq!(cache.get(&key), Some(CacheValue::from("Producto")));
}

#[tokio::test]
async fn clones_share_one_table() {
    let cache = TranslationCache::start(test_config()).unwrap();
    let other = cache.clone();
    other.put(&product_name_key("es", 1), "Producto", None).unwrap();
    assert_eq!(cache.size(), 1);
    assert_eq!(cache.get(&product_name_key("es", 1)), Some(CacheValue::from("Producto")));
}

// ============================================================================
// SHUTDOWN AND DEGRADATION
// ============================================================================

#[tokio::test]
async fn operations_degrade_after_shutdown() {
    init_test_tracing();
    let cache = TranslationCache::start(test_config()).unwrap();
    let key = product_name_key("es", 42);
    cache.put(&key, "Producto", None).unwrap();
    assert!(cache.is_available());

    cache.shutdown().await;
    assert!(!cache.is_available());

    assert_eq!(cache.get(&key), None);
    assert!(cache.put(&key, "Producto", None).is_ok());
    assert_eq!(cache.size(), 0);
    cache.delete(&key);
    cache.clear().await;
    assert_eq!(cache.sweep().await, 0);
    assert_eq!(cache.invalidate_locale("es").await, 0);
    assert_eq!(
        cache
            .delete_pattern(&KeyPattern::for_field("Product", "name"))
            .await
            .unwrap(),
        0
    );
    assert_eq!(cache.stats().await, CacheStats::default());
    assert_eq!(cache.get_or_compute(&key, None, || "fresco"), CacheValue::from("fresco"));
    cache.warmup(["Product"], &[locale("es")]);
}

#[tokio::test]
async fn shutdown_is_idempotent_across_clones() {
    let cache = TranslationCache::start(test_config()).unwrap();
    let other = cache.clone();
    cache.shutdown().await;
    other.shutdown().await;
    assert!(!other.is_available());
}

// ============================================================================
// WARMUP
// ============================================================================

fn catalog() -> Arc<StaticWarmupSource> {
    Arc::new(
        StaticWarmupSource::new()
            .with_entries(
                "Product",
                "es",
                [
                    WarmupEntry::new("name", 1i64, "Producto"),
                    WarmupEntry::new("name", 2i64, "Libro"),
                ],
            )
            .with_entries("Product", "fr", [WarmupEntry::new("name", 1i64, "Produit")])
            .with_entries("Category", "es", [WarmupEntry::new("title", "books", "Libros")])
            .fail_on("Category", "fr", "catalog offline"),
    )
}

#[tokio::test]
async fn warmup_populates_in_background() {
    init_test_tracing();
    let source = catalog();
    let cache = TranslationCache::builder(test_config())
        .with_warmup_source(source.clone())
        .start()
        .unwrap();

    cache.warmup(["Product", "Category"], &[locale("es"), locale("fr")]);

    assert!(eventually(|| cache.size() == 4).await);
    assert!(eventually(|| source.calls().len() == 4).await);
    assert_eq!(
        cache.get(&TranslationCache::build_key("Product", "name", "fr", 1i64)),
        Some(CacheValue::from("Produit"))
    );
    assert_eq!(
        cache.get(&TranslationCache::build_key("Category", "title", "es", "books")),
        Some(CacheValue::from("Libros"))
    );
}

#[tokio::test]
async fn warmup_failures_do_not_roll_back() {
    let source = Arc::new(
        StaticWarmupSource::new()
            .with_entries("Product", "es", [WarmupEntry::new("name", 1i64, "Producto")])
            .fail_on("Product", "fr", "timeout"),
    );
    let cache = TranslationCache::builder(test_config())
        .with_warmup_source(source.clone())
        .start()
        .unwrap();

    cache.warmup(["Product"], &[locale("es"), locale("fr")]);

    assert!(eventually(|| source.calls().len() == 2).await);
    assert!(eventually(|| cache.size() == 1).await);
    assert_eq!(cache.get(&product_name_key("es", 1)), Some(CacheValue::from("Producto")));
}

#[tokio::test]
async fn warmup_without_source_is_ignored() {
    let cache = TranslationCache::start(test_config()).unwrap();
    cache.warmup(["Product"], &[locale("es")]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(cache.size(), 0);
}
