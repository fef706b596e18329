//! Warmup source trait.

use async_trait::async_trait;

use crate::{CacheValue, KeyPart, Locale};

/// One translated value produced by a warmup source.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmupEntry {
    pub field: String,
    pub record_id: KeyPart,
    pub value: CacheValue,
}

impl WarmupEntry {
    pub fn new(field: impl Into<String>, record_id: impl Into<KeyPart>, value: impl Into<CacheValue>) -> Self {
        Self {
            field: field.into(),
            record_id: record_id.into(),
            value: value.into(),
        }
    }
}

/// Error type returned by warmup sources.
pub type WarmupError = Box<dyn std::error::Error + Send + Sync>;

/// Loads translations for cache warmup.
///
/// Implemented by the resource layer that owns the translatable records;
/// the cache only calls it from background tasks.
#[async_trait]
pub trait WarmupSource: Send + Sync {
    /// Load every translated `(field, record_id, value)` of `resource` in
    /// `locale`.
    async fn load(&self, resource: &str, locale: &Locale) -> Result<Vec<WarmupEntry>, WarmupError>;
}
