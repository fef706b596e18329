//! Babel translation cache.
//!
//! An in-memory, concurrently accessed cache for translated field values.
//! Every entry is HMAC-signed on write and verified on read, canonical keys
//! are validated before they touch the table, and whole groups of entries
//! can be dropped with wildcard patterns.
//!
//! ```ignore
//! use babel_cache::TranslationCache;
//! use babel_core::CacheConfig;
//!
//! let cache = TranslationCache::start(CacheConfig::from_env()?)?;
//! let key = TranslationCache::build_key("Product", "name", "es", 42);
//! cache.put(&key, "Producto", None)?;
//! assert_eq!(cache.get(&key).and_then(|v| v.as_text().map(str::to_owned)), Some("Producto".into()));
//! cache.invalidate_field("Product", "name").await;
//! ```

pub mod cache;
mod owner;
pub mod pattern;
pub mod signer;
pub mod stats;
mod store;
mod supervisor;
pub mod validator;
mod warmup;

pub use cache::{CacheBuilder, TranslationCache};
pub use pattern::{KeyPattern, PatternMatcher, PatternSlot};
pub use signer::{SignedPayload, Signer, MAX_VALUE_DEPTH, TAG_LEN};
pub use stats::{hit_rate, CacheStats, StatsCollector, StatsEvent};
pub use store::MAX_TTL;
pub use validator::{KeyValidator, MAX_FIELD_BYTES, MAX_RECORD_ID_BYTES, MAX_RESOURCE_BYTES};
