//! Babel Core - Translation Cache Types
//!
//! Pure data types and collaborator traits shared by the cache engine and
//! its callers. No caching behavior lives here.

pub mod audit;
pub mod config;
pub mod error;
pub mod key;
pub mod locale;
pub mod value;
pub mod warmup;

pub use audit::{AuditEvent, AuditSink, TracingAuditSink};
pub use config::{
    CacheConfig, CacheSecret, DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_MAX_PAYLOAD_BYTES,
    DEFAULT_TTL_SECS, MAX_CLEANUP_INTERVAL_SECS, MIN_SECRET_BYTES,
};
pub use error::{BabelError, BabelResult, CacheError, ConfigError, KeyRejection, SignatureError};
pub use key::{CacheKey, KeyPart, CANONICAL_ARITY, TRANSLATION_KIND};
pub use locale::{check_locale, Locale, MAX_LOCALE_BYTES};
pub use value::CacheValue;
pub use warmup::{WarmupEntry, WarmupError, WarmupSource};
