//! Cache configuration.

use rand::RngCore;
use secrecy::{ExposeSecret, SecretBox};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{BabelResult, ConfigError};

/// Default time-to-live for cached entries.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Default interval between expiry sweeps.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Longest accepted interval between expiry sweeps (one day).
pub const MAX_CLEANUP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Default upper bound for a serialized payload.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Minimum accepted signing secret length.
pub const MIN_SECRET_BYTES: usize = 32;

/// Restarts tolerated within [`DEFAULT_RESTART_WINDOW_SECS`].
pub const DEFAULT_MAX_RESTARTS: u32 = 3;

pub const DEFAULT_RESTART_WINDOW_SECS: u64 = 5;

// ============================================================================
// SIGNING SECRET
// ============================================================================

/// Process-wide key for payload integrity tags.
///
/// Wrapped in `secrecy` so it never ends up in `Debug` output or logs.
/// Cloning shares the same underlying allocation.
#[derive(Clone)]
pub struct CacheSecret(Arc<SecretBox<[u8]>>);

impl CacheSecret {
    /// Wrap raw key material.
    ///
    /// # Errors
    /// Returns error if the secret is shorter than [`MIN_SECRET_BYTES`].
    pub fn new(bytes: Vec<u8>) -> Result<Self, ConfigError> {
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::InvalidValue {
                field: "cache_secret".to_string(),
                value: format!("<{} bytes>", bytes.len()),
                reason: format!("must be at least {} bytes", MIN_SECRET_BYTES),
            });
        }
        Ok(Self(Arc::new(SecretBox::new(bytes.into_boxed_slice()))))
    }

    /// Decode a hex-encoded secret.
    pub fn from_hex(encoded: &str) -> Result<Self, ConfigError> {
        let bytes = hex::decode(encoded.trim()).map_err(|e| ConfigError::InvalidValue {
            field: "cache_secret".to_string(),
            value: "<redacted>".to_string(),
            reason: format!("not valid hex: {}", e),
        })?;
        Self::new(bytes)
    }

    /// Generate a fresh random secret.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; MIN_SECRET_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(Arc::new(SecretBox::new(bytes.into_boxed_slice())))
    }

    /// Expose the key material (only for MAC computation).
    pub fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl fmt::Debug for CacheSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CacheSecret([REDACTED])")
    }
}

// ============================================================================
// CACHE CONFIG
// ============================================================================

/// Configuration for the translation cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Signing secret. `None` means a random one is generated at start.
    pub secret: Option<CacheSecret>,
    /// TTL applied when `put` is called without one.
    pub default_ttl: Duration,
    /// Interval between background expiry sweeps.
    pub cleanup_interval: Duration,
    /// Upper bound for serialized payloads, enforced on sign and on decode.
    pub max_payload_bytes: usize,
    /// Resource type names accepted in canonical keys. Empty accepts any
    /// well-formed type name.
    pub registered_resources: Vec<String>,
    /// Production mode makes a missing secret a startup error.
    pub production: bool,
    /// Owner restarts tolerated within `restart_window` before giving up.
    pub max_restarts: u32,
    pub restart_window: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            secret: None,
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            registered_resources: Vec::new(),
            production: false,
            max_restarts: DEFAULT_MAX_RESTARTS,
            restart_window: Duration::from_secs(DEFAULT_RESTART_WINDOW_SECS),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create CacheConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `BABEL_CACHE_SECRET`: hex-encoded signing secret (required in production)
    /// - `BABEL_CACHE_DEFAULT_TTL_SECS`: default entry TTL (default: 3600)
    /// - `BABEL_CACHE_CLEANUP_INTERVAL_SECS`: expiry sweep interval (default: 300, max: 86400)
    /// - `BABEL_CACHE_MAX_PAYLOAD_BYTES`: payload size limit (default: 1 MiB)
    /// - `BABEL_CACHE_RESOURCES`: comma-separated resource allowlist
    /// - `BABEL_ENV`: `production` enables production checks
    ///
    /// # Errors
    /// Returns error if `BABEL_CACHE_SECRET` is set but malformed.
    pub fn from_env() -> BabelResult<Self> {
        let secret = match std::env::var("BABEL_CACHE_SECRET") {
            Ok(raw) if !raw.trim().is_empty() => Some(CacheSecret::from_hex(&raw)?),
            _ => None,
        };

        let default_ttl = Duration::from_secs(
            std::env::var("BABEL_CACHE_DEFAULT_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TTL_SECS),
        );

        let cleanup_interval = Duration::from_secs(
            std::env::var("BABEL_CACHE_CLEANUP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS),
        );

        let max_payload_bytes = std::env::var("BABEL_CACHE_MAX_PAYLOAD_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_PAYLOAD_BYTES);

        let registered_resources = std::env::var("BABEL_CACHE_RESOURCES")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let production = std::env::var("BABEL_ENV")
            .ok()
            .map(|s| s.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Ok(Self {
            secret,
            default_ttl,
            cleanup_interval,
            max_payload_bytes,
            registered_resources,
            production,
            ..Self::default()
        })
    }

    pub fn with_secret(mut self, secret: CacheSecret) -> Self {
        self.secret = Some(secret);
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.max_payload_bytes = max;
        self
    }

    pub fn with_registered_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registered_resources = resources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn with_restart_policy(mut self, max_restarts: u32, window: Duration) -> Self {
        self.max_restarts = max_restarts;
        self.restart_window = window;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - durations are non-zero
    /// - cleanup_interval <= MAX_CLEANUP_INTERVAL_SECS
    /// - max_payload_bytes > 0
    /// - a secret is present when running in production
    pub fn validate(&self) -> BabelResult<()> {
        if self.default_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "default_ttl".to_string(),
                value: "0".to_string(),
                reason: "default_ttl must be greater than 0".to_string(),
            }
            .into());
        }

        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "cleanup_interval".to_string(),
                value: "0".to_string(),
                reason: "cleanup_interval must be greater than 0".to_string(),
            }
            .into());
        }

        if self.cleanup_interval > Duration::from_secs(MAX_CLEANUP_INTERVAL_SECS) {
            return Err(ConfigError::InvalidValue {
                field: "cleanup_interval".to_string(),
                value: format!("{}s", self.cleanup_interval.as_secs()),
                reason: format!(
                    "cleanup_interval must be at most {} seconds",
                    MAX_CLEANUP_INTERVAL_SECS
                ),
            }
            .into());
        }

        if self.max_payload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_payload_bytes".to_string(),
                value: "0".to_string(),
                reason: "max_payload_bytes must be greater than 0".to_string(),
            }
            .into());
        }

        if self.production && self.secret.is_none() {
            return Err(ConfigError::MissingRequired {
                field: "cache_secret".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Return the configured secret, or generate one with a warning.
    ///
    /// A generated secret means cached payloads do not survive a restart
    /// of the signing key, and it is never shared across processes.
    pub fn resolve_secret(&self) -> CacheSecret {
        match &self.secret {
            Some(secret) => secret.clone(),
            None => {
                tracing::warn!(
                    "No cache secret configured; generated a random signing key. \
                     Set BABEL_CACHE_SECRET for stable, audited deployments"
                );
                CacheSecret::generate()
            }
        }
    }
}
