//! Audit events emitted by the cache.
//!
//! The cache reports validation rejections, integrity failures, and bulk
//! invalidations to an [`AuditSink`]. The sink is an external collaborator;
//! [`TracingAuditSink`] forwards everything to `tracing` under the
//! `babel::audit` target.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A security-relevant event observed by the cache.
///
/// Keys are always carried in redacted form (see `CacheKey::redacted`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A canonical key failed structural validation.
    KeyRejected {
        reason: String,
        key: String,
        operation: String,
        at: DateTime<Utc>,
    },
    /// A stored payload's integrity tag did not match; the entry was removed.
    SignatureInvalid { key: String, at: DateTime<Utc> },
    /// A payload with a valid tag could not be decoded; the entry was removed.
    VerificationFailed {
        key: String,
        reason: String,
        at: DateTime<Utc>,
    },
    /// A value could not be serialized and was not cached.
    SigningFailed {
        key: String,
        reason: String,
        at: DateTime<Utc>,
    },
    /// Entries removed by a pattern invalidation.
    PatternInvalidated {
        pattern: String,
        count: u64,
        at: DateTime<Utc>,
    },
}

impl AuditEvent {
    pub fn key_rejected(reason: &str, key: String, operation: &str) -> Self {
        Self::KeyRejected {
            reason: reason.to_string(),
            key,
            operation: operation.to_string(),
            at: Utc::now(),
        }
    }

    pub fn signature_invalid(key: String) -> Self {
        Self::SignatureInvalid { key, at: Utc::now() }
    }

    pub fn verification_failed(key: String, reason: impl Into<String>) -> Self {
        Self::VerificationFailed {
            key,
            reason: reason.into(),
            at: Utc::now(),
        }
    }

    pub fn signing_failed(key: String, reason: impl Into<String>) -> Self {
        Self::SigningFailed {
            key,
            reason: reason.into(),
            at: Utc::now(),
        }
    }

    pub fn pattern_invalidated(pattern: String, count: u64) -> Self {
        Self::PatternInvalidated {
            pattern,
            count,
            at: Utc::now(),
        }
    }

    /// Short event name, matching the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::KeyRejected { .. } => "key_rejected",
            Self::SignatureInvalid { .. } => "signature_invalid",
            Self::VerificationFailed { .. } => "verification_failed",
            Self::SigningFailed { .. } => "signing_failed",
            Self::PatternInvalidated { .. } => "pattern_invalidated",
        }
    }
}

/// Receiver for audit events.
///
/// Called inline on the cache's hot path, so implementations should hand
/// events off rather than block.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Audit sink that writes events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match &event {
            AuditEvent::KeyRejected {
                reason,
                key,
                operation,
                ..
            } => {
                tracing::warn!(
                    target: "babel::audit",
                    reason = %reason,
                    key = %key,
                    operation = %operation,
                    "Cache key rejected"
                );
            }
            AuditEvent::SignatureInvalid { key, .. } => {
                tracing::warn!(
                    target: "babel::audit",
                    key = %key,
                    "Cache entry failed signature verification, entry removed"
                );
            }
            AuditEvent::VerificationFailed { key, reason, .. } => {
                tracing::error!(
                    target: "babel::audit",
                    key = %key,
                    reason = %reason,
                    "Cache entry could not be decoded, entry removed"
                );
            }
            AuditEvent::SigningFailed { key, reason, .. } => {
                tracing::error!(
                    target: "babel::audit",
                    key = %key,
                    reason = %reason,
                    "Cache value could not be signed, not cached"
                );
            }
            AuditEvent::PatternInvalidated { pattern, count, .. } => {
                tracing::info!(
                    target: "babel::audit",
                    pattern = %pattern,
                    count = count,
                    "Cache entries invalidated by pattern"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = AuditEvent::pattern_invalidated("(translation, *, *, es, *)".into(), 3);
        let json = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(json["event"], "pattern_invalidated");
        assert_eq!(json["count"], 3);
        assert_eq!(event.name(), "pattern_invalidated");
    }

    #[test]
    fn test_tracing_sink_accepts_all_events() {
        let sink = TracingAuditSink;
        sink.record(AuditEvent::key_rejected("invalid_locale_format", "key()".into(), "put"));
        sink.record(AuditEvent::signature_invalid("key()".into()));
        sink.record(AuditEvent::verification_failed("key()".into(), "eof"));
        sink.record(AuditEvent::signing_failed("key()".into(), "too large"));
        sink.record(AuditEvent::pattern_invalidated("*".into(), 0));
    }
}
