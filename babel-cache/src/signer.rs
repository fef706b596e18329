//! Payload signing and verification.
//!
//! Values are encoded with bincode (the `CacheValue` enum tags make the
//! encoding self-describing) and tagged with HMAC-SHA256 over the encoded
//! bytes. Tags are compared in constant time, and bytes are only decoded
//! after the tag checks out.

use babel_core::{CacheSecret, CacheValue, SignatureError};
use bincode::Options;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 tag.
pub const TAG_LEN: usize = 32;

/// Deepest value nesting accepted for signing.
pub const MAX_VALUE_DEPTH: usize = 32;

/// Serialized value plus its integrity tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    bytes: Vec<u8>,
    tag: [u8; TAG_LEN],
}

impl SignedPayload {
    /// Reassemble a payload from raw parts. Nothing is checked until
    /// [`Signer::verify`].
    pub fn from_parts(bytes: Vec<u8>, tag: [u8; TAG_LEN]) -> Self {
        Self { bytes, tag }
    }

    pub fn into_parts(self) -> (Vec<u8>, [u8; TAG_LEN]) {
        (self.bytes, self.tag)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn tag(&self) -> &[u8; TAG_LEN] {
        &self.tag
    }

    /// Total stored size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len() + TAG_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Signs and verifies cache payloads with a fixed secret.
#[derive(Debug, Clone)]
pub struct Signer {
    secret: CacheSecret,
    max_payload_bytes: usize,
}

impl Signer {
    pub fn new(secret: CacheSecret, max_payload_bytes: usize) -> Self {
        Self {
            secret,
            max_payload_bytes,
        }
    }

    fn codec(&self) -> impl Options {
        bincode::DefaultOptions::new()
            .with_limit(self.max_payload_bytes as u64)
            .reject_trailing_bytes()
    }

    fn mac(&self) -> Result<HmacSha256, String> {
        // HMAC accepts keys of any length; this only fails on a broken build.
        HmacSha256::new_from_slice(self.secret.expose())
            .map_err(|e| format!("failed to initialize HMAC: {}", e))
    }

    /// Serialize `value` and compute its tag.
    ///
    /// # Errors
    /// `SigningFailed` if the value nests deeper than [`MAX_VALUE_DEPTH`] or
    /// encodes to more than the configured payload limit.
    pub fn sign(&self, value: &CacheValue) -> Result<SignedPayload, SignatureError> {
        let depth = value.depth();
        if depth > MAX_VALUE_DEPTH {
            return Err(SignatureError::SigningFailed {
                reason: format!("value nests {} levels, limit is {}", depth, MAX_VALUE_DEPTH),
            });
        }

        let bytes = self
            .codec()
            .serialize(value)
            .map_err(|e| SignatureError::SigningFailed {
                reason: e.to_string(),
            })?;

        let mut mac = self
            .mac()
            .map_err(|reason| SignatureError::SigningFailed { reason })?;
        mac.update(&bytes);
        let tag: [u8; TAG_LEN] = mac.finalize().into_bytes().into();

        Ok(SignedPayload { bytes, tag })
    }

    /// Check the tag and decode the value.
    ///
    /// # Errors
    /// - `SignatureInvalid` if the tag does not match the bytes
    /// - `VerificationFailed` if the bytes carry a valid tag but do not
    ///   decode within the payload limit
    pub fn verify(&self, payload: &SignedPayload) -> Result<CacheValue, SignatureError> {
        let mut mac = self
            .mac()
            .map_err(|reason| SignatureError::VerificationFailed { reason })?;
        mac.update(&payload.bytes);
        mac.verify_slice(&payload.tag)
            .map_err(|_| SignatureError::SignatureInvalid)?;

        self.codec()
            .deserialize::<CacheValue>(&payload.bytes)
            .map_err(|e| SignatureError::VerificationFailed {
                reason: e.to_string(),
            })
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_any_bit_flip_is_detected(
            text in "\\PC{0,64}",
            flip in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let signer = Signer::new(CacheSecret::new(vec![1u8; 32]).unwrap(), 4096);
            let (mut bytes, mut tag) = signer.sign(&CacheValue::from(text)).unwrap().into_parts();

            let total = bytes.len() + TAG_LEN;
            let pos = flip.index(total);
            if pos < bytes.len() {
                bytes[pos] ^= 1 << bit;
            } else {
                tag[pos - bytes.len()] ^= 1 << bit;
            }

            let tampered = SignedPayload::from_parts(bytes, tag);
            prop_assert_eq!(signer.verify(&tampered), Err(SignatureError::SignatureInvalid));
        }
    }
}
