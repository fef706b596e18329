//! Cache key types.
//!
//! A [`CacheKey`] is an ordered tuple of [`KeyPart`]s. The canonical shape is
//! `("translation", resource, field, locale, record_id)`; every other shape is
//! carried as-is for legacy callers and is not structurally validated.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// First part of every canonical translation key.
pub const TRANSLATION_KIND: &str = "translation";

/// Number of parts in a canonical translation key.
pub const CANONICAL_ARITY: usize = 5;

/// Number of hex characters kept from the key fingerprint.
const FINGERPRINT_HEX_LEN: usize = 16;

/// One position of a cache key tuple.
///
/// There is no float variant: `f64` is neither `Eq` nor `Hash`. Record ids
/// that are floats are passed as their text rendering, e.g. `"12.5"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl KeyPart {
    /// Short name of the part's kind, safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Text(_) => "text",
        }
    }

    /// Borrow the text content, if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Length in bytes of the part rendered as text.
    pub fn rendered_len(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Bool(b) => {
                if *b {
                    4
                } else {
                    5
                }
            }
            Self::Int(i) => i.to_string().len(),
            Self::Text(s) => s.len(),
        }
    }

    /// Feed an unambiguous encoding of this part into a hasher.
    fn digest_into(&self, hasher: &mut Sha256) {
        match self {
            Self::Null => hasher.update([0u8]),
            Self::Bool(b) => hasher.update([1u8, *b as u8]),
            Self::Int(i) => {
                hasher.update([2u8]);
                hasher.update(i.to_be_bytes());
            }
            Self::Text(s) => {
                hasher.update([3u8]);
                hasher.update((s.len() as u64).to_be_bytes());
                hasher.update(s.as_bytes());
            }
        }
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for KeyPart {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Immutable structured cache key, compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    parts: Vec<KeyPart>,
}

impl CacheKey {
    /// Build a canonical translation key.
    ///
    /// The key is not validated here; validation happens when the key is
    /// presented to the cache.
    pub fn translation(
        resource: impl Into<String>,
        field: impl Into<String>,
        locale: impl Into<String>,
        record_id: impl Into<KeyPart>,
    ) -> Self {
        Self {
            parts: vec![
                KeyPart::Text(TRANSLATION_KIND.to_string()),
                KeyPart::Text(resource.into()),
                KeyPart::Text(field.into()),
                KeyPart::Text(locale.into()),
                record_id.into(),
            ],
        }
    }

    /// Build a key of arbitrary shape.
    pub fn from_parts(parts: Vec<KeyPart>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    pub fn arity(&self) -> usize {
        self.parts.len()
    }

    /// True when the key has the canonical `("translation", _, _, _, _)` shape
    /// and is therefore subject to strict validation.
    pub fn is_canonical_shape(&self) -> bool {
        self.parts.len() == CANONICAL_ARITY
            && self.parts[0].as_text() == Some(TRANSLATION_KIND)
    }

    /// Approximate heap footprint of the key in bytes.
    pub fn approximate_size(&self) -> usize {
        self.parts
            .iter()
            .map(|p| std::mem::size_of::<KeyPart>() + p.as_text().map_or(0, str::len))
            .sum::<usize>()
            + std::mem::size_of::<Self>()
    }

    /// SHA-256 fingerprint of the key, truncated to a short hex prefix.
    ///
    /// Lets audit records correlate rejected keys without carrying their
    /// content.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.parts.len() as u64).to_be_bytes());
        for part in &self.parts {
            part.digest_into(&mut hasher);
        }
        let digest = hex::encode(hasher.finalize());
        digest[..FINGERPRINT_HEX_LEN].to_string()
    }

    /// Render the key for logs: part kinds and byte lengths plus the
    /// fingerprint, never the raw content.
    pub fn redacted(&self) -> String {
        let mut out = String::from("key(");
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match part {
                KeyPart::Text(s) => {
                    let _ = write!(out, "text[{}]", s.len());
                }
                other => out.push_str(other.kind()),
            }
        }
        let _ = write!(out, ")#{}", self.fingerprint());
        out
    }
}
