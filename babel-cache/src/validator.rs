//! Structural validation of cache keys.
//!
//! Only the canonical `("translation", resource, field, locale, record_id)`
//! shape is checked. Every other shape passes unchecked so that legacy
//! callers with ad-hoc tuple keys keep working.

use std::collections::HashSet;

use babel_core::{check_locale, CacheKey, KeyPart, KeyRejection};
use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum byte length of a resource type name.
pub const MAX_RESOURCE_BYTES: usize = 200;

/// Maximum byte length of a field name.
pub const MAX_FIELD_BYTES: usize = 100;

/// Maximum byte length of a record id rendered as text.
pub const MAX_RECORD_ID_BYTES: usize = 100;

/// Dotted type path such as `Catalog.Product`.
static RESOURCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][A-Za-z0-9_]*(\.[A-Z][A-Za-z0-9_]*)*$")
        .expect("resource pattern is a valid regex")
});

/// Validates the shape of cache keys before they reach the store.
#[derive(Debug, Clone, Default)]
pub struct KeyValidator {
    /// Accepted resource names. Empty accepts any well-formed type name.
    registered: HashSet<String>,
}

impl KeyValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict canonical keys to the given resource type names.
    pub fn with_registered_resources<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            registered: resources.into_iter().map(Into::into).collect(),
        }
    }

    /// Check a key. Non-canonical shapes always pass.
    pub fn validate(&self, key: &CacheKey) -> Result<(), KeyRejection> {
        if !key.is_canonical_shape() {
            return Ok(());
        }

        let parts = key.parts();
        self.check_resource(&parts[1])?;
        check_field(&parts[2])?;
        check_locale_part(&parts[3])?;
        check_record_id(&parts[4])
    }

    fn check_resource(&self, part: &KeyPart) -> Result<(), KeyRejection> {
        let name = part
            .as_text()
            .ok_or(KeyRejection::InvalidResourceType { kind: part.kind() })?;

        // Length first so oversized input never reaches the regex.
        if name.len() > MAX_RESOURCE_BYTES {
            return Err(KeyRejection::ResourceNameTooLong {
                len: name.len(),
                max: MAX_RESOURCE_BYTES,
            });
        }
        if !RESOURCE_PATTERN.is_match(name) {
            return Err(KeyRejection::InvalidResourceName);
        }
        if !self.registered.is_empty() && !self.registered.contains(name) {
            return Err(KeyRejection::UnregisteredResource);
        }
        Ok(())
    }
}

fn check_field(part: &KeyPart) -> Result<(), KeyRejection> {
    let name = part.as_text().ok_or(KeyRejection::InvalidFieldName)?;
    if name.len() > MAX_FIELD_BYTES {
        return Err(KeyRejection::FieldNameTooLong {
            len: name.len(),
            max: MAX_FIELD_BYTES,
        });
    }
    if name.is_empty() {
        return Err(KeyRejection::InvalidFieldName);
    }
    Ok(())
}

fn check_locale_part(part: &KeyPart) -> Result<(), KeyRejection> {
    let locale = part.as_text().ok_or(KeyRejection::InvalidLocaleFormat)?;
    check_locale(locale)
}

fn check_record_id(part: &KeyPart) -> Result<(), KeyRejection> {
    match part {
        KeyPart::Text(_) | KeyPart::Int(_) => {
            let len = part.rendered_len();
            if len > MAX_RECORD_ID_BYTES {
                return Err(KeyRejection::RecordIdTooLong {
                    len,
                    max: MAX_RECORD_ID_BYTES,
                });
            }
            Ok(())
        }
        other => Err(KeyRejection::InvalidRecordId { kind: other.kind() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(resource: &str, field: &str, locale: &str, id: impl Into<KeyPart>) -> CacheKey {
        CacheKey::translation(resource, field, locale, id)
    }

    #[test]
    fn test_accepts_canonical_keys() {
        let validator = KeyValidator::new();
        assert!(validator.validate(&key("Product", "name", "es", "42")).is_ok());
        assert!(validator.validate(&key("Catalog.Product", "description", "en_US", 42i64)).is_ok());
    }

    #[test]
    fn test_resource_checks() {
        let validator = KeyValidator::new();
        let long = format!("P{}", "x".repeat(MAX_RESOURCE_BYTES));
        assert_eq!(
            validator.validate(&key(&long, "name", "es", "1")),
            Err(KeyRejection::ResourceNameTooLong { len: 201, max: 200 })
        );
        assert_eq!(
            validator.validate(&key("product", "name", "es", "1")),
            Err(KeyRejection::InvalidResourceName)
        );
        assert_eq!(
            validator.validate(&key("Product;DROP", "name", "es", "1")),
            Err(KeyRejection::InvalidResourceName)
        );

        let int_resource = CacheKey::from_parts(vec![
            "translation".into(),
            7i64.into(),
            "name".into(),
            "es".into(),
            "1".into(),
        ]);
        assert_eq!(
            validator.validate(&int_resource),
            Err(KeyRejection::InvalidResourceType { kind: "integer" })
        );
    }

    #[test]
    fn test_registered_resources() {
        let validator = KeyValidator::with_registered_resources(["Product"]);
        assert!(validator.validate(&key("Product", "name", "es", "1")).is_ok());
        assert_eq!(
            validator.validate(&key("Category", "name", "es", "1")),
            Err(KeyRejection::UnregisteredResource)
        );
    }

    #[test]
    fn test_field_checks() {
        let validator = KeyValidator::new();
        let long = "f".repeat(MAX_FIELD_BYTES + 1);
        assert_eq!(
            validator.validate(&key("Product", &long, "es", "1")),
            Err(KeyRejection::FieldNameTooLong { len: 101, max: 100 })
        );
        assert_eq!(
            validator.validate(&key("Product", "", "es", "1")),
            Err(KeyRejection::InvalidFieldName)
        );
        assert!(validator
            .validate(&key("Product", &"f".repeat(MAX_FIELD_BYTES), "es", "1"))
            .is_ok());
    }

    #[test]
    fn test_locale_checks() {
        let validator = KeyValidator::new();
        for bad in ["ES", "xx-XX", "english", "en_us"] {
            assert_eq!(
                validator.validate(&key("Product", "name", bad, "1")),
                Err(KeyRejection::InvalidLocaleFormat),
                "{bad:?}"
            );
        }
        assert_eq!(
            validator.validate(&key("Product", "name", "en_US.UTF-8", "1")),
            Err(KeyRejection::LocaleTooLong { len: 11, max: 10 })
        );
    }

    #[test]
    fn test_record_id_checks() {
        let validator = KeyValidator::new();
        let long = "9".repeat(MAX_RECORD_ID_BYTES + 1);
        assert_eq!(
            validator.validate(&key("Product", "name", "es", long)),
            Err(KeyRejection::RecordIdTooLong { len: 101, max: 100 })
        );
        assert_eq!(
            validator.validate(&key("Product", "name", "es", true)),
            Err(KeyRejection::InvalidRecordId { kind: "bool" })
        );
        assert_eq!(
            validator.validate(&key("Product", "name", "es", None::<i64>)),
            Err(KeyRejection::InvalidRecordId { kind: "null" })
        );
        assert!(validator.validate(&key("Product", "name", "es", i64::MIN)).is_ok());
    }

    #[test]
    fn test_float_record_id_as_text() {
        let validator = KeyValidator::new();
        let id = 12.5f64.to_string();
        let a = key("Product", "name", "es", id.as_str());
        assert!(validator.validate(&a).is_ok());
        assert_eq!(a, key("Product", "name", "es", "12.5"));
    }

    #[test]
    fn test_non_canonical_shapes_pass() {
        let validator = KeyValidator::with_registered_resources(["Product"]);
        let legacy = CacheKey::from_parts(vec!["legacy".into(), "ES".into()]);
        assert!(validator.validate(&legacy).is_ok());

        // Right kind, wrong arity: not canonical, not checked.
        let four = CacheKey::from_parts(vec![
            "translation".into(),
            "lower".into(),
            "name".into(),
            "ES".into(),
        ]);
        assert!(validator.validate(&four).is_ok());
    }
}
