//! Fuzz test for canonical key validation.
//!
//! Splits the input into four key parts and checks that validation never
//! panics, and that accepted keys respect every length bound.
//!
//! Run with: cargo +nightly fuzz run key_validation_fuzz -- -max_total_time=60

#![no_main]

use babel_cache::{KeyValidator, MAX_FIELD_BYTES, MAX_RECORD_ID_BYTES, MAX_RESOURCE_BYTES};
use babel_core::{CacheKey, MAX_LOCALE_BYTES};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let mut parts = input.splitn(4, '\u{1f}');
    let resource = parts.next().unwrap_or_default();
    let field = parts.next().unwrap_or_default();
    let locale = parts.next().unwrap_or_default();
    let record_id = parts.next().unwrap_or_default();

    let key = CacheKey::translation(resource, field, locale, record_id);
    let validator = KeyValidator::new();

    if validator.validate(&key).is_ok() {
        assert!(resource.len() <= MAX_RESOURCE_BYTES);
        assert!(!field.is_empty() && field.len() <= MAX_FIELD_BYTES);
        assert!(locale.len() <= MAX_LOCALE_BYTES);
        assert!(record_id.len() <= MAX_RECORD_ID_BYTES);
        assert!(resource.starts_with(|c: char| c.is_ascii_uppercase()));
    }

    // The redacted form never leaks the raw parts.
    let redacted = key.redacted();
    if resource.len() > 8 && resource.chars().any(|c| c.is_ascii_uppercase()) {
        assert!(!redacted.contains(resource));
    }
});
