//! Validated locale identifiers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::KeyRejection;

/// Maximum byte length of a locale string.
pub const MAX_LOCALE_BYTES: usize = 10;

static LOCALE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]{2}(_[A-Z]{2})?$").expect("locale pattern is a valid regex")
});

/// Check a raw locale string against the `<lang>` / `<lang>_<REGION>` format.
pub fn check_locale(raw: &str) -> Result<(), KeyRejection> {
    if raw.len() > MAX_LOCALE_BYTES {
        return Err(KeyRejection::LocaleTooLong {
            len: raw.len(),
            max: MAX_LOCALE_BYTES,
        });
    }
    if !LOCALE_PATTERN.is_match(raw) {
        return Err(KeyRejection::InvalidLocaleFormat);
    }
    Ok(())
}

/// A locale that has passed format validation, e.g. `en` or `en_US`.
///
/// There is no way to obtain a `Locale` from unchecked input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Locale(String);

impl Locale {
    pub fn parse(raw: &str) -> Result<Self, KeyRejection> {
        check_locale(raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two-letter language part.
    pub fn language(&self) -> &str {
        &self.0[..2]
    }

    /// The region part, if present.
    pub fn region(&self) -> Option<&str> {
        self.0.get(3..)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Locale {
    type Err = KeyRejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Locale {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_well_formed_locales_parse(lang in "[a-z]{2}", region in proptest::option::of("[A-Z]{2}")) {
            let raw = match &region {
                Some(r) => format!("{lang}_{r}"),
                None => lang.clone(),
            };
            let locale = Locale::parse(&raw);
            prop_assert!(locale.is_ok());
            let locale = locale.unwrap();
            prop_assert_eq!(locale.language(), lang.as_str());
            prop_assert_eq!(locale.region(), region.as_deref());
        }

        #[test]
        fn prop_parse_never_panics(raw in "\\PC{0,16}") {
            let _ = Locale::parse(&raw);
        }
    }
}
