//! Wildcard key patterns for bulk invalidation.
//!
//! A [`KeyPattern`] has one slot per key position; each slot either pins an
//! exact [`KeyPart`] or matches anything. Compiling a pattern reduces it to
//! the list of pinned positions, which is then checked against every key in
//! the table.

use std::fmt;

use babel_core::{CacheError, CacheKey, KeyPart, CANONICAL_ARITY, TRANSLATION_KIND};

/// One position of a key pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternSlot {
    Any,
    Exact(KeyPart),
}

impl PatternSlot {
    pub fn exact(part: impl Into<KeyPart>) -> Self {
        Self::Exact(part.into())
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for PatternSlot {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(part) => Self::Exact(part.into()),
            None => Self::Any,
        }
    }
}

/// A tuple pattern over cache keys of one arity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    slots: Vec<PatternSlot>,
}

impl KeyPattern {
    pub fn new(slots: Vec<PatternSlot>) -> Self {
        Self { slots }
    }

    /// Pattern matching exactly one key.
    pub fn exact(key: &CacheKey) -> Self {
        Self {
            slots: key.parts().iter().cloned().map(PatternSlot::Exact).collect(),
        }
    }

    /// Canonical translation pattern; `None` positions are wildcards.
    pub fn translation(
        resource: Option<&str>,
        field: Option<&str>,
        locale: Option<&str>,
        record_id: Option<KeyPart>,
    ) -> Self {
        Self {
            slots: vec![
                PatternSlot::exact(TRANSLATION_KIND),
                resource.into(),
                field.into(),
                locale.into(),
                record_id.into(),
            ],
        }
    }

    /// Every translation of one record of a resource.
    pub fn for_record(resource: &str, record_id: impl Into<KeyPart>) -> Self {
        Self::translation(Some(resource), None, None, Some(record_id.into()))
    }

    /// Every translation of one field of a resource.
    pub fn for_field(resource: &str, field: &str) -> Self {
        Self::translation(Some(resource), Some(field), None, None)
    }

    /// Every translation in one locale.
    pub fn for_locale(locale: &str) -> Self {
        Self::translation(None, None, Some(locale), None)
    }

    pub fn slots(&self) -> &[PatternSlot] {
        &self.slots
    }

    /// Reduce the pattern to its pinned positions.
    ///
    /// # Errors
    /// `InvalidPattern` for an empty pattern.
    pub fn compile(&self) -> Result<PatternMatcher, CacheError> {
        if self.slots.is_empty() {
            return Err(CacheError::InvalidPattern {
                reason: "pattern has no positions".to_string(),
            });
        }

        let constraints = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(pos, slot)| match slot {
                PatternSlot::Exact(part) => Some((pos, part.clone())),
                PatternSlot::Any => None,
            })
            .collect();

        Ok(PatternMatcher {
            arity: self.slots.len(),
            constraints,
        })
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match slot {
                PatternSlot::Any => f.write_str("*")?,
                PatternSlot::Exact(KeyPart::Text(s)) => write!(f, "{}", s.escape_debug())?,
                PatternSlot::Exact(KeyPart::Int(i)) => write!(f, "{}", i)?,
                PatternSlot::Exact(KeyPart::Bool(b)) => write!(f, "{}", b)?,
                PatternSlot::Exact(KeyPart::Null) => f.write_str("null")?,
            }
        }
        f.write_str(")")
    }
}

/// Compiled predicate: a key matches when it has the pattern's arity and
/// every pinned position holds the required part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatcher {
    arity: usize,
    constraints: Vec<(usize, KeyPart)>,
}

impl PatternMatcher {
    pub fn matches(&self, key: &CacheKey) -> bool {
        let parts = key.parts();
        parts.len() == self.arity
            && self
                .constraints
                .iter()
                .all(|(pos, required)| &parts[*pos] == required)
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// True if this matcher targets the canonical translation shape.
    pub fn is_canonical(&self) -> bool {
        self.arity == CANONICAL_ARITY
            && self
                .constraints
                .first()
                .is_some_and(|(pos, part)| *pos == 0 && part.as_text() == Some(TRANSLATION_KIND))
    }
}
