//! Cacheable values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value that can be stored in the translation cache.
///
/// The enum is closed: decoding a payload can only ever produce these
/// variants, and map keys stay plain owned strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CacheValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<CacheValue>),
    Map(BTreeMap<String, CacheValue>),
}

impl CacheValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, CacheValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Nesting depth; scalars have depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Self::List(items) => 1 + items.iter().map(Self::depth).max().unwrap_or(0),
            Self::Map(entries) => 1 + entries.values().map(Self::depth).max().unwrap_or(0),
            _ => 1,
        }
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for CacheValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for CacheValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for CacheValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<CacheValue>> for CacheValue {
    fn from(value: Vec<CacheValue>) -> Self {
        Self::List(value)
    }
}

impl From<BTreeMap<String, CacheValue>> for CacheValue {
    fn from(value: BTreeMap<String, CacheValue>) -> Self {
        Self::Map(value)
    }
}

impl From<serde_json::Value> for CacheValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<CacheValue> for serde_json::Value {
    fn from(value: CacheValue) -> Self {
        use serde_json::Value;
        match value {
            CacheValue::Null => Value::Null,
            CacheValue::Bool(b) => Value::Bool(b),
            CacheValue::Int(i) => Value::from(i),
            CacheValue::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CacheValue::Text(s) => Value::String(s),
            CacheValue::Bytes(b) => Value::Array(b.into_iter().map(Value::from).collect()),
            CacheValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            CacheValue::Map(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}
