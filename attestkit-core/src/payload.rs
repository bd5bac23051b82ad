//! Canonical JSON encoding of assertion payloads.
//!
//! The bytes hashed for an assertion must be the bytes the server rehashes, so
//! object keys are emitted in sorted order at every nesting level. Sorting is by
//! UTF-8 byte order, which is what `BTreeMap<String, _>` iterates in.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

use crate::error::{AppAttestError, AppAttestResult};

/// A JSON-like assertion payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number. Always finite, and re-emitted with the digits it was parsed from.
    Number(Number),
    /// JSON string.
    String(String),
    /// JSON array, order preserved.
    Array(Vec<Payload>),
    /// JSON object, keys kept sorted.
    Object(BTreeMap<String, Payload>),
}

impl Payload {
    /// Returns an empty object payload.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Object(BTreeMap::new())
    }

    /// Builds a number payload from a float.
    ///
    /// # Errors
    /// Returns [`AppAttestError::InvalidPayload`] for `NaN` and infinities, which have
    /// no JSON representation.
    pub fn float(value: f64) -> AppAttestResult<Self> {
        Number::from_f64(value)
            .map(Self::Number)
            .ok_or_else(|| AppAttestError::InvalidPayload {
                reason: format!("{value} is not representable in JSON"),
            })
    }

    /// Parses a request body into a payload.
    ///
    /// An empty (or whitespace-only) body is treated as the empty object.
    ///
    /// # Errors
    /// - [`AppAttestError::SerializationError`] if the body is not JSON.
    /// - [`AppAttestError::InvalidPayload`] if the body is JSON but not an object.
    pub fn from_json_slice(body: &[u8]) -> AppAttestResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::empty());
        }

        let value: Value = serde_json::from_slice(body)?;
        if !value.is_object() {
            return Err(AppAttestError::InvalidPayload {
                reason: "request body must be a JSON object".to_string(),
            });
        }
        Ok(value.into())
    }

    /// Serializes the payload with sorted object keys and no insignificant whitespace.
    ///
    /// # Errors
    /// Returns [`AppAttestError::SerializationError`] if serialization fails.
    pub fn canonical_bytes(&self) -> AppAttestResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Converts the payload back into a `serde_json::Value`.
    #[must_use]
    pub fn to_json_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json_value).collect()),
            Self::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json_value()))
                    .collect(),
            ),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => items.serialize(serializer),
            Self::Object(map) => map.serialize(serializer),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for Payload {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl<K: Into<String>> FromIterator<(K, Payload)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, Payload)>>(iter: I) -> Self {
        Self::Object(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
