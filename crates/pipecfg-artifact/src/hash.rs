//! Content-addressed hashing primitives
//!
//! Provides [`ContentHash`], a strongly-typed 32-byte Blake3 hash, and
//! [`canonical_json`], the key-sorted JSON rendering every hash over a
//! structured value is computed from.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde_json::Value as JsonValue;

/// A 32-byte content hash (Blake3)
///
/// Identifies documents in the parse cache and underlies version tokens.
/// Immutable and cheap to clone (Copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create hash from byte slice
    ///
    /// # Errors
    /// Returns error if slice length is not exactly 32 bytes
    #[inline]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| HashError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Compute Blake3 hash of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self::new(*blake3::hash(data).as_bytes())
    }

    /// Hash of the canonical rendering of a JSON value
    ///
    /// Two values that differ only in object key order hash identically.
    #[inline]
    #[must_use]
    pub fn compute_canonical(value: &JsonValue) -> Self {
        Self::compute(canonical_json(value).as_bytes())
    }

    /// Compute hash from serializable value (canonical JSON encoding)
    ///
    /// # Errors
    /// Returns error if serialization fails
    #[inline]
    pub fn compute_serializable<T>(value: &T) -> Result<Self, HashError>
    where
        T: serde::Serialize + ?Sized,
    {
        let json = serde_json::to_value(value)?;
        Ok(Self::compute_canonical(&json))
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8; 32]> for ContentHash {
    fn as_ref(&self) -> &[u8; 32] {
        &self.0
    }
}

impl serde::Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Render a JSON value with object keys sorted at every level
///
/// Strings and keys are escaped exactly as `serde_json` escapes them, so the
/// output is itself valid JSON.
#[must_use]
pub fn canonical_json(value: &JsonValue) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        JsonValue::String(s) => write_string(s, out),
        other => out.push_str(&other.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    // Serializing a plain string never fails.
    out.push_str(&JsonValue::String(s.to_owned()).to_string());
}

/// Errors that can occur when working with content hashes
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Invalid hash length
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Required byte count
        expected: usize,
        /// Byte count received
        actual: usize,
    },

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_hash_from_slice_invalid_length() {
        let bytes = vec![1u8; 31];
        let result = ContentHash::from_slice(&bytes);
        assert!(matches!(
            result,
            Err(HashError::InvalidLength {
                expected: 32,
                actual: 31
            })
        ));
    }

    #[test]
    fn content_hash_compute_deterministic() {
        let h1 = ContentHash::compute(b"pipeline");
        let h2 = ContentHash::compute(b"pipeline");
        assert_eq!(h1, h2);
        assert_ne!(h1, ContentHash::compute(b"pipeline2"));
    }

    #[test]
    fn content_hash_display_and_parse() {
        let hash = ContentHash::compute(b"test");
        let parsed: ContentHash = hash.to_string().parse().unwrap();
        assert_eq!(hash, parsed);
        assert!(hash.to_string().starts_with(&hash.short()));
        assert_eq!(hash.short().len(), 16);
    }

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let a = json!({"b": 1, "a": {"z": true, "y": [1, {"k": "v", "j": null}]}});
        assert_eq!(
            canonical_json(&a),
            r#"{"a":{"y":[1,{"j":null,"k":"v"}],"z":true},"b":1}"#
        );
    }

    #[test]
    fn canonical_json_escapes_strings() {
        let v = json!({"quote\"key": "line\nbreak"});
        let rendered = canonical_json(&v);
        let reparsed: JsonValue = serde_json::from_str(&rendered).unwrap();
        assert_eq!(reparsed, v);
    }

    #[test]
    fn key_order_does_not_change_hash() {
        let a: JsonValue = serde_json::from_str(r#"{"name":"up","stages":[]}"#).unwrap();
        let b: JsonValue = serde_json::from_str(r#"{"stages":[],"name":"up"}"#).unwrap();
        assert_eq!(ContentHash::compute_canonical(&a), ContentHash::compute_canonical(&b));
    }

    #[test]
    fn content_hash_serde_as_hex_string() {
        let hash = ContentHash::compute(b"test");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json.len(), 66);
        let decoded: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, decoded);
    }
}
