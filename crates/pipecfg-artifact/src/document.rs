//! Versioned configuration document
//!
//! The byte-level form of the configuration: a JSON object whose root carries
//! a mandatory integer `schemaVersion`. YAML input is accepted and converted
//! on read; output is always JSON.

use serde_json::Value as JsonValue;

use crate::hash::{canonical_json, ContentHash};

/// Root attribute holding the schema version
pub const SCHEMA_VERSION_KEY: &str = "schemaVersion";

/// A configuration document, as read from or written to the store
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    /// Parsed JSON value
    value: JsonValue,

    /// Cached canonical hash
    hash: ContentHash,
}

impl ConfigDocument {
    /// Create from JSON value
    #[inline]
    #[must_use]
    pub fn new(value: JsonValue) -> Self {
        let hash = ContentHash::compute_canonical(&value);
        Self { value, hash }
    }

    /// Parse raw bytes, JSON if the first significant character opens an
    /// object, YAML otherwise
    ///
    /// # Errors
    /// Returns error for non UTF-8 input or syntax errors
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let text = std::str::from_utf8(bytes).map_err(|_| DocumentError::NotUtf8)?;
        if text.trim_start().starts_with('{') {
            Self::from_json(text)
        } else {
            Self::from_yaml(text)
        }
    }

    /// Parse from JSON string
    ///
    /// # Errors
    /// Returns error if JSON is invalid
    #[inline]
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let value: JsonValue = serde_json::from_str(json)?;
        Ok(Self::new(value))
    }

    /// Parse from YAML string
    ///
    /// # Errors
    /// Returns error if YAML is invalid
    pub fn from_yaml(yaml: &str) -> Result<Self, DocumentError> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Ok(Self::new(value))
    }

    /// Get JSON value reference
    #[inline]
    #[must_use]
    pub fn value(&self) -> &JsonValue {
        &self.value
    }

    /// Take the JSON value
    #[inline]
    #[must_use]
    pub fn into_value(self) -> JsonValue {
        self.value
    }

    /// Declared schema version
    ///
    /// # Errors
    /// Returns error if the root is not an object, or the version attribute
    /// is missing or not a non-negative integer
    pub fn schema_version(&self) -> Result<u32, DocumentError> {
        let root = self.value.as_object().ok_or(DocumentError::NotAnObject)?;
        let raw = root.get(SCHEMA_VERSION_KEY).ok_or(DocumentError::MissingVersion)?;
        raw.as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| DocumentError::InvalidVersion(raw.to_string()))
    }

    /// Copy of this document declaring another schema version
    ///
    /// A non-object root is returned unchanged.
    #[must_use]
    pub fn with_schema_version(mut self, version: u32) -> Self {
        if let Some(root) = self.value.as_object_mut() {
            root.insert(SCHEMA_VERSION_KEY.to_owned(), JsonValue::from(version));
            self.hash = ContentHash::compute_canonical(&self.value);
        }
        self
    }

    /// Get a value by JSON pointer
    #[inline]
    #[must_use]
    pub fn get(&self, pointer: &str) -> Option<&JsonValue> {
        self.value.pointer(pointer)
    }

    /// Canonical hash (independent of key order and formatting)
    #[inline]
    #[must_use]
    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    /// Get canonical JSON string
    #[inline]
    #[must_use]
    pub fn to_canonical_json(&self) -> String {
        canonical_json(&self.value)
    }

    /// Pretty-printed JSON bytes, as handed to the store
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let mut bytes = serde_json::to_vec_pretty(&self.value)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

impl From<JsonValue> for ConfigDocument {
    fn from(value: JsonValue) -> Self {
        Self::new(value)
    }
}

/// Document decoding errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Bytes are not UTF-8
    #[error("document is not valid UTF-8")]
    NotUtf8,

    /// JSON syntax error
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// YAML syntax error
    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// Root is not an object
    #[error("document root must be an object")]
    NotAnObject,

    /// `schemaVersion` absent
    #[error("document does not declare a schemaVersion")]
    MissingVersion,

    /// `schemaVersion` present but unusable
    #[error("schemaVersion must be a non-negative integer, got {0}")]
    InvalidVersion(String),
}
