//! Error types for the loader
//!
//! One enum per phase, each failing fast:
//! - Migration (raw document → current version)
//! - Structural validation (current document → parse tree)
//! - Build (parse tree → graph) and write (graph → document)
//! - Store (bytes in and out)

use std::path::PathBuf;

use pipecfg_artifact::{DocumentError, VersionToken};
use pipecfg_model::{ConfigOrigin, EntityRef};

/// A single migration step could not be applied
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// Document has no usable `schemaVersion`
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Version 0 documents predate versioning altogether
    #[error("Config file with version 0 is invalid. Unable to upgrade.")]
    VersionZero,

    /// Document written by a newer server
    #[error("config file version {declared} is newer than the supported version {current}")]
    FromFuture { declared: u32, current: u32 },

    /// Element does not have the shape the step expects
    #[error("unexpected shape at {path}: {message}")]
    Malformed { path: String, message: String },

    /// Chain steps are not consecutive
    #[error("migration steps out of order: expected version {expected}, found {found}")]
    OutOfOrder { expected: u32, found: u32 },
}

impl TransformError {
    /// Create a malformed-element error
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Migration aborted; nothing of the partial upgrade is kept
#[derive(Debug, thiserror::Error)]
#[error("{}: {source}", failure_stage(.failed_version))]
pub struct MigrationFailure {
    /// Input document, verbatim
    pub original: String,
    /// Version the failing step would have produced; `None` when the
    /// declared version was rejected before any step ran
    pub failed_version: Option<u32>,
    /// Underlying cause
    #[source]
    pub source: TransformError,
}

fn failure_stage(failed_version: &Option<u32>) -> String {
    match failed_version {
        Some(v) => format!("migration to version {v} failed"),
        None => "migration could not start".to_owned(),
    }
}

/// First grammar violation of a document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    /// Document does not declare the current version
    #[error("document is at version {actual}, expected {expected}")]
    VersionMismatch { expected: u32, actual: u32 },

    /// Field the grammar does not know
    #[error("unknown field '{field}' at {path}")]
    UnknownField { path: String, field: String },

    /// Any other schema rule
    #[error("{path}: {message}")]
    SchemaViolation { path: String, message: String },

    /// Two siblings share an id
    #[error("duplicate {collection} id '{id}'")]
    DuplicateId { collection: String, id: String },

    /// The grammar itself failed to compile
    #[error("invalid grammar: {0}")]
    InvalidGrammar(String),
}

impl StructuralError {
    /// Create a schema violation at a JSON pointer
    pub fn at(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Graph or fragment could not be materialized
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Fragment root names a different element type
    #[error("parse mismatch: expected <{expected}>, found <{actual}>")]
    ParseMismatch { expected: String, actual: String },

    /// Fragment is not a single-key object
    #[error("fragment must be an object with exactly one root element")]
    NotAFragment,

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error("cannot materialize graph: {0}")]
    Deserialize(#[from] serde_json::Error),
}

/// Graph could not be written back to a document
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("cannot serialize graph: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The serialized graph would not load again
    #[error("written document is invalid: {0}")]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Entities merged in from a config repository never reach the local document
    #[error("{entity} is defined in {origin} and cannot be saved to the local config file")]
    NonLocalEntity { entity: EntityRef, origin: ConfigOrigin },
}

/// Errors from a document store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Whole-document compare-and-swap failed
    #[error("document changed since it was read: expected {expected}, found {actual}")]
    Conflict {
        expected: VersionToken,
        actual: VersionToken,
    },

    /// Nothing stored yet
    #[error("no document at {0}")]
    NotFound(PathBuf),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Combined loader error
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("document too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    #[error(transparent)]
    Migration(#[from] Box<MigrationFailure>),

    #[error("structural error: {0}")]
    Structural(#[from] StructuralError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("write error: {0}")]
    Write(#[from] WriteError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<MigrationFailure> for LoaderError {
    fn from(failure: MigrationFailure) -> Self {
        Self::Migration(Box::new(failure))
    }
}

/// Result type alias for loader operations
pub type LoaderResult<T> = Result<T, LoaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_zero_message() {
        assert_eq!(
            TransformError::VersionZero.to_string(),
            "Config file with version 0 is invalid. Unable to upgrade."
        );
    }

    #[test]
    fn migration_failure_display() {
        let failure = MigrationFailure {
            original: "{}".into(),
            failed_version: Some(3),
            source: TransformError::malformed("/pipelineGroups/0", "not an array"),
        };
        assert_eq!(
            failure.to_string(),
            "migration to version 3 failed: unexpected shape at /pipelineGroups/0: not an array"
        );
    }

    #[test]
    fn structural_error_display() {
        let err = StructuralError::at("/agents/0", "\"uuid\" is a required property");
        assert!(err.to_string().starts_with("/agents/0"));
        let dup = StructuralError::DuplicateId {
            collection: "elasticProfiles".into(),
            id: "docker".into(),
        };
        assert_eq!(dup.to_string(), "duplicate elasticProfiles id 'docker'");
    }
}
