//! pipecfg Artifact Primitives
//!
//! Content-addressed building blocks shared by every pipecfg crate.
//!
//! # Core Concepts
//!
//! - [`ContentHash`]: 32-byte Blake3 hash over canonical JSON
//! - [`VersionToken`]: hash of an entity's persisted state, the
//!   optimistic-concurrency guard for commands
//! - [`ConfigDocument`]: the versioned, byte-level configuration document
//! - [`EntityPath`]: identity-based address of an entity in a graph
//! - [`ConfigErrors`] / [`ErrorReport`]: field-keyed validation errors
//! - [`CaseInsensitiveName`]: identity names compared without case
//! - [`SecretCipher`]: encryption seam for secure values
//!
//! # Example
//!
//! ```rust,ignore
//! use pipecfg_artifact::{ConfigDocument, VersionToken};
//!
//! let doc = ConfigDocument::from_bytes(&bytes)?;
//! println!("version {} hash {}", doc.schema_version()?, doc.hash().short());
//!
//! let token = VersionToken::of(&environment)?;
//! ```

#![warn(unreachable_pub)]

// Core modules
mod document;
mod errors;
mod hash;
mod name;
mod path;
mod secret;
mod token;

// Re-exports
pub use document::{ConfigDocument, DocumentError, SCHEMA_VERSION_KEY};
pub use errors::{ConfigErrors, ErrorReport};
pub use hash::{canonical_json, ContentHash, HashError};
pub use name::CaseInsensitiveName;
pub use path::{EntityPath, PathError};
pub use secret::{Blake3Cipher, CipherError, SecretCipher};
pub use token::{StaleToken, VersionToken};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_hash_matches_token_of_same_value() {
        let value = json!({"schemaVersion": 6, "environments": [{"name": "uat"}]});
        let doc = ConfigDocument::new(value.clone());
        let token = VersionToken::of(&value).unwrap();
        assert_eq!(&doc.hash(), token.hash());
    }

    #[test]
    fn errors_filed_under_name_paths() {
        let name = CaseInsensitiveName::new("Build");
        let path = EntityPath::of("pipelines", name.normalized());
        let mut report = ErrorReport::new();
        report.add(&path, "name", "duplicate");
        let same: EntityPath = "pipelines/build".parse().unwrap();
        assert_eq!(report.on(&same, "name"), Some("duplicate"));
    }
}
