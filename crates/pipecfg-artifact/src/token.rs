//! Version tokens for optimistic concurrency
//!
//! A [`VersionToken`] is the content hash of an entity's serialized state.
//! Callers echo back the token they last observed; a mismatch against the
//! freshly computed token means somebody else changed the entity meanwhile.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::hash::{ContentHash, HashError};

/// Content hash of an entity's current persisted state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(ContentHash);

impl VersionToken {
    /// Token for any serializable entity
    ///
    /// # Errors
    /// Returns error if the entity cannot be rendered as JSON
    #[inline]
    pub fn of<T: Serialize + ?Sized>(entity: &T) -> Result<Self, HashError> {
        ContentHash::compute_serializable(entity).map(Self)
    }

    /// Wrap an already computed hash
    #[inline]
    #[must_use]
    pub const fn from_hash(hash: ContentHash) -> Self {
        Self(hash)
    }

    /// Underlying hash
    #[inline]
    #[must_use]
    pub const fn hash(&self) -> &ContentHash {
        &self.0
    }

    /// Check the token a caller supplied against this (current) token
    ///
    /// # Errors
    /// Returns [`StaleToken`] carrying both tokens on mismatch
    pub fn check(&self, supplied: &Self) -> Result<(), StaleToken> {
        if self == supplied {
            Ok(())
        } else {
            Err(StaleToken {
                expected: *supplied,
                actual: *self,
            })
        }
    }
}

impl Display for VersionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for VersionToken {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// The supplied token no longer matches the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stale version token: caller saw {}, entity is now {}", .expected.hash().short(), .actual.hash().short())]
pub struct StaleToken {
    /// Token the caller supplied
    pub expected: VersionToken,
    /// Token of the current state
    pub actual: VersionToken,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_ignores_key_order() {
        let a = json!({"name": "uat", "agents": ["a1"]});
        let b: serde_json::Value = serde_json::from_str(r#"{"agents":["a1"],"name":"uat"}"#).unwrap();
        assert_eq!(VersionToken::of(&a).unwrap(), VersionToken::of(&b).unwrap());
    }

    #[test]
    fn check_reports_stale() {
        let old = VersionToken::of(&json!({"name": "uat"})).unwrap();
        let new = VersionToken::of(&json!({"name": "uat", "agents": ["a1"]})).unwrap();
        assert!(old.check(&old).is_ok());
        let err = new.check(&old).unwrap_err();
        assert_eq!(err.expected, old);
        assert_eq!(err.actual, new);
        assert!(err.to_string().contains("stale version token"));
    }

    #[test]
    fn token_round_trips_through_text() {
        let token = VersionToken::of(&json!([1, 2, 3])).unwrap();
        let parsed: VersionToken = token.to_string().parse().unwrap();
        assert_eq!(token, parsed);
    }
}
