//! Entity paths for addressing within a configuration graph
//!
//! Provides [`EntityPath`], the identity-based address errors are filed under.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path to an entity inside a configuration graph
///
/// Segments alternate between a collection name and the identity key of one
/// member (name, id, uuid, fingerprint). Keys are always lower-cased names or
/// ids, never positional indices, so the same entity has the same path in any
/// copy of the graph regardless of ordering.
///
/// # Examples
/// - `pipelines/build-linux/stages/test/jobs/unit`
/// - `environments/uat/variables/java_home`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityPath(Vec<String>);

impl EntityPath {
    /// Empty path, addressing the graph itself
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of one member of a top-level collection
    #[inline]
    #[must_use]
    pub fn of(collection: &str, key: impl Into<String>) -> Self {
        Self(vec![collection.to_owned(), key.into()])
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Path of a member of a nested collection
    #[inline]
    #[must_use]
    pub fn member(&self, collection: &str, key: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(collection.to_owned());
        new.0.push(key.into());
        new
    }

    /// Check if this path is a prefix of another
    ///
    /// `pipelines/up` is a prefix of `pipelines/up/stages/s1`, but not of
    /// `pipelines/upstream`.
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Display for EntityPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl FromStr for EntityPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let segments = s
            .split('/')
            .map(|seg| {
                if seg.is_empty() {
                    Err(PathError::EmptySegment(s.to_owned()))
                } else {
                    Ok(seg.to_owned())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(segments))
    }
}

impl serde::Serialize for EntityPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for EntityPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Path parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// `a//b` or a trailing slash
    #[error("empty segment in path '{0}'")]
    EmptySegment(String),
}
