//! Case-insensitive identity names
//!
//! Pipeline, stage, job, environment, template and group names compare and
//! hash without regard to case but keep the casing the user wrote.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Identity-bearing string compared case-insensitively
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseInsensitiveName(String);

impl CaseInsensitiveName {
    /// Wrap a name, preserving its casing
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name as written
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased form used for comparison, hashing and entity paths
    #[inline]
    #[must_use]
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }

    /// Empty or whitespace only
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Case-insensitive comparison against a plain string
    #[inline]
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        self.0.to_lowercase() == other.to_lowercase()
    }
}

impl PartialEq for CaseInsensitiveName {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for CaseInsensitiveName {}

impl Hash for CaseInsensitiveName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl PartialOrd for CaseInsensitiveName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CaseInsensitiveName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized().cmp(&other.normalized())
    }
}

impl Display for CaseInsensitiveName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CaseInsensitiveName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CaseInsensitiveName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn display_preserves_casing() {
        let name = CaseInsensitiveName::new("Build-Linux");
        assert_eq!(name.to_string(), "Build-Linux");
        assert_eq!(name.normalized(), "build-linux");
        assert!(name.matches("BUILD-linux"));
    }

    #[test]
    fn set_collapses_case_variants() {
        let set: HashSet<CaseInsensitiveName> = ["Foo", "foo", "FOO", "bar"]
            .into_iter()
            .map(CaseInsensitiveName::from)
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn blank_detection() {
        assert!(CaseInsensitiveName::new("  ").is_blank());
        assert!(!CaseInsensitiveName::new("a").is_blank());
    }

    proptest! {
        #[test]
        fn equality_agrees_with_lowercase(a in "[a-zA-Z0-9_.-]{1,12}", b in "[a-zA-Z0-9_.-]{1,12}") {
            let left = CaseInsensitiveName::new(a.clone());
            let right = CaseInsensitiveName::new(b.clone());
            prop_assert_eq!(left == right, a.to_lowercase() == b.to_lowercase());
            prop_assert_eq!(left.cmp(&right) == Ordering::Equal, left == right);
        }
    }
}
