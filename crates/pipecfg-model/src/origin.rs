//! Provenance of top-level entities

use std::fmt::{self, Display, Formatter};

use pipecfg_artifact::ContentHash;
use serde::{Deserialize, Serialize};

/// Where a pipeline, environment or template came from
///
/// Never part of the persisted document: the merge engine stamps it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConfigOrigin {
    /// Defined in the locally edited document
    #[default]
    Local,
    /// Defined in a config repository
    Repository(RepoOrigin),
}

/// A config repository revision a partial graph was parsed from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoOrigin {
    /// Id of the config repository
    pub repo_id: String,
    /// Fingerprint of the repository's material
    pub fingerprint: ContentHash,
    /// Revision the partial was parsed at
    pub revision: String,
}

impl ConfigOrigin {
    /// Persisted to the local document?
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }

    /// Repository details, when remote
    #[inline]
    #[must_use]
    pub fn repository(&self) -> Option<&RepoOrigin> {
        match self {
            Self::Local => None,
            Self::Repository(repo) => Some(repo),
        }
    }
}

impl Display for ConfigOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("the local config file"),
            Self::Repository(repo) => write!(
                f,
                "config repository '{}' at revision {}",
                repo.repo_id, repo.revision
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_local() {
        assert!(ConfigOrigin::default().is_local());
        assert!(ConfigOrigin::default().repository().is_none());
    }

    #[test]
    fn display_names_repository_and_revision() {
        let origin = ConfigOrigin::Repository(RepoOrigin {
            repo_id: "infra".into(),
            fingerprint: ContentHash::compute(b"git:url"),
            revision: "abc123".into(),
        });
        assert_eq!(origin.to_string(), "config repository 'infra' at revision abc123");
        assert!(!origin.is_local());
    }
}
