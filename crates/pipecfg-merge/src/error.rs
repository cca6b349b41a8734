//! Error types for merging

use pipecfg_model::{ConfigOrigin, EntityRef};

/// Merge failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// The graph handed in as local already holds repository entities
    #[error("{entity} is already merged from {origin}; merge the local graph only")]
    AlreadyMerged {
        entity: EntityRef,
        origin: ConfigOrigin,
    },

    /// A graph bound for the local document holds a repository entity
    #[error("{entity} is defined in {origin} and cannot be saved to the local config file")]
    NonLocalEntity {
        entity: EntityRef,
        origin: ConfigOrigin,
    },
}

impl MergeError {
    /// The offending entity
    #[must_use]
    pub fn entity(&self) -> &EntityRef {
        match self {
            Self::AlreadyMerged { entity, .. } | Self::NonLocalEntity { entity, .. } => entity,
        }
    }
}

/// Result type alias for merge operations
pub type MergeResult<T> = Result<T, MergeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pipecfg_artifact::ContentHash;
    use pipecfg_model::RepoOrigin;

    #[test]
    fn non_local_message_names_entity_and_origin() {
        let err = MergeError::NonLocalEntity {
            entity: EntityRef::Pipeline("remote".into()),
            origin: ConfigOrigin::Repository(RepoOrigin {
                repo_id: "infra".into(),
                fingerprint: ContentHash::compute(b"x"),
                revision: "r1".into(),
            }),
        };
        assert_eq!(
            err.to_string(),
            "pipeline 'remote' is defined in config repository 'infra' at revision r1 and cannot be saved to the local config file"
        );
        assert_eq!(err.entity().id(), "remote");
    }
}
