//! The command protocol
//!
//! A command names the entities it touches and the version tokens its
//! caller last saw, asks the [`Authorizer`] for permission, and edits a
//! private copy of the local graph. The service does everything else:
//! freshness, validation, persistence and publication.

use std::fmt::Debug;

use pipecfg_artifact::VersionToken;
use pipecfg_model::{ConfigGraph, EntityRef};

use crate::auth::Authorizer;
use crate::result::{CommandResult, StatusClass};

/// A command refused before validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),
}

impl Rejection {
    /// Result class this rejection maps to
    #[must_use]
    pub const fn status(&self) -> StatusClass {
        match self {
            Self::BadRequest(_) => StatusClass::BadRequest,
            Self::Conflict(_) => StatusClass::Conflict,
            Self::NotFound(_) => StatusClass::NotFound,
        }
    }

    /// The referenced entity does not exist
    #[must_use]
    pub fn missing(entity: &EntityRef) -> Self {
        Self::NotFound(format!("{} not found.", capitalized(entity)))
    }
}

impl From<Rejection> for CommandResult {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::BadRequest(message) => Self::bad_request(message),
            Rejection::Conflict(message) => Self::conflict(message),
            Rejection::NotFound(message) => Self::not_found(message),
        }
    }
}

/// `environment 'uat'` as `Environment 'uat'`
pub(crate) fn capitalized(entity: &EntityRef) -> String {
    let text = entity.to_string();
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => text,
    }
}

/// A change to the configuration
pub trait ConfigCommand: Send + Sync + Debug {
    /// Command name (for logging)
    fn name(&self) -> &'static str;

    /// What the command does, as a phrase: `update environment 'uat'`
    fn describe(&self) -> String;

    /// Entities changed; their errors are the ones reported back
    fn touched(&self) -> Vec<EntityRef>;

    /// Version tokens the caller observed, checked before anything runs
    fn expected_tokens(&self) -> Vec<(EntityRef, VersionToken)> {
        Vec::new()
    }

    /// May `user` run this against the canonical effective graph?
    fn is_authorized(&self, authorizer: &dyn Authorizer, graph: &ConfigGraph, user: &str) -> bool;

    /// Apply to a private copy of the local graph
    ///
    /// Returns a message for the caller on success.
    ///
    /// # Errors
    /// Returns a [`Rejection`] when the command cannot apply at all; the copy
    /// is then discarded
    fn apply(&self, graph: &mut ConfigGraph) -> Result<String, Rejection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_map_to_results() {
        let result: CommandResult = Rejection::Conflict("taken".into()).into();
        assert_eq!(result.status, StatusClass::Conflict);
        assert_eq!(result.message, "taken");
    }

    #[test]
    fn missing_entity_message() {
        let rejection = Rejection::missing(&EntityRef::Environment("uat".into()));
        assert_eq!(rejection.to_string(), "Environment 'uat' not found.");
        assert_eq!(rejection.status(), StatusClass::NotFound);
    }
}
