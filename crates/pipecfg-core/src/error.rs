//! Error types for the configuration service
//!
//! Command outcomes are values ([`CommandResult`](crate::CommandResult)),
//! not errors. [`CoreError`] covers what happens outside a command: loading,
//! reloading and reading engine settings.

use std::path::PathBuf;

use pipecfg_artifact::{ErrorReport, HashError};
use pipecfg_loader::LoaderError;
use pipecfg_merge::MergeError;

/// Main service error type
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("cannot compute version token: {0}")]
    Token(#[from] HashError),

    /// Stored configuration fails semantic validation
    #[error("configuration is invalid: {} error(s), first: {}", .0.error_count(), first_message(.0))]
    Invalid(ErrorReport),

    #[error("cannot read engine config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid engine config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("engine config cannot be written: {0}")]
    ConfigRender(#[from] toml::ser::Error),
}

fn first_message(report: &ErrorReport) -> String {
    report.messages().into_iter().next().unwrap_or_default()
}

impl CoreError {
    /// Errors of a semantically invalid configuration, if that is the cause
    #[must_use]
    pub fn report(&self) -> Option<&ErrorReport> {
        match self {
            Self::Invalid(report) => Some(report),
            _ => None,
        }
    }
}

/// Result type alias for service operations
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pipecfg_artifact::EntityPath;

    #[test]
    fn invalid_names_first_error() {
        let mut report = ErrorReport::new();
        report.add(&EntityPath::of("pipelines", "p"), "name", "bad name");
        let err = CoreError::Invalid(report);
        assert_eq!(
            err.to_string(),
            "configuration is invalid: 1 error(s), first: pipelines/p [name]: bad name"
        );
        assert_eq!(err.report().map(ErrorReport::error_count), Some(1));
    }
}
