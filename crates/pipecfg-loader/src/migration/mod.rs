//! Migration Engine
//!
//! Upgrades a document from its declared schema version to
//! [`CURRENT_SCHEMA_VERSION`] through an ordered chain of pure steps.
//!
//! # Core Concepts
//!
//! - [`Migration`]: one step, producing exactly one schema version
//! - [`MigrationChain`]: immutable ordered list of steps, built once and
//!   injected into the loader
//! - [`Migrated`]: the upgraded document plus which steps ran
//!
//! Steps run on a private copy of the document; a failing step leaves the
//! caller with the original text inside [`MigrationFailure`] and nothing else.

use std::fmt::Debug;

use pipecfg_artifact::ConfigDocument;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::error::{MigrationFailure, TransformError};

mod steps;
mod walk;

pub use steps::{
    DefaultApprovalsAndServerId, DependsOnToMaterials, LockBehaviorFromIsLocked,
    RenameFolderToDestination, SplitExecArguments,
};

/// Schema version the grammar describes and the writer produces
pub const CURRENT_SCHEMA_VERSION: u32 = 6;

/// A single schema upgrade
pub trait Migration: Send + Sync + Debug {
    /// Version of the document this step produces
    fn target_version(&self) -> u32;

    /// One-line description, for logs
    fn description(&self) -> &'static str;

    /// Rewrite a document at `target_version() - 1` in place
    ///
    /// # Errors
    /// Returns error if an element does not have the expected shape
    fn apply(&self, document: &mut JsonValue) -> Result<(), TransformError>;
}

/// Outcome of a successful migration
#[derive(Debug, Clone)]
pub struct Migrated {
    /// Document at the current version
    pub document: ConfigDocument,
    /// Version the input declared
    pub from_version: u32,
    /// Versions produced by the steps that ran, in order
    pub applied: Vec<u32>,
}

impl Migrated {
    /// Did any step run?
    #[inline]
    #[must_use]
    pub fn was_upgraded(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Ordered, immutable chain of migration steps
#[derive(Debug)]
pub struct MigrationChain {
    steps: Vec<Box<dyn Migration>>,
}

impl MigrationChain {
    /// Chain from explicit steps
    ///
    /// Steps must produce consecutive versions starting at 2.
    ///
    /// # Errors
    /// Returns [`TransformError::OutOfOrder`] for gaps or reordering
    pub fn new(steps: Vec<Box<dyn Migration>>) -> Result<Self, TransformError> {
        for (expected, step) in (2..).zip(&steps) {
            if step.target_version() != expected {
                return Err(TransformError::OutOfOrder {
                    expected,
                    found: step.target_version(),
                });
            }
        }
        Ok(Self { steps })
    }

    /// The steps shipped with this version of the schema
    #[must_use]
    pub fn standard() -> Self {
        Self {
            steps: vec![
                Box::new(RenameFolderToDestination),
                Box::new(DependsOnToMaterials),
                Box::new(LockBehaviorFromIsLocked),
                Box::new(SplitExecArguments),
                Box::new(DefaultApprovalsAndServerId),
            ],
        }
    }

    /// Version the last step produces
    #[must_use]
    pub fn current_version(&self) -> u32 {
        self.steps.last().map_or(1, |s| s.target_version())
    }

    /// Migrate raw document text
    ///
    /// # Errors
    /// Returns [`MigrationFailure`] carrying `original` verbatim if the text
    /// cannot be read, declares an unsupported version, or a step fails
    pub fn migrate(&self, original: &str) -> Result<Migrated, MigrationFailure> {
        let document = ConfigDocument::from_bytes(original.as_bytes()).map_err(|e| MigrationFailure {
            original: original.to_owned(),
            failed_version: None,
            source: e.into(),
        })?;
        self.migrate_document(document, original)
    }

    /// Migrate an already parsed document; `original` is reported on failure
    ///
    /// # Errors
    /// See [`MigrationChain::migrate`]
    pub fn migrate_document(
        &self,
        document: ConfigDocument,
        original: &str,
    ) -> Result<Migrated, MigrationFailure> {
        let fail = |failed_version: Option<u32>, source: TransformError| MigrationFailure {
            original: original.to_owned(),
            failed_version,
            source,
        };

        let declared = document.schema_version().map_err(|e| fail(None, e.into()))?;
        let current = self.current_version();
        if declared == 0 {
            return Err(fail(None, TransformError::VersionZero));
        }
        if declared > current {
            return Err(fail(None, TransformError::FromFuture { declared, current }));
        }
        if declared == current {
            debug!(version = declared, "document already current");
            return Ok(Migrated {
                document,
                from_version: declared,
                applied: Vec::new(),
            });
        }

        info!(from = declared, to = current, "migrating configuration document");
        let mut value = document.into_value();
        let mut applied = Vec::new();
        for step in self.steps.iter().filter(|s| s.target_version() > declared) {
            let version = step.target_version();
            step.apply(&mut value).map_err(|e| fail(Some(version), e))?;
            debug!(version, step = step.description(), "applied migration step");
            applied.push(version);
        }

        Ok(Migrated {
            document: ConfigDocument::new(value).with_schema_version(current),
            from_version: declared,
            applied,
        })
    }
}

impl Default for MigrationChain {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Debug)]
    struct Failing;

    impl Migration for Failing {
        fn target_version(&self) -> u32 {
            2
        }
        fn description(&self) -> &'static str {
            "always fails"
        }
        fn apply(&self, _: &mut JsonValue) -> Result<(), TransformError> {
            Err(TransformError::malformed("/", "boom"))
        }
    }

    #[test]
    fn standard_chain_reaches_current_version() {
        assert_eq!(MigrationChain::standard().current_version(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn out_of_order_chain_is_rejected() {
        let err = MigrationChain::new(vec![Box::new(SplitExecArguments)]).unwrap_err();
        assert!(matches!(err, TransformError::OutOfOrder { expected: 2, found: 5 }));
    }

    #[test]
    fn current_document_is_untouched() {
        let text = r#"{"schemaVersion": 6, "environments": [{"name": "uat"}]}"#;
        let migrated = MigrationChain::standard().migrate(text).unwrap();
        assert!(!migrated.was_upgraded());
        assert_eq!(migrated.document.value(), &json!({"schemaVersion": 6, "environments": [{"name": "uat"}]}));
    }

    #[test]
    fn version_one_runs_every_step() {
        let text = r#"{"schemaVersion": 1}"#;
        let migrated = MigrationChain::standard().migrate(text).unwrap();
        assert_eq!(migrated.from_version, 1);
        assert_eq!(migrated.applied, vec![2, 3, 4, 5, 6]);
        assert_eq!(migrated.document.schema_version().unwrap(), 6);
    }

    #[test]
    fn version_zero_is_rejected_with_original() {
        let text = r#"{"schemaVersion": 0}"#;
        let failure = MigrationChain::standard().migrate(text).unwrap_err();
        assert_eq!(failure.original, text);
        assert_eq!(failure.failed_version, None);
        assert_eq!(
            failure.source.to_string(),
            "Config file with version 0 is invalid. Unable to upgrade."
        );
    }

    #[test]
    fn future_and_missing_versions_fail() {
        let chain = MigrationChain::standard();
        assert!(matches!(
            chain.migrate(r#"{"schemaVersion": 7}"#).unwrap_err().source,
            TransformError::FromFuture { declared: 7, current: 6 }
        ));
        assert!(matches!(
            chain.migrate("{}").unwrap_err().source,
            TransformError::Document(_)
        ));
    }

    #[test]
    fn failing_step_reports_its_version() {
        let chain = MigrationChain::new(vec![Box::new(Failing)]).unwrap();
        let failure = chain.migrate(r#"{"schemaVersion": 1}"#).unwrap_err();
        assert_eq!(failure.failed_version, Some(2));
        assert_eq!(failure.original, r#"{"schemaVersion": 1}"#);
    }
}
