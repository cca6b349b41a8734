//! pipecfg Semantic Validation
//!
//! Walks an effective configuration graph and files every business-rule
//! violation it finds under the offending entity's path.
//!
//! # Core Concepts
//!
//! - [`ValidatorChain`]: preprocessors (which may rewrite the graph) followed
//!   by independent rules run in parallel
//! - [`ValidationRule`]: one invariant; total over any structurally valid graph
//! - [`SecureValueResolver`]: encrypts values marked secure by plugin metadata
//! - [`ValidatedGraph`]: the checked copy of the graph plus its [`ErrorReport`]
//! - [`copy_errors`]: moves errors onto another copy of the graph by key
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   clone    ┌──────────────────────┐
//! │ ConfigGraph │ ─────────► │ preprocessors (seq)  │ secure values
//! └─────────────┘            └──────────┬───────────┘
//!                                       ▼
//!                            ┌──────────────────────┐
//!                            │ rules (rayon, par)   │ names, uniqueness, fetch, ...
//!                            └──────────┬───────────┘
//!                                       ▼ concatenated in chain order
//!                            ┌──────────────────────┐   copy_errors   ┌─────────────┐
//!                            │ ValidatedGraph       │ ──────────────► │ user's copy │
//!                            └──────────────────────┘                 └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use pipecfg_validation::{copy_errors, StaticPluginMetadata, ValidatorChain};
//!
//! let chain = ValidatorChain::standard(cipher, Arc::new(StaticPluginMetadata::new()));
//! let validated = chain.validate(&effective);
//! if !validated.is_valid() {
//!     let errors = copy_errors(&validated, &as_submitted);
//! }
//! ```
//!
//! [`ErrorReport`]: pipecfg_artifact::ErrorReport

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod chain;
pub mod context;
pub mod metadata;
pub mod reconcile;
pub mod rules;
pub mod secure;

pub use chain::{Preprocessor, ValidatedGraph, ValidationRule, ValidatorChain};
pub use context::{JobSite, Owner, StageSite, ValidationContext};
pub use metadata::{PluginMetadataStore, PropertyMetadata, StaticPluginMetadata};
pub use reconcile::copy_errors;
pub use secure::SecureValueResolver;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::chain::{ValidatedGraph, ValidationRule, ValidatorChain};
    pub use crate::metadata::{PluginMetadataStore, PropertyMetadata, StaticPluginMetadata};
    pub use crate::reconcile::copy_errors;
}
