//! pipecfg Loader
//!
//! The trusted boundary between the stored configuration document and the
//! in-memory [`ConfigGraph`](pipecfg_model::ConfigGraph).
//!
//! # Core Operations
//!
//! - **Migrate**: upgrade an older document through the [`MigrationChain`]
//! - **Validate**: check the current-version grammar with the
//!   [`StructuralValidator`]
//! - **Build**: materialize the graph or a detached fragment with the
//!   [`GraphBuilder`]
//! - **Write**: render a graph back to a document with the [`ConfigWriter`]
//!
//! # Architecture
//!
//! ```text
//! DocumentStore → bytes → MigrationChain → StructuralValidator → GraphBuilder → ConfigGraph
//!                             ↑__________________________________________↓
//!                                      LoadCache (content-addressed)
//! ConfigGraph → ConfigWriter → (re-validated) ConfigDocument → DocumentStore
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use pipecfg_loader::{ConfigLoader, FileDocumentStore};
//!
//! let loader = ConfigLoader::new()?;
//! let store = FileDocumentStore::new("cruise-config.json");
//! let load = loader.load(&store).await?;
//! println!("upgraded from v{}", load.loaded.from_version);
//!
//! let bytes = loader.render(&load.loaded.graph)?;
//! store.write(bytes, &load.token).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod builder;
pub mod cache;
pub mod error;
pub mod grammar;
pub mod loader;
pub mod migration;
pub mod store;
pub mod structural;

// Re-exports for convenience
pub use builder::{ConfigWriter, Fragment, GraphBuilder};
pub use cache::{CacheStats, LoadCache};
pub use error::{
    BuildError, LoaderError, LoaderResult, MigrationFailure, StoreError, StructuralError,
    TransformError, WriteError,
};
pub use loader::{ConfigLoader, LoadedConfig, StoreLoad, DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_DOCUMENT_SIZE};
pub use migration::{Migrated, Migration, MigrationChain, CURRENT_SCHEMA_VERSION};
pub use store::{token_of, DocumentStore, FileDocumentStore, InMemoryDocumentStore, StoredDocument};
pub use structural::{ParseTree, StructuralValidator, FRAGMENT_ELEMENTS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for loading and writing configuration
    pub use crate::builder::{ConfigWriter, GraphBuilder};
    pub use crate::error::{LoaderError, LoaderResult, MigrationFailure, StructuralError};
    pub use crate::loader::{ConfigLoader, LoadedConfig};
    pub use crate::migration::{MigrationChain, CURRENT_SCHEMA_VERSION};
    pub use crate::store::{DocumentStore, FileDocumentStore, InMemoryDocumentStore};
    pub use pipecfg_artifact::{ConfigDocument, VersionToken};
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use pipecfg_model::{Environment, Pipeline};

    #[test]
    fn standard_chain_reaches_current_version() {
        assert_eq!(MigrationChain::standard().current_version(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn pipeline_fragment_survives_writer_and_builder() {
        let loader = ConfigLoader::new().unwrap();
        let mut pipeline = Pipeline::named("build");
        pipeline.label_template = "1.${COUNT}".into();

        let fragment = loader.writer().write_fragment(&pipeline).unwrap();
        assert!(fragment.get("pipeline").is_some());
        let back: Pipeline = loader.builder().build_fragment(&fragment).unwrap();
        assert_eq!(back, pipeline);
    }

    #[tokio::test]
    async fn store_conflict_surfaces_as_loader_error() {
        let loader = ConfigLoader::new().unwrap();
        let mut graph = pipecfg_model::ConfigGraph::default();
        graph.environments.push(Environment::named("uat"));
        let bytes = loader.render(&graph).unwrap();

        let store = InMemoryDocumentStore::with_bytes(bytes.clone());
        let load = loader.load(&store).await.unwrap();
        store.overwrite(b"{\"schemaVersion\": 6}".to_vec());

        let err: LoaderError = store.write(bytes, &load.token).await.unwrap_err().into();
        assert!(matches!(err, LoaderError::Store(StoreError::Conflict { .. })));
    }
}
