//! Config Loader - main entry point
//!
//! The trusted boundary between stored bytes and the in-memory graph:
//!
//! ```text
//! bytes → size check → parse → migrate → validate → build → ConfigGraph
//!   ↑_________________________________________________________↓
//!                  LoadCache (by hash of the raw bytes)
//! ```

use std::sync::Arc;

use pipecfg_artifact::{ConfigDocument, ContentHash, VersionToken};
use pipecfg_model::ConfigGraph;
use tracing::{debug, info};

use crate::builder::{ConfigWriter, GraphBuilder};
use crate::cache::{CacheStats, LoadCache};
use crate::error::{LoaderError, LoaderResult, StructuralError};
use crate::migration::MigrationChain;
use crate::store::DocumentStore;
use crate::structural::StructuralValidator;

/// Default upper bound on document size (bytes)
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 10 * 1024 * 1024;

/// Default number of loads kept in the cache
pub const DEFAULT_CACHE_CAPACITY: u64 = 64;

/// A document loaded all the way to a graph
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The built graph
    pub graph: ConfigGraph,
    /// The document at the current version
    pub document: ConfigDocument,
    /// Version the stored document declared
    pub from_version: u32,
    /// Migration steps that ran
    pub applied: Vec<u32>,
}

impl LoadedConfig {
    /// Was the stored document older than the current schema?
    #[inline]
    #[must_use]
    pub fn was_upgraded(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// A load from a store, with the store's whole-document token
#[derive(Debug, Clone)]
pub struct StoreLoad {
    pub loaded: Arc<LoadedConfig>,
    pub token: VersionToken,
}

/// Reads documents into graphs and graphs back into documents
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    chain: Arc<MigrationChain>,
    validator: Arc<StructuralValidator>,
    builder: GraphBuilder,
    writer: ConfigWriter,
    cache: LoadCache,
    max_document_size: usize,
}

impl ConfigLoader {
    /// Loader with the standard migration chain
    ///
    /// # Errors
    /// Returns error if the grammar fails to compile
    pub fn new() -> Result<Self, StructuralError> {
        Self::with_chain(MigrationChain::standard())
    }

    /// Loader with an explicit migration chain
    ///
    /// # Errors
    /// Returns error if the grammar fails to compile
    pub fn with_chain(chain: MigrationChain) -> Result<Self, StructuralError> {
        let validator = Arc::new(StructuralValidator::new()?);
        Ok(Self {
            chain: Arc::new(chain),
            builder: GraphBuilder::new(Arc::clone(&validator)),
            writer: ConfigWriter::new(Arc::clone(&validator)),
            validator,
            cache: LoadCache::new(DEFAULT_CACHE_CAPACITY),
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
        })
    }

    /// Set the document size limit
    #[must_use]
    pub fn with_max_document_size(mut self, max: usize) -> Self {
        self.max_document_size = max;
        self
    }

    /// Replace the cache with one of the given capacity
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache = LoadCache::new(capacity);
        self
    }

    /// Graph builder sharing this loader's grammar
    #[inline]
    #[must_use]
    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    /// Writer sharing this loader's grammar
    #[inline]
    #[must_use]
    pub fn writer(&self) -> &ConfigWriter {
        &self.writer
    }

    /// Compiled grammar
    #[inline]
    #[must_use]
    pub fn validator(&self) -> &StructuralValidator {
        &self.validator
    }

    /// Migration chain in use
    #[inline]
    #[must_use]
    pub fn chain(&self) -> &MigrationChain {
        &self.chain
    }

    /// Cache statistics
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Load raw document bytes
    ///
    /// # Errors
    /// - [`LoaderError::TooLarge`] over the size limit
    /// - [`LoaderError::Document`] for bytes that are not a JSON/YAML object
    /// - [`LoaderError::Migration`], [`LoaderError::Structural`],
    ///   [`LoaderError::Build`] from the respective phase
    pub fn load_bytes(&self, bytes: &[u8]) -> LoaderResult<Arc<LoadedConfig>> {
        if bytes.len() > self.max_document_size {
            return Err(LoaderError::TooLarge {
                size: bytes.len(),
                max: self.max_document_size,
            });
        }

        let hash = ContentHash::compute(bytes);
        self.cache.try_get_or_insert_with::<LoaderError, _>(hash, || {
            debug!(hash = %hash.short(), "loading document");
            let original = String::from_utf8_lossy(bytes);
            let document = ConfigDocument::from_bytes(bytes)?;
            let migrated = self.chain.migrate_document(document, &original)?;
            let tree = self.validator.validate(&migrated.document)?;
            let graph = self.builder.build(tree)?;
            info!(
                from = migrated.from_version,
                upgraded = migrated.was_upgraded(),
                pipelines = graph.pipelines().count(),
                "configuration loaded"
            );
            Ok(LoadedConfig {
                graph,
                document: migrated.document,
                from_version: migrated.from_version,
                applied: migrated.applied,
            })
        })
    }

    /// Read and load the document of a store
    ///
    /// # Errors
    /// Returns [`LoaderError::Store`] if the store cannot be read, else as
    /// [`ConfigLoader::load_bytes`]
    pub async fn load(&self, store: &dyn DocumentStore) -> LoaderResult<StoreLoad> {
        let stored = store.read().await?;
        let loaded = self.load_bytes(&stored.bytes)?;
        Ok(StoreLoad {
            loaded,
            token: stored.token,
        })
    }

    /// Render a graph as document bytes ready for a store
    ///
    /// # Errors
    /// Returns [`LoaderError::Write`] if the graph does not render to a
    /// valid document
    pub fn render(&self, graph: &ConfigGraph) -> LoaderResult<Vec<u8>> {
        let document = self.writer.write(graph)?;
        Ok(document.to_bytes()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;
    use pipecfg_model::{ApprovalType, LockBehavior, Material, TaskKind};
    use pretty_assertions::assert_eq;

    const V5: &str = r#"{
        "schemaVersion": 5,
        "pipelineGroups": [{"name": "first", "pipelines": [{
            "name": "build",
            "lockBehavior": "lockOnFailure",
            "materials": [{"type": "git", "url": "https://example.com/app.git", "destination": "app"}],
            "stages": [{"name": "compile", "jobs": [{"name": "unit",
                "tasks": [{"type": "exec", "command": "make", "arguments": ["test"]}]}]}]
        }]}]
    }"#;

    #[test]
    fn loads_older_document() {
        let loader = ConfigLoader::new().unwrap();
        let loaded = loader.load_bytes(V5.as_bytes()).unwrap();
        assert_eq!(loaded.from_version, 5);
        assert_eq!(loaded.applied, vec![6]);
        let pipeline = loaded.graph.find_pipeline("build").unwrap();
        assert_eq!(pipeline.label_template, "${COUNT}");
        assert_eq!(pipeline.lock_behavior, LockBehavior::LockOnFailure);
        assert!(loaded.graph.server.server_id.is_some());

        match &pipeline.materials[..] {
            [Material::Git(git)] => {
                assert_eq!(git.url, "https://example.com/app.git");
                assert_eq!(git.settings.destination.as_deref(), Some("app"));
            }
            other => panic!("unexpected materials {other:?}"),
        }

        let stage = &pipeline.stages[0];
        assert_eq!(stage.name.as_str(), "compile");
        assert_eq!(stage.approval.kind, ApprovalType::Success);
        let job = &stage.jobs[0];
        assert_eq!(job.name.as_str(), "unit");
        match &job.tasks[0].kind {
            TaskKind::Exec(exec) => {
                assert_eq!(exec.command, "make");
                assert_eq!(exec.arguments, vec!["test".to_owned()]);
            }
            other => panic!("unexpected task {other:?}"),
        }
    }

    #[test]
    fn repeated_load_hits_cache() {
        let loader = ConfigLoader::new().unwrap();
        let first = loader.load_bytes(V5.as_bytes()).unwrap();
        let second = loader.load_bytes(V5.as_bytes()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.cache_stats().entry_count, 1);
    }

    #[test]
    fn oversized_document_is_rejected() {
        let loader = ConfigLoader::new().unwrap().with_max_document_size(8);
        assert!(matches!(
            loader.load_bytes(V5.as_bytes()),
            Err(LoaderError::TooLarge { max: 8, .. })
        ));
    }

    #[test]
    fn migration_failure_carries_original() {
        let loader = ConfigLoader::new().unwrap();
        let text = r#"{"schemaVersion": 0}"#;
        match loader.load_bytes(text.as_bytes()) {
            Err(LoaderError::Migration(failure)) => assert_eq!(failure.original, text),
            other => panic!("expected migration failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rendered_graph_loads_back_from_store() {
        let loader = ConfigLoader::new().unwrap();
        let loaded = loader.load_bytes(V5.as_bytes()).unwrap();
        let store = InMemoryDocumentStore::with_bytes(loader.render(&loaded.graph).unwrap());
        let again = loader.load(&store).await.unwrap();
        assert_eq!(again.loaded.graph, loaded.graph);
        assert!(!again.loaded.was_upgraded());
    }
}
