//! The configuration service
//!
//! Holds the canonical configuration and is the only writer of it.
//!
//! ```text
//!              ┌──────────── tokio Mutex (one writer) ────────────┐
//! command ──►  │ authorize → freshness → apply(copy of local)     │
//!              │   → preprocess → merge(partials) → validate      │
//!              │   → ensure_local_only → store.write(cas) → swap  │
//!              └──────────────────────────────────────────────────┘
//! readers ──►  RwLock<Arc<ConfigSnapshot>>  (clone the Arc, never block a write)
//! ```
//!
//! Nothing is published until the store has accepted the new document, so a
//! failed command leaves both the store and the snapshot untouched.

use std::sync::Arc;

use parking_lot::RwLock;
use pipecfg_artifact::{EntityPath, ErrorReport, VersionToken};
use pipecfg_loader::{ConfigLoader, DocumentStore, LoaderError, StoreError};
use pipecfg_merge::{ensure_local_only, MergeEngine, MergedGraph, PartialConfig};
use pipecfg_model::{ConfigGraph, ConfigOrigin, EntityRef};
use pipecfg_validation::{copy_errors, ValidatedGraph, ValidatorChain};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{Authorizer, SecurityConfigAuthorizer};
use crate::command::{capitalized, ConfigCommand};
use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};
use crate::result::CommandResult;

/// The canonical configuration at one point in time
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// Locally defined configuration, exactly as stored
    pub local: ConfigGraph,
    /// Local plus accepted partials, preprocessed
    pub effective: ConfigGraph,
    /// Last valid partial of each config repository, in arrival order
    pub partials: Vec<PartialConfig>,
    /// Whole-document token of the stored bytes
    pub store_token: VersionToken,
}

impl ConfigSnapshot {
    /// Token of an entity's locally stored state; `None` if absent
    ///
    /// # Errors
    /// Returns error if the entity cannot be hashed
    pub fn version_token(&self, entity: &EntityRef) -> CoreResult<Option<VersionToken>> {
        Ok(self.local.version_token(entity)?)
    }
}

/// Origin of an entity in the effective graph
fn origin_in(graph: &ConfigGraph, entity: &EntityRef) -> Option<ConfigOrigin> {
    match entity {
        EntityRef::Pipeline(name) => graph.find_pipeline(name.as_str()).map(|p| p.origin.clone()),
        EntityRef::Environment(name) => graph.find_environment(name.as_str()).map(|e| e.origin.clone()),
        EntityRef::Template(name) => graph.find_template(name.as_str()).map(|t| t.origin.clone()),
        _ => None,
    }
}

struct Prepared {
    local: ConfigGraph,
    merged: MergedGraph,
    validated: ValidatedGraph,
}

/// Everything needed to turn a local graph into a publishable snapshot
#[derive(Debug)]
struct Engine {
    config: EngineConfig,
    loader: ConfigLoader,
    store: Arc<dyn DocumentStore>,
    chain: ValidatorChain,
    merger: MergeEngine,
}

impl Engine {
    fn prepare(&self, local: &ConfigGraph, partials: &[PartialConfig]) -> CoreResult<Prepared> {
        let local = self.chain.preprocess(local).graph;
        let merged = self.merger.merge(&local, partials)?;
        let validated = self.chain.validate(merged.effective());
        Ok(Prepared {
            local,
            merged,
            validated,
        })
    }

    async fn load(&self, partials: Vec<PartialConfig>) -> CoreResult<ConfigSnapshot> {
        let load = self.loader.load(self.store.as_ref()).await?;
        let loaded = load.loaded;
        let prepared = self.prepare(&loaded.graph, &partials)?;
        if !prepared.validated.is_valid() {
            return Err(CoreError::Invalid(prepared.validated.report));
        }

        let mut store_token = load.token;
        if loaded.was_upgraded() && self.config.write_back_upgrades {
            let bytes = self.loader.render(&prepared.local)?;
            store_token = self
                .store
                .write(bytes, &store_token)
                .await
                .map_err(LoaderError::from)?;
            info!(from = loaded.from_version, steps = ?loaded.applied, "upgraded configuration written back");
        }

        Ok(ConfigSnapshot {
            local: prepared.local,
            effective: prepared.validated.graph,
            partials,
            store_token,
        })
    }
}

/// Canonical configuration plus the command pipeline that changes it
#[derive(Debug)]
pub struct ConfigService {
    engine: Engine,
    authorizer: Arc<dyn Authorizer>,
    snapshot: RwLock<Arc<ConfigSnapshot>>,
    write_lock: Mutex<()>,
}

impl ConfigService {
    /// Load the stored configuration and start serving it
    ///
    /// Uses the standard validator chain with the settings' cipher and
    /// plugin metadata, and [`SecurityConfigAuthorizer`].
    ///
    /// # Errors
    /// Returns error if the document cannot be loaded or is invalid
    pub async fn start(config: EngineConfig, store: Arc<dyn DocumentStore>) -> CoreResult<Self> {
        let chain = ValidatorChain::standard(Arc::new(config.cipher()?), Arc::new(config.plugin_metadata()));
        Self::start_with_chain(config, store, chain).await
    }

    /// Load the stored configuration with an explicit validator chain
    ///
    /// # Errors
    /// Returns error if the document cannot be loaded or is invalid
    pub async fn start_with_chain(
        config: EngineConfig,
        store: Arc<dyn DocumentStore>,
        chain: ValidatorChain,
    ) -> CoreResult<Self> {
        let loader = config.loader().map_err(LoaderError::from)?;
        let engine = Engine {
            config,
            loader,
            store,
            chain,
            merger: MergeEngine::new(),
        };
        let snapshot = engine.load(Vec::new()).await?;
        info!(
            pipelines = snapshot.effective.pipelines().count(),
            token = %snapshot.store_token,
            "configuration service started"
        );
        Ok(Self {
            engine,
            authorizer: Arc::new(SecurityConfigAuthorizer),
            snapshot: RwLock::new(Arc::new(snapshot)),
            write_lock: Mutex::new(()),
        })
    }

    /// Replace the authorization collaborator
    #[must_use]
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Current canonical configuration
    #[must_use]
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Current version token of an entity
    ///
    /// # Errors
    /// Returns error if the entity cannot be hashed
    pub fn version_token(&self, entity: &EntityRef) -> CoreResult<Option<VersionToken>> {
        self.snapshot().version_token(entity)
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.engine.config
    }

    fn publish(&self, snapshot: ConfigSnapshot) {
        *self.snapshot.write() = Arc::new(snapshot);
    }

    /// Re-read the store, keeping the current partials
    ///
    /// # Errors
    /// Returns error if the document cannot be loaded or is invalid; the
    /// previous snapshot stays in place
    pub async fn reload(&self) -> CoreResult<Arc<ConfigSnapshot>> {
        let _guard = self.write_lock.lock().await;
        let partials = self.snapshot().partials.clone();
        let snapshot = self.engine.load(partials).await?;
        self.publish(snapshot);
        info!("configuration reloaded");
        Ok(self.snapshot())
    }

    /// Run a command on behalf of `user`
    ///
    /// Either every change of the command is stored and published, or none.
    pub async fn execute(&self, command: &dyn ConfigCommand, user: &str) -> CommandResult {
        let _guard = self.write_lock.lock().await;
        let current = self.snapshot();
        let result = match self.run(command, user, &current).await {
            Ok((snapshot, message)) => {
                self.publish(snapshot);
                CommandResult::ok(message)
            }
            Err(rejected) => rejected,
        };
        if result.success {
            info!(command = command.name(), user, status = %result.status, "command applied");
        } else {
            warn!(
                command = command.name(),
                user,
                status = %result.status,
                errors = result.errors.error_count(),
                message = %result.message,
                "command rejected"
            );
        }
        result
    }

    async fn run(
        &self,
        command: &dyn ConfigCommand,
        user: &str,
        current: &ConfigSnapshot,
    ) -> Result<(ConfigSnapshot, String), CommandResult> {
        if !command.is_authorized(self.authorizer.as_ref(), &current.effective, user) {
            return Err(CommandResult::unauthorized(format!(
                "User '{user}' is not allowed to {}.",
                command.describe()
            )));
        }

        let touched = command.touched();
        for entity in &touched {
            if let Some(origin) = origin_in(&current.effective, entity).filter(|o| !o.is_local()) {
                return Err(CommandResult::bad_request(format!(
                    "Can not operate on {entity} as it is defined remotely in {origin}."
                )));
            }
        }

        for (entity, supplied) in command.expected_tokens() {
            let actual = current
                .version_token(&entity)
                .map_err(|e| CommandResult::server_error(e.to_string()))?
                .ok_or_else(|| CommandResult::not_found(format!("{} not found.", capitalized(&entity))))?;
            if actual.check(&supplied).is_err() {
                return Err(CommandResult::stale(format!(
                    "Someone has modified the configuration for {entity}. Please update your copy \
                     of the config with the changes and try again."
                )));
            }
        }

        let mut local = current.local.clone();
        let message = command.apply(&mut local).map_err(CommandResult::from)?;

        let prepared = self
            .engine
            .prepare(&local, &current.partials)
            .map_err(|e| CommandResult::server_error(e.to_string()))?;
        if !prepared.validated.is_valid() {
            let errors = touched_errors(&prepared.validated, &local, &touched);
            return Err(CommandResult::invalid(
                format!("Validations failed for {}.", command.describe()),
                errors,
            ));
        }

        ensure_local_only(&prepared.local).map_err(|e| CommandResult::bad_request(e.to_string()))?;
        let bytes = self
            .engine
            .loader
            .render(&prepared.local)
            .map_err(|e| CommandResult::server_error(e.to_string()))?;
        let store_token = match self.engine.store.write(bytes, &current.store_token).await {
            Ok(token) => token,
            Err(StoreError::Conflict { .. }) => {
                return Err(CommandResult::conflict(
                    "Configuration file has been modified by someone else.",
                ))
            }
            Err(e) => return Err(CommandResult::server_error(e.to_string())),
        };
        debug!(command = command.name(), token = %store_token, "document stored");

        Ok((
            ConfigSnapshot {
                local: prepared.local,
                effective: prepared.validated.graph,
                partials: current.partials.clone(),
                store_token,
            },
            message,
        ))
    }

    /// Offer a new partial from a config repository
    ///
    /// A partial that makes the merged configuration invalid is refused. The
    /// repository's previous partial then stays in effect, or is withdrawn
    /// when [`EngineConfig::keep_last_valid_partial`] is off.
    pub async fn update_partials(&self, partial: PartialConfig) -> CommandResult {
        let _guard = self.write_lock.lock().await;
        let current = self.snapshot();
        let repo = partial.repo_id().to_owned();
        let revision = partial.origin.revision.clone();

        let mut partials = current.partials.clone();
        match partials.iter().position(|p| p.repo_id() == repo) {
            Some(index) => partials[index] = partial,
            None => partials.push(partial),
        }

        let prepared = match self.engine.prepare(&current.local, &partials) {
            Ok(prepared) => prepared,
            Err(e) => return CommandResult::server_error(e.to_string()),
        };
        if prepared.merged.dropped().iter().any(|o| o.repo_id == repo) {
            warn!(%repo, %revision, "partial from undeclared config repository ignored");
            return CommandResult::bad_request(format!(
                "No config repository '{repo}' with a matching material is declared."
            ));
        }

        if prepared.validated.is_valid() {
            self.publish(ConfigSnapshot {
                local: current.local.clone(),
                effective: prepared.validated.graph,
                partials,
                store_token: current.store_token,
            });
            info!(%repo, %revision, "partial accepted");
            return CommandResult::ok(format!(
                "Partial configuration from '{repo}' at revision {revision} accepted."
            ));
        }

        let report = prepared.validated.report;
        let kept = if self.engine.config.keep_last_valid_partial {
            "the last valid revision stays in effect"
        } else {
            let without: Vec<PartialConfig> =
                current.partials.iter().filter(|p| p.repo_id() != repo).cloned().collect();
            match self.engine.prepare(&current.local, &without) {
                Ok(fallback) if fallback.validated.is_valid() => {
                    self.publish(ConfigSnapshot {
                        local: current.local.clone(),
                        effective: fallback.validated.graph,
                        partials: without,
                        store_token: current.store_token,
                    });
                    "its configuration has been withdrawn"
                }
                _ => "the last valid revision stays in effect",
            }
        };
        warn!(%repo, %revision, errors = report.error_count(), kept, "partial rejected");
        CommandResult::invalid(
            format!("Partial configuration from '{repo}' at revision {revision} is invalid; {kept}."),
            report,
        )
    }
}

/// Errors of the touched entities, paired onto the submitted local graph
///
/// Falls back to every error when none lands on a touched entity, as with
/// graph-wide rules such as dependency cycles.
fn touched_errors(validated: &ValidatedGraph, submitted: &ConfigGraph, touched: &[EntityRef]) -> ErrorReport {
    let scopes: Vec<EntityPath> = touched.iter().map(EntityRef::path).collect();
    let scoped = copy_errors(validated, submitted).within(&scopes);
    if scoped.is_empty() {
        validated.report.clone()
    } else {
        scoped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipecfg_loader::InMemoryDocumentStore;
    use pipecfg_test_utils::{graph_with, simple_pipeline};

    async fn service(graph: &ConfigGraph) -> (ConfigService, Arc<InMemoryDocumentStore>) {
        let loader = ConfigLoader::new().unwrap();
        let store = Arc::new(InMemoryDocumentStore::with_bytes(loader.render(graph).unwrap()));
        let service = ConfigService::start(EngineConfig::new(), store.clone()).await.unwrap();
        (service, store)
    }

    #[tokio::test]
    async fn starts_from_store() {
        let (service, store) = service(&graph_with(vec![simple_pipeline("build")])).await;
        let snapshot = service.snapshot();
        assert!(snapshot.effective.find_pipeline("build").is_some());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn invalid_store_refuses_to_start() {
        let loader = ConfigLoader::new().unwrap();
        let graph = graph_with(vec![simple_pipeline("Foo"), simple_pipeline("foo")]);
        let store = Arc::new(InMemoryDocumentStore::with_bytes(loader.render(&graph).unwrap()));
        let err = ConfigService::start(EngineConfig::new(), store).await.unwrap_err();
        assert_eq!(err.report().map(ErrorReport::error_count), Some(1));
    }

    #[test]
    fn origin_only_for_origin_bearing_entities() {
        let graph = graph_with(vec![simple_pipeline("build")]);
        assert_eq!(
            origin_in(&graph, &EntityRef::Pipeline("BUILD".into())),
            Some(ConfigOrigin::Local)
        );
        assert_eq!(origin_in(&graph, &EntityRef::Agent("a".into())), None);
    }
}
