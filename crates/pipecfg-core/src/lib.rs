//! pipecfg Core
//!
//! The configuration service of a continuous-delivery server: owns the
//! canonical configuration and changes it only through commands checked for
//! authorization, freshness and validity.
//!
//! # Core Concepts
//!
//! - [`ConfigService`]: single writer of the stored document; publishes
//!   immutable [`ConfigSnapshot`]s to readers
//! - [`ConfigCommand`]: one change, applied to a private copy of the local graph
//! - [`CommandResult`]: every command ends in one, with a [`StatusClass`] and
//!   the errors of the entities it touched
//! - [`Authorizer`]: who may change what
//! - [`EngineConfig`]: service settings, loadable from TOML
//!
//! # Example
//!
//! ```rust,ignore
//! use pipecfg_core::prelude::*;
//!
//! let service = ConfigService::start(EngineConfig::load("pipecfg.toml")?, store).await?;
//! let token = service.version_token(&EntityRef::Environment("uat".into()))?.unwrap();
//! let result = service
//!     .execute(&PatchEnvironment::new("uat", token).add_pipeline("deploy"), "alice")
//!     .await;
//! assert!(result.is_ok(), "{result}");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod auth;
pub mod command;
pub mod config;
pub mod entity;
pub mod environment;
pub mod error;
pub mod pipeline;
pub mod result;
pub mod service;

pub use auth::{Authorizer, SecurityConfigAuthorizer};
pub use command::{ConfigCommand, Rejection};
pub use config::EngineConfig;
pub use entity::{CreateEntity, DeleteEntity, TopLevel, UpdateEntity};
pub use environment::{MoveAgent, PatchEnvironment};
pub use error::{CoreError, CoreResult};
pub use pipeline::{CreatePipeline, DeletePipeline, UpdatePipeline};
pub use result::{CommandResult, StatusClass};
pub use service::{ConfigService, ConfigSnapshot};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::command::ConfigCommand;
    pub use crate::config::EngineConfig;
    pub use crate::entity::{CreateEntity, DeleteEntity, UpdateEntity};
    pub use crate::environment::{MoveAgent, PatchEnvironment};
    pub use crate::pipeline::{CreatePipeline, DeletePipeline, UpdatePipeline};
    pub use crate::result::{CommandResult, StatusClass};
    pub use crate::service::ConfigService;
    pub use pipecfg_model::EntityRef;
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::sync::Arc;

    use pipecfg_artifact::VersionToken;
    use pipecfg_loader::{ConfigLoader, InMemoryDocumentStore};
    use pipecfg_model::{EntityRef, Environment};
    use pipecfg_test_utils::{graph_with, simple_pipeline};

    async fn start() -> (ConfigService, Arc<InMemoryDocumentStore>) {
        let graph = graph_with(vec![simple_pipeline("build"), simple_pipeline("deploy")]);
        let bytes = ConfigLoader::new().unwrap().render(&graph).unwrap();
        let store = Arc::new(InMemoryDocumentStore::with_bytes(bytes));
        let service = ConfigService::start(EngineConfig::new(), store.clone()).await.unwrap();
        (service, store)
    }

    #[tokio::test]
    async fn create_then_patch_environment() {
        let (service, store) = start().await;

        let result = service
            .execute(&CreateEntity::new(Environment::named("uat")), "anyone")
            .await;
        assert!(result.is_ok(), "{result}");
        assert_eq!(store.write_count(), 1);

        let uat = EntityRef::Environment("uat".into());
        let token = service.version_token(&uat).unwrap().unwrap();
        let result = service
            .execute(&PatchEnvironment::new("uat", token).add_pipeline("build"), "anyone")
            .await;
        assert!(result.is_ok(), "{result}");

        let snapshot = service.snapshot();
        assert!(snapshot.effective.find_environment("uat").unwrap().has_pipeline(&"BUILD".into()));
        assert_ne!(service.version_token(&uat).unwrap().unwrap(), token);
    }

    #[tokio::test]
    async fn stored_document_round_trips_through_reload() {
        let (service, _store) = start().await;
        service
            .execute(&CreatePipeline::new("release", simple_pipeline("ship")), "anyone")
            .await;
        let before = service.snapshot();
        let after = service.reload().await.unwrap();
        assert_eq!(before.local, after.local);
        assert_eq!(before.store_token, after.store_token);
    }

    #[tokio::test]
    async fn results_serialize_for_surfaces() {
        let (service, _store) = start().await;
        let result = service
            .execute(&PatchEnvironment::new("nowhere", VersionToken::of("x").unwrap()), "anyone")
            .await;
        assert_eq!(result.status, StatusClass::NotFound);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "notFound");
        assert_eq!(json["success"], false);
    }
}
