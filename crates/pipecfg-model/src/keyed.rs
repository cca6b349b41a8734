//! Entity identity: keys, paths, references and version tokens
//!
//! Every entity type that can carry errors has a [`Keyed::key`]: its
//! normalized name or id. Errors are filed under paths built from keys, so two
//! copies of a graph agree on where an entity's errors live no matter how
//! their lists are ordered.

use std::fmt::{self, Display, Formatter};

use pipecfg_artifact::{CaseInsensitiveName, EntityPath, HashError, VersionToken};
use serde::{Deserialize, Serialize};

use crate::environment::{Agent, Environment, Template};
use crate::graph::ConfigGraph;
use crate::material::Material;
use crate::origin::ConfigOrigin;
use crate::pipeline::{EnvironmentVariable, Job, Param, Pipeline, PipelineGroup, Stage};
use crate::plugin::{ConfigProperty, ConfigRepo, ElasticProfile, PackageDefinition, PackageRepository, Scm};
use crate::task::Task;

/// An entity with an identity key inside its owning collection
pub trait Keyed {
    /// Collection segment used in paths
    const COLLECTION: &'static str;

    /// Identity key; `None` when the identity field is blank
    fn key(&self) -> Option<String>;

    /// Path of this entity below `parent`
    fn path_in(&self, parent: &EntityPath) -> Option<EntityPath> {
        self.key().map(|k| parent.member(Self::COLLECTION, k))
    }
}

fn name_key(name: &CaseInsensitiveName) -> Option<String> {
    (!name.is_blank()).then(|| name.normalized())
}

fn id_key(id: &str) -> Option<String> {
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_owned())
}

macro_rules! keyed_by_name {
    ($($ty:ty => $collection:literal),* $(,)?) => {
        $(impl Keyed for $ty {
            const COLLECTION: &'static str = $collection;
            fn key(&self) -> Option<String> {
                name_key(&self.name)
            }
        })*
    };
}

macro_rules! keyed_by_id {
    ($($ty:ty => $collection:literal),* $(,)?) => {
        $(impl Keyed for $ty {
            const COLLECTION: &'static str = $collection;
            fn key(&self) -> Option<String> {
                id_key(&self.id)
            }
        })*
    };
}

keyed_by_name! {
    PipelineGroup => "groups",
    Pipeline => "pipelines",
    Stage => "stages",
    Job => "jobs",
    EnvironmentVariable => "variables",
    Environment => "environments",
    Template => "templates",
}

keyed_by_id! {
    ElasticProfile => "elasticProfiles",
    PackageRepository => "repositories",
    PackageDefinition => "packages",
    Scm => "scms",
    ConfigRepo => "configRepos",
}

impl Keyed for Param {
    const COLLECTION: &'static str = "params";
    fn key(&self) -> Option<String> {
        id_key(&self.name)
    }
}

impl Keyed for Agent {
    const COLLECTION: &'static str = "agents";
    fn key(&self) -> Option<String> {
        id_key(&self.uuid)
    }
}

impl Keyed for ConfigProperty {
    const COLLECTION: &'static str = "properties";
    fn key(&self) -> Option<String> {
        id_key(&self.key)
    }
}

impl Keyed for Material {
    const COLLECTION: &'static str = "materials";
    fn key(&self) -> Option<String> {
        Some(self.fingerprint().short())
    }
}

/// Tasks have no name: a task's key is the hash of its value, so equal tasks
/// pair up across copies.
impl Keyed for Task {
    const COLLECTION: &'static str = "tasks";
    fn key(&self) -> Option<String> {
        VersionToken::of(self).ok().map(|t| t.hash().short())
    }
}

/// Reference to a top-level (or group-level) entity a command targets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum EntityRef {
    Pipeline(CaseInsensitiveName),
    PipelineGroup(CaseInsensitiveName),
    Template(CaseInsensitiveName),
    Environment(CaseInsensitiveName),
    ElasticProfile(String),
    PackageRepository(String),
    Scm(String),
    Agent(String),
    ConfigRepo(String),
}

impl EntityRef {
    /// Entity type, as used in messages
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Pipeline(_) => "pipeline",
            Self::PipelineGroup(_) => "pipeline group",
            Self::Template(_) => "template",
            Self::Environment(_) => "environment",
            Self::ElasticProfile(_) => "elastic profile",
            Self::PackageRepository(_) => "package repository",
            Self::Scm(_) => "scm",
            Self::Agent(_) => "agent",
            Self::ConfigRepo(_) => "config repo",
        }
    }

    /// Name or id as written
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Pipeline(n) | Self::PipelineGroup(n) | Self::Template(n) | Self::Environment(n) => {
                n.as_str()
            }
            Self::ElasticProfile(id)
            | Self::PackageRepository(id)
            | Self::Scm(id)
            | Self::Agent(id)
            | Self::ConfigRepo(id) => id,
        }
    }

    /// Error path of the referenced entity
    #[must_use]
    pub fn path(&self) -> EntityPath {
        let collection = match self {
            Self::Pipeline(_) => Pipeline::COLLECTION,
            Self::PipelineGroup(_) => PipelineGroup::COLLECTION,
            Self::Template(_) => Template::COLLECTION,
            Self::Environment(_) => Environment::COLLECTION,
            Self::ElasticProfile(_) => ElasticProfile::COLLECTION,
            Self::PackageRepository(_) => PackageRepository::COLLECTION,
            Self::Scm(_) => Scm::COLLECTION,
            Self::Agent(_) => Agent::COLLECTION,
            Self::ConfigRepo(_) => ConfigRepo::COLLECTION,
        };
        let key = match self {
            Self::Pipeline(n) | Self::PipelineGroup(n) | Self::Template(n) | Self::Environment(n) => {
                n.normalized()
            }
            other => other.id().to_owned(),
        };
        EntityPath::of(collection, key)
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind_name(), self.id())
    }
}

impl ConfigGraph {
    /// First pipeline, environment or template that came from a config repository
    #[must_use]
    pub fn first_non_local(&self) -> Option<(EntityRef, &ConfigOrigin)> {
        let pipelines = self
            .pipelines()
            .map(|p| (EntityRef::Pipeline(p.name.clone()), &p.origin));
        let environments = self
            .environments
            .iter()
            .map(|e| (EntityRef::Environment(e.name.clone()), &e.origin));
        let templates = self
            .templates
            .iter()
            .map(|t| (EntityRef::Template(t.name.clone()), &t.origin));
        pipelines
            .chain(environments)
            .chain(templates)
            .find(|(_, origin)| !origin.is_local())
    }

    /// Does the referenced entity exist?
    #[must_use]
    pub fn contains(&self, entity: &EntityRef) -> bool {
        matches!(self.version_token(entity), Ok(Some(_)))
    }

    /// Version token of the referenced entity's current state
    ///
    /// `Ok(None)` when the entity does not exist.
    ///
    /// # Errors
    /// Returns error if the entity cannot be serialized
    pub fn version_token(&self, entity: &EntityRef) -> Result<Option<VersionToken>, HashError> {
        let id = entity.id();
        match entity {
            EntityRef::Pipeline(_) => self.find_pipeline(id).map(VersionToken::of).transpose(),
            EntityRef::PipelineGroup(_) => self.find_group(id).map(VersionToken::of).transpose(),
            EntityRef::Template(_) => self.find_template(id).map(VersionToken::of).transpose(),
            EntityRef::Environment(_) => self.find_environment(id).map(VersionToken::of).transpose(),
            EntityRef::ElasticProfile(_) => {
                self.find_elastic_profile(id).map(VersionToken::of).transpose()
            }
            EntityRef::PackageRepository(_) => self
                .repositories
                .iter()
                .find(|r| r.id == id)
                .map(VersionToken::of)
                .transpose(),
            EntityRef::Scm(_) => self.find_scm(id).map(VersionToken::of).transpose(),
            EntityRef::Agent(_) => self.find_agent(id).map(VersionToken::of).transpose(),
            EntityRef::ConfigRepo(_) => self
                .config_repos
                .iter()
                .find(|r| r.id == id)
                .map(VersionToken::of)
                .transpose(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;
    use crate::task::{ExecTask, TaskKind};

    fn exec(cmd: &str) -> Task {
        Task::new(TaskKind::Exec(ExecTask {
            command: cmd.into(),
            arguments: vec![],
            working_directory: None,
        }))
    }

    #[test]
    fn name_keys_are_normalized() {
        let pipeline = Pipeline::named("Build-Linux");
        assert_eq!(pipeline.key().as_deref(), Some("build-linux"));
        let path = pipeline.path_in(&EntityPath::root()).unwrap();
        assert_eq!(path.to_string(), "pipelines/build-linux");
        let stage = Stage::named("Test");
        assert_eq!(stage.path_in(&path).unwrap().to_string(), "pipelines/build-linux/stages/test");
    }

    #[test]
    fn blank_identity_has_no_key() {
        assert!(Pipeline::named("  ").key().is_none());
        assert!(Agent {
            uuid: String::new(),
            hostname: "h".into(),
            ip_address: "1.2.3.4".into(),
            resources: vec![]
        }
        .key()
        .is_none());
    }

    #[test]
    fn equal_tasks_share_a_key() {
        assert_eq!(exec("make").key(), exec("make").key());
        assert_ne!(exec("make").key(), exec("rake").key());
    }

    #[test]
    fn entity_ref_paths_and_tokens() {
        let mut graph = ConfigGraph::default();
        graph.environments.push(Environment::named("UAT"));
        let uat = EntityRef::Environment("uat".into());
        assert_eq!(uat.path().to_string(), "environments/uat");
        assert_eq!(uat.to_string(), "environment 'uat'");
        let token = graph.version_token(&uat).unwrap().unwrap();

        graph.environments[0].agents.push("agent-1".into());
        let changed = graph.version_token(&uat).unwrap().unwrap();
        assert_ne!(token, changed);
        assert!(graph.contains(&uat));
        assert!(!graph.contains(&EntityRef::Environment("prod".into())));
    }

    #[test]
    fn first_non_local_names_repository_entity() {
        let mut graph = ConfigGraph::default();
        graph.environments.push(Environment::named("uat"));
        assert!(graph.first_non_local().is_none());

        let mut prod = Environment::named("prod");
        prod.origin = ConfigOrigin::Repository(crate::origin::RepoOrigin {
            repo_id: "infra".into(),
            fingerprint: pipecfg_artifact::ContentHash::compute(b"git:url"),
            revision: "r1".into(),
        });
        graph.environments.push(prod);
        let (entity, origin) = graph.first_non_local().unwrap();
        assert_eq!(entity, EntityRef::Environment("prod".into()));
        assert_eq!(origin.repository().unwrap().repo_id, "infra");
    }
}
