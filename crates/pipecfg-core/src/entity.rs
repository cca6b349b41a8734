//! Create, update and delete for top-level entities
//!
//! [`TopLevel`] describes where an entity kind lives in the graph; the three
//! generic commands work for every kind that implements it.

use std::fmt::Debug;
use std::marker::PhantomData;

use pipecfg_artifact::VersionToken;
use pipecfg_model::{
    Agent, ConfigGraph, ConfigRepo, ElasticProfile, EntityRef, Environment, PackageRepository, Scm,
    Template,
};
use serde::Serialize;

use crate::auth::Authorizer;
use crate::command::{capitalized, ConfigCommand, Rejection};

/// An entity kind held in a top-level collection of the graph
pub trait TopLevel: Clone + Debug + Serialize + Send + Sync + 'static {
    /// Kind, as used in command names
    const KIND: &'static str;

    /// Reference naming this entity
    fn reference(&self) -> EntityRef;

    /// The collection holding entities of this kind
    fn items_mut(graph: &mut ConfigGraph) -> &mut Vec<Self>;

    /// May `user` change the referenced entity?
    fn may_edit(authorizer: &dyn Authorizer, graph: &ConfigGraph, user: &str, _entity: &EntityRef) -> bool {
        authorizer.is_admin(graph, user)
    }

    /// Clean up references elsewhere after a delete
    fn after_delete(_graph: &mut ConfigGraph, _entity: &EntityRef) {}
}

impl TopLevel for Environment {
    const KIND: &'static str = "environment";

    fn reference(&self) -> EntityRef {
        EntityRef::Environment(self.name.clone())
    }

    fn items_mut(graph: &mut ConfigGraph) -> &mut Vec<Self> {
        &mut graph.environments
    }
}

impl TopLevel for Template {
    const KIND: &'static str = "template";

    fn reference(&self) -> EntityRef {
        EntityRef::Template(self.name.clone())
    }

    fn items_mut(graph: &mut ConfigGraph) -> &mut Vec<Self> {
        &mut graph.templates
    }

    fn may_edit(authorizer: &dyn Authorizer, graph: &ConfigGraph, user: &str, entity: &EntityRef) -> bool {
        authorizer.can_edit_template(graph, user, entity.id())
    }
}

impl TopLevel for ElasticProfile {
    const KIND: &'static str = "elastic-profile";

    fn reference(&self) -> EntityRef {
        EntityRef::ElasticProfile(self.id.clone())
    }

    fn items_mut(graph: &mut ConfigGraph) -> &mut Vec<Self> {
        &mut graph.elastic_profiles
    }
}

impl TopLevel for PackageRepository {
    const KIND: &'static str = "package-repository";

    fn reference(&self) -> EntityRef {
        EntityRef::PackageRepository(self.id.clone())
    }

    fn items_mut(graph: &mut ConfigGraph) -> &mut Vec<Self> {
        &mut graph.repositories
    }
}

impl TopLevel for Scm {
    const KIND: &'static str = "scm";

    fn reference(&self) -> EntityRef {
        EntityRef::Scm(self.id.clone())
    }

    fn items_mut(graph: &mut ConfigGraph) -> &mut Vec<Self> {
        &mut graph.scms
    }
}

impl TopLevel for Agent {
    const KIND: &'static str = "agent";

    fn reference(&self) -> EntityRef {
        EntityRef::Agent(self.uuid.clone())
    }

    fn items_mut(graph: &mut ConfigGraph) -> &mut Vec<Self> {
        &mut graph.agents
    }

    fn after_delete(graph: &mut ConfigGraph, entity: &EntityRef) {
        for environment in graph.environments.iter_mut().filter(|e| e.origin.is_local()) {
            environment.agents.retain(|a| a != entity.id());
        }
    }
}

impl TopLevel for ConfigRepo {
    const KIND: &'static str = "config-repo";

    fn reference(&self) -> EntityRef {
        EntityRef::ConfigRepo(self.id.clone())
    }

    fn items_mut(graph: &mut ConfigGraph) -> &mut Vec<Self> {
        &mut graph.config_repos
    }
}

fn position<E: TopLevel>(graph: &mut ConfigGraph, entity: &EntityRef) -> Option<usize> {
    E::items_mut(graph).iter().position(|e| &e.reference() == entity)
}

/// Add a new entity
#[derive(Debug, Clone)]
pub struct CreateEntity<E> {
    entity: E,
}

impl<E: TopLevel> CreateEntity<E> {
    #[must_use]
    pub fn new(entity: E) -> Self {
        Self { entity }
    }
}

impl<E: TopLevel> ConfigCommand for CreateEntity<E> {
    fn name(&self) -> &'static str {
        "create-entity"
    }

    fn describe(&self) -> String {
        format!("create {}", self.entity.reference())
    }

    fn touched(&self) -> Vec<EntityRef> {
        vec![self.entity.reference()]
    }

    fn is_authorized(&self, authorizer: &dyn Authorizer, graph: &ConfigGraph, user: &str) -> bool {
        E::may_edit(authorizer, graph, user, &self.entity.reference())
    }

    fn apply(&self, graph: &mut ConfigGraph) -> Result<String, Rejection> {
        let reference = self.entity.reference();
        if position::<E>(graph, &reference).is_some() {
            return Err(Rejection::Conflict(format!(
                "Failed to add {}. {} already exists.",
                E::KIND,
                capitalized(&reference)
            )));
        }
        E::items_mut(graph).push(self.entity.clone());
        Ok(format!("{} was created successfully.", capitalized(&reference)))
    }
}

/// Replace an entity wholesale, given the token of the state it was based on
#[derive(Debug, Clone)]
pub struct UpdateEntity<E> {
    entity: E,
    token: VersionToken,
}

impl<E: TopLevel> UpdateEntity<E> {
    #[must_use]
    pub fn new(entity: E, token: VersionToken) -> Self {
        Self { entity, token }
    }
}

impl<E: TopLevel> ConfigCommand for UpdateEntity<E> {
    fn name(&self) -> &'static str {
        "update-entity"
    }

    fn describe(&self) -> String {
        format!("update {}", self.entity.reference())
    }

    fn touched(&self) -> Vec<EntityRef> {
        vec![self.entity.reference()]
    }

    fn expected_tokens(&self) -> Vec<(EntityRef, VersionToken)> {
        vec![(self.entity.reference(), self.token)]
    }

    fn is_authorized(&self, authorizer: &dyn Authorizer, graph: &ConfigGraph, user: &str) -> bool {
        E::may_edit(authorizer, graph, user, &self.entity.reference())
    }

    fn apply(&self, graph: &mut ConfigGraph) -> Result<String, Rejection> {
        let reference = self.entity.reference();
        let index = position::<E>(graph, &reference).ok_or_else(|| Rejection::missing(&reference))?;
        E::items_mut(graph)[index] = self.entity.clone();
        Ok(format!("{} was updated successfully.", capitalized(&reference)))
    }
}

/// Remove an entity
#[derive(Debug, Clone)]
pub struct DeleteEntity<E> {
    reference: EntityRef,
    token: VersionToken,
    kind: PhantomData<fn() -> E>,
}

impl<E: TopLevel> DeleteEntity<E> {
    #[must_use]
    pub fn new(reference: EntityRef, token: VersionToken) -> Self {
        Self {
            reference,
            token,
            kind: PhantomData,
        }
    }
}

impl<E: TopLevel> ConfigCommand for DeleteEntity<E> {
    fn name(&self) -> &'static str {
        "delete-entity"
    }

    fn describe(&self) -> String {
        format!("delete {}", self.reference)
    }

    fn touched(&self) -> Vec<EntityRef> {
        vec![self.reference.clone()]
    }

    fn expected_tokens(&self) -> Vec<(EntityRef, VersionToken)> {
        vec![(self.reference.clone(), self.token)]
    }

    fn is_authorized(&self, authorizer: &dyn Authorizer, graph: &ConfigGraph, user: &str) -> bool {
        E::may_edit(authorizer, graph, user, &self.reference)
    }

    fn apply(&self, graph: &mut ConfigGraph) -> Result<String, Rejection> {
        let index = position::<E>(graph, &self.reference).ok_or_else(|| Rejection::missing(&self.reference))?;
        E::items_mut(graph).remove(index);
        E::after_delete(graph, &self.reference);
        Ok(format!("{} was deleted successfully.", capitalized(&self.reference)))
    }
}
