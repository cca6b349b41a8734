//! Graph Builder and writer
//!
//! [`GraphBuilder`] turns a validated parse tree (or a detached fragment)
//! into model values; [`ConfigWriter`] does the reverse and re-validates what
//! it produced, so nothing the grammar rejects ever reaches a store.

use std::sync::Arc;

use pipecfg_artifact::{ConfigDocument, SCHEMA_VERSION_KEY};
use pipecfg_model::{ConfigGraph, Job, Pipeline, Stage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{BuildError, WriteError};
use crate::migration::CURRENT_SCHEMA_VERSION;
use crate::structural::{ParseTree, StructuralValidator};

/// An element that can be read and written detached from its graph
///
/// Fragments are single-key objects naming the element:
/// `{"pipeline": {...}}`.
pub trait Fragment: Serialize + DeserializeOwned {
    /// Root key of the fragment
    const ELEMENT: &'static str;
}

impl Fragment for Pipeline {
    const ELEMENT: &'static str = "pipeline";
}

impl Fragment for Stage {
    const ELEMENT: &'static str = "stage";
}

impl Fragment for Job {
    const ELEMENT: &'static str = "job";
}

/// Materializes validated documents and fragments
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    validator: Arc<StructuralValidator>,
}

impl GraphBuilder {
    /// Builder sharing a compiled grammar
    #[inline]
    #[must_use]
    pub fn new(validator: Arc<StructuralValidator>) -> Self {
        Self { validator }
    }

    /// Build the configuration graph of a parse tree
    ///
    /// # Errors
    /// Returns [`BuildError::Deserialize`] if the tree does not fit the model
    pub fn build(&self, tree: ParseTree) -> Result<ConfigGraph, BuildError> {
        let mut value = tree.into_value();
        if let Some(root) = value.as_object_mut() {
            root.remove(SCHEMA_VERSION_KEY);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Build one detached element of the requested type
    ///
    /// # Errors
    /// - [`BuildError::NotAFragment`] unless `fragment` is a single-key object
    /// - [`BuildError::ParseMismatch`] if the root names another element
    /// - [`BuildError::Structural`] if the body violates the grammar
    pub fn build_fragment<F: Fragment>(&self, fragment: &JsonValue) -> Result<F, BuildError> {
        let (element, body) = fragment
            .as_object()
            .filter(|root| root.len() == 1)
            .and_then(|root| root.iter().next())
            .ok_or(BuildError::NotAFragment)?;
        if element != F::ELEMENT {
            return Err(BuildError::ParseMismatch {
                expected: F::ELEMENT.to_owned(),
                actual: element.clone(),
            });
        }
        self.validator.validate_fragment(F::ELEMENT, body)?;
        Ok(serde_json::from_value(body.clone())?)
    }
}

/// Serializes graphs back to current-version documents
#[derive(Debug, Clone)]
pub struct ConfigWriter {
    validator: Arc<StructuralValidator>,
}

impl ConfigWriter {
    /// Writer sharing a compiled grammar
    #[inline]
    #[must_use]
    pub fn new(validator: Arc<StructuralValidator>) -> Self {
        Self { validator }
    }

    /// Render a graph as a document and check it would load again
    ///
    /// Only local graphs can be written; origins are not serialized, so a
    /// merged graph would silently absorb its partials.
    ///
    /// # Errors
    /// Returns [`WriteError::NonLocalEntity`] if the graph holds an entity
    /// from a config repository, or [`WriteError::Structural`] if the
    /// rendered document violates the grammar
    pub fn write(&self, graph: &ConfigGraph) -> Result<ConfigDocument, WriteError> {
        if let Some((entity, origin)) = graph.first_non_local() {
            return Err(WriteError::NonLocalEntity {
                entity,
                origin: origin.clone(),
            });
        }
        let value = serde_json::to_value(graph)?;
        let document = ConfigDocument::new(value).with_schema_version(CURRENT_SCHEMA_VERSION);
        self.validator.validate(&document)?;
        Ok(document)
    }

    /// Render one element as a fragment
    ///
    /// # Errors
    /// Returns error if the element cannot be serialized or violates the grammar
    pub fn write_fragment<F: Fragment>(&self, element: &F) -> Result<JsonValue, WriteError> {
        let body = serde_json::to_value(element)?;
        self.validator.validate_fragment(F::ELEMENT, &body)?;
        let mut root = Map::new();
        root.insert(F::ELEMENT.to_owned(), body);
        Ok(JsonValue::Object(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn shared() -> Arc<StructuralValidator> {
        Arc::new(StructuralValidator::new().unwrap())
    }

    #[test]
    fn stage_fragment_round_trips() {
        let validator = shared();
        let builder = GraphBuilder::new(Arc::clone(&validator));
        let writer = ConfigWriter::new(validator);

        let fragment = json!({"stage": {"name": "test", "jobs": [{"name": "unit"}]}});
        let stage: Stage = builder.build_fragment(&fragment).unwrap();
        assert_eq!(stage.name.as_str(), "test");
        assert!(stage.fetch_materials);

        let written = writer.write_fragment(&stage).unwrap();
        let again: Stage = builder.build_fragment(&written).unwrap();
        assert_eq!(again, stage);
    }

    #[test]
    fn wrong_root_is_a_parse_mismatch() {
        let builder = GraphBuilder::new(shared());
        let err = builder
            .build_fragment::<Pipeline>(&json!({"stage": {"name": "s"}}))
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::ParseMismatch { ref expected, ref actual } if expected == "pipeline" && actual == "stage"
        ));
    }

    #[test]
    fn multi_key_object_is_not_a_fragment() {
        let builder = GraphBuilder::new(shared());
        let err = builder
            .build_fragment::<Job>(&json!({"job": {"name": "a"}, "stage": {"name": "b"}}))
            .unwrap_err();
        assert!(matches!(err, BuildError::NotAFragment));
    }

    #[test]
    fn writer_refuses_invalid_graph() {
        let writer = ConfigWriter::new(shared());
        let mut graph = ConfigGraph::default();
        graph.agents.push(pipecfg_model::Agent {
            uuid: String::new(),
            hostname: "h".into(),
            ip_address: "10.0.0.1".into(),
            resources: vec![],
        });
        assert!(matches!(writer.write(&graph), Err(WriteError::Structural(_))));
    }

    #[test]
    fn writer_refuses_repository_entities() {
        let writer = ConfigWriter::new(shared());
        let mut graph = ConfigGraph::default();
        graph.environments.push(pipecfg_model::Environment::named("uat"));
        let mut remote = pipecfg_model::Environment::named("prod");
        remote.origin = pipecfg_model::ConfigOrigin::Repository(pipecfg_model::RepoOrigin {
            repo_id: "infra".into(),
            fingerprint: pipecfg_artifact::ContentHash::compute(b"git:https://example.com/infra.git"),
            revision: "r1".into(),
        });
        graph.environments.push(remote);

        let err = writer.write(&graph).unwrap_err();
        assert_eq!(
            err.to_string(),
            "environment 'prod' is defined in config repository 'infra' at revision r1 \
             and cannot be saved to the local config file"
        );
        assert!(matches!(err, WriteError::NonLocalEntity { .. }));
    }

    #[test]
    fn written_graph_builds_back_equal() {
        let validator = shared();
        let writer = ConfigWriter::new(Arc::clone(&validator));
        let builder = GraphBuilder::new(Arc::clone(&validator));

        let mut graph = ConfigGraph::default();
        graph.environments.push(pipecfg_model::Environment::named("uat"));
        let document = writer.write(&graph).unwrap();
        assert_eq!(document.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
        let tree = validator.validate(&document).unwrap();
        assert_eq!(builder.build(tree).unwrap(), graph);
    }
}
