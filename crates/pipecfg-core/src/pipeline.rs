//! Pipeline commands
//!
//! Pipelines live inside groups, so they get their own commands: creation
//! names the group (created on demand), and group administrators may manage
//! the pipelines of their group.

use pipecfg_artifact::{CaseInsensitiveName, VersionToken};
use pipecfg_model::{ConfigGraph, EntityRef, Pipeline, PipelineGroup};

use crate::auth::Authorizer;
use crate::command::{ConfigCommand, Rejection};

fn may_edit_in_group(authorizer: &dyn Authorizer, graph: &ConfigGraph, user: &str, pipeline: &str) -> bool {
    match graph.group_of(pipeline) {
        Some(group) => authorizer.is_group_admin(graph, user, group.name.as_str()),
        None => authorizer.is_admin(graph, user),
    }
}

/// Add a pipeline to a group
#[derive(Debug, Clone)]
pub struct CreatePipeline {
    group: CaseInsensitiveName,
    pipeline: Pipeline,
}

impl CreatePipeline {
    #[must_use]
    pub fn new(group: impl Into<CaseInsensitiveName>, pipeline: Pipeline) -> Self {
        Self {
            group: group.into(),
            pipeline,
        }
    }
}

impl ConfigCommand for CreatePipeline {
    fn name(&self) -> &'static str {
        "create-pipeline"
    }

    fn describe(&self) -> String {
        format!("create pipeline '{}' in group '{}'", self.pipeline.name, self.group)
    }

    fn touched(&self) -> Vec<EntityRef> {
        vec![EntityRef::Pipeline(self.pipeline.name.clone())]
    }

    fn is_authorized(&self, authorizer: &dyn Authorizer, graph: &ConfigGraph, user: &str) -> bool {
        authorizer.is_group_admin(graph, user, self.group.as_str())
    }

    fn apply(&self, graph: &mut ConfigGraph) -> Result<String, Rejection> {
        if graph.find_pipeline(self.pipeline.name.as_str()).is_some() {
            return Err(Rejection::Conflict(format!(
                "Failed to add pipeline '{}'. Another pipeline with the same name already exists.",
                self.pipeline.name
            )));
        }
        let index = match graph.pipeline_groups.iter().position(|g| g.name == self.group) {
            Some(index) => index,
            None => {
                graph.pipeline_groups.push(PipelineGroup {
                    name: self.group.clone(),
                    ..PipelineGroup::default()
                });
                graph.pipeline_groups.len() - 1
            }
        };
        graph.pipeline_groups[index].pipelines.push(self.pipeline.clone());
        Ok(format!("Pipeline '{}' was created successfully.", self.pipeline.name))
    }
}

/// Replace a pipeline in its group
#[derive(Debug, Clone)]
pub struct UpdatePipeline {
    pipeline: Pipeline,
    token: VersionToken,
}

impl UpdatePipeline {
    #[must_use]
    pub fn new(pipeline: Pipeline, token: VersionToken) -> Self {
        Self { pipeline, token }
    }

    fn reference(&self) -> EntityRef {
        EntityRef::Pipeline(self.pipeline.name.clone())
    }
}

impl ConfigCommand for UpdatePipeline {
    fn name(&self) -> &'static str {
        "update-pipeline"
    }

    fn describe(&self) -> String {
        format!("update pipeline '{}'", self.pipeline.name)
    }

    fn touched(&self) -> Vec<EntityRef> {
        vec![self.reference()]
    }

    fn expected_tokens(&self) -> Vec<(EntityRef, VersionToken)> {
        vec![(self.reference(), self.token)]
    }

    fn is_authorized(&self, authorizer: &dyn Authorizer, graph: &ConfigGraph, user: &str) -> bool {
        may_edit_in_group(authorizer, graph, user, self.pipeline.name.as_str())
    }

    fn apply(&self, graph: &mut ConfigGraph) -> Result<String, Rejection> {
        let reference = self.reference();
        let existing = graph
            .find_pipeline_mut(self.pipeline.name.as_str())
            .ok_or_else(|| Rejection::missing(&reference))?;
        *existing = self.pipeline.clone();
        Ok(format!("Pipeline '{}' was updated successfully.", self.pipeline.name))
    }
}

/// Remove a pipeline
///
/// Refused while an environment lists it. Downstream pipelines depending on
/// it are left to validation, which reports the dangling dependency.
#[derive(Debug, Clone)]
pub struct DeletePipeline {
    name: CaseInsensitiveName,
    token: VersionToken,
}

impl DeletePipeline {
    #[must_use]
    pub fn new(name: impl Into<CaseInsensitiveName>, token: VersionToken) -> Self {
        Self {
            name: name.into(),
            token,
        }
    }
}

impl ConfigCommand for DeletePipeline {
    fn name(&self) -> &'static str {
        "delete-pipeline"
    }

    fn describe(&self) -> String {
        format!("delete pipeline '{}'", self.name)
    }

    fn touched(&self) -> Vec<EntityRef> {
        vec![EntityRef::Pipeline(self.name.clone())]
    }

    fn expected_tokens(&self) -> Vec<(EntityRef, VersionToken)> {
        vec![(EntityRef::Pipeline(self.name.clone()), self.token)]
    }

    fn is_authorized(&self, authorizer: &dyn Authorizer, graph: &ConfigGraph, user: &str) -> bool {
        may_edit_in_group(authorizer, graph, user, self.name.as_str())
    }

    fn apply(&self, graph: &mut ConfigGraph) -> Result<String, Rejection> {
        if let Some(environment) = graph.environment_of(&self.name) {
            return Err(Rejection::BadRequest(format!(
                "Cannot delete pipeline '{}' as it is present in environment '{}'.",
                self.name, environment.name
            )));
        }
        let group = graph
            .pipeline_groups
            .iter_mut()
            .find(|g| g.pipelines.iter().any(|p| p.name == self.name))
            .ok_or_else(|| Rejection::missing(&EntityRef::Pipeline(self.name.clone())))?;
        group.pipelines.retain(|p| p.name != self.name);
        Ok(format!("Pipeline '{}' was deleted successfully.", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SecurityConfigAuthorizer;
    use pipecfg_test_utils::{environment, graph_with, simple_pipeline, DEFAULT_GROUP};

    fn token() -> VersionToken {
        VersionToken::of("unused").unwrap()
    }

    #[test]
    fn create_makes_missing_group() {
        let mut graph = graph_with(vec![simple_pipeline("build")]);
        CreatePipeline::new("release", simple_pipeline("ship")).apply(&mut graph).unwrap();
        assert_eq!(graph.pipeline_groups.len(), 2);
        assert_eq!(graph.group_of("ship").unwrap().name.as_str(), "release");

        CreatePipeline::new(DEFAULT_GROUP, simple_pipeline("test")).apply(&mut graph).unwrap();
        assert_eq!(graph.pipeline_groups[0].pipelines.len(), 2);
    }

    #[test]
    fn create_rejects_taken_name() {
        let mut graph = graph_with(vec![simple_pipeline("build")]);
        let err = CreatePipeline::new("other", simple_pipeline("BUILD")).apply(&mut graph).unwrap_err();
        assert_eq!(err.status(), crate::StatusClass::Conflict);
    }

    #[test]
    fn delete_refused_while_in_environment() {
        let mut graph = graph_with(vec![simple_pipeline("build")]);
        graph.environments.push(environment("uat", &["build"], &[]));
        let err = DeletePipeline::new("build", token()).apply(&mut graph).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot delete pipeline 'build' as it is present in environment 'uat'."
        );

        graph.environments.clear();
        DeletePipeline::new("Build", token()).apply(&mut graph).unwrap();
        assert!(graph.find_pipeline("build").is_none());
    }

    #[test]
    fn group_admins_manage_their_pipelines() {
        let mut graph = graph_with(vec![simple_pipeline("build")]);
        graph.server.security.admins.push("root".into());
        graph.pipeline_groups[0].authorization.admins.push("gail".into());
        let update = UpdatePipeline::new(simple_pipeline("build"), token());
        assert!(update.is_authorized(&SecurityConfigAuthorizer, &graph, "gail"));
        assert!(!update.is_authorized(&SecurityConfigAuthorizer, &graph, "mallory"));
        let create = CreatePipeline::new("elsewhere", simple_pipeline("x"));
        assert!(!create.is_authorized(&SecurityConfigAuthorizer, &graph, "gail"));
    }
}
