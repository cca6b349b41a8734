//! The configuration graph root

use pipecfg_artifact::CaseInsensitiveName;
use serde::{Deserialize, Serialize};

use crate::environment::{Agent, Environment, Template};
use crate::pipeline::{Pipeline, PipelineGroup, Stage};
use crate::plugin::{ConfigRepo, ElasticProfile, PackageDefinition, PackageRepository, Scm};

/// Root of the in-memory configuration
///
/// A plain value: cloning it yields a fully independent copy, and nothing in
/// it points back at its owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigGraph {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elastic_profiles: Vec<ElasticProfile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_repos: Vec<ConfigRepo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipeline_groups: Vec<PipelineGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<Template>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<Environment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<Agent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<PackageRepository>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scms: Vec<Scm>,
}

/// Server-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,
    /// Start purging artifacts below this much free space (GB)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purge_start_gb: Option<u32>,
    /// Purge until this much space is free (GB)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purge_upto_gb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "SecurityConfig::is_empty")]
    pub security: SecurityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            purge_start_gb: None,
            purge_upto_gb: None,
            server_id: None,
            security: SecurityConfig::default(),
        }
    }
}

/// System administrators and roles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admins: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,
}

impl SecurityConfig {
    /// No admins and no roles: security disabled
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.admins.is_empty() && self.roles.is_empty()
    }

    /// Role by name
    #[must_use]
    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name.matches(name))
    }

    /// Roles a user belongs to
    pub fn roles_of<'a>(&'a self, user: &'a str) -> impl Iterator<Item = &'a Role> + 'a {
        self.roles
            .iter()
            .filter(move |r| r.users.iter().any(|u| u.eq_ignore_ascii_case(user)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: CaseInsensitiveName,
    #[serde(default)]
    pub users: Vec<String>,
}

impl ConfigGraph {
    /// Every pipeline, in group order
    pub fn pipelines(&self) -> impl Iterator<Item = &Pipeline> {
        self.pipeline_groups.iter().flat_map(|g| g.pipelines.iter())
    }

    /// Every pipeline with its group
    pub fn pipelines_with_group(&self) -> impl Iterator<Item = (&PipelineGroup, &Pipeline)> {
        self.pipeline_groups
            .iter()
            .flat_map(|g| g.pipelines.iter().map(move |p| (g, p)))
    }

    /// Pipeline by name, case-insensitively
    #[must_use]
    pub fn find_pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines().find(|p| p.name.matches(name))
    }

    /// Mutable pipeline by name
    pub fn find_pipeline_mut(&mut self, name: &str) -> Option<&mut Pipeline> {
        self.pipeline_groups
            .iter_mut()
            .flat_map(|g| g.pipelines.iter_mut())
            .find(|p| p.name.matches(name))
    }

    /// Group containing the named pipeline
    #[must_use]
    pub fn group_of(&self, pipeline: &str) -> Option<&PipelineGroup> {
        self.pipelines_with_group()
            .find(|(_, p)| p.name.matches(pipeline))
            .map(|(g, _)| g)
    }

    /// Group by name
    #[must_use]
    pub fn find_group(&self, name: &str) -> Option<&PipelineGroup> {
        self.pipeline_groups.iter().find(|g| g.name.matches(name))
    }

    /// Template by name
    #[must_use]
    pub fn find_template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name.matches(name))
    }

    /// Environment by name
    #[must_use]
    pub fn find_environment(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name.matches(name))
    }

    /// Environment a pipeline belongs to
    #[must_use]
    pub fn environment_of(&self, pipeline: &CaseInsensitiveName) -> Option<&Environment> {
        self.environments.iter().find(|e| e.has_pipeline(pipeline))
    }

    /// Agent by UUID
    #[must_use]
    pub fn find_agent(&self, uuid: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.uuid == uuid)
    }

    /// Elastic profile by id
    #[must_use]
    pub fn find_elastic_profile(&self, id: &str) -> Option<&ElasticProfile> {
        self.elastic_profiles.iter().find(|p| p.id == id)
    }

    /// Package by id, across all repositories
    #[must_use]
    pub fn find_package(&self, id: &str) -> Option<(&PackageRepository, &PackageDefinition)> {
        self.repositories
            .iter()
            .flat_map(|r| r.packages.iter().map(move |p| (r, p)))
            .find(|(_, p)| p.id == id)
    }

    /// Pluggable SCM by id
    #[must_use]
    pub fn find_scm(&self, id: &str) -> Option<&Scm> {
        self.scms.iter().find(|s| s.id == id)
    }

    /// Stages a pipeline actually runs: its own, or its template's
    ///
    /// A pipeline naming a missing template has no effective stages.
    #[must_use]
    pub fn effective_stages<'a>(&'a self, pipeline: &'a Pipeline) -> &'a [Stage] {
        match &pipeline.template {
            Some(name) => self
                .find_template(name.as_str())
                .map_or(&[][..], |t| t.stages.as_slice()),
            None => &pipeline.stages,
        }
    }

    /// True if every pipeline, environment and template is locally defined
    #[must_use]
    pub fn is_local_only(&self) -> bool {
        self.pipelines().all(|p| p.origin.is_local())
            && self.environments.iter().all(|e| e.origin.is_local())
            && self.templates.iter().all(|t| t.origin.is_local())
    }
}

fn default_artifacts_dir() -> String {
    "artifacts".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Template;
    use crate::pipeline::{Pipeline, PipelineGroup, Stage};

    fn graph() -> ConfigGraph {
        let mut templated = Pipeline::named("Deploy");
        templated.template = Some("standard".into());
        let mut own = Pipeline::named("Build");
        own.stages.push(Stage::named("compile"));
        ConfigGraph {
            pipeline_groups: vec![PipelineGroup {
                name: "first".into(),
                pipelines: vec![own, templated],
                ..PipelineGroup::default()
            }],
            templates: vec![Template::new("Standard", vec![Stage::named("a"), Stage::named("b")])],
            ..ConfigGraph::default()
        }
    }

    #[test]
    fn finds_pipelines_case_insensitively() {
        let g = graph();
        assert!(g.find_pipeline("build").is_some());
        assert_eq!(g.group_of("DEPLOY").unwrap().name.as_str(), "first");
        assert!(g.find_pipeline("missing").is_none());
    }

    #[test]
    fn effective_stages_resolve_templates() {
        let g = graph();
        let build = g.find_pipeline("build").unwrap();
        let deploy = g.find_pipeline("deploy").unwrap();
        assert_eq!(g.effective_stages(build).len(), 1);
        assert_eq!(g.effective_stages(deploy).len(), 2);

        let mut orphan = Pipeline::named("orphan");
        orphan.template = Some("nope".into());
        assert!(g.effective_stages(&orphan).is_empty());
    }

    #[test]
    fn roles_of_user() {
        let security = SecurityConfig {
            admins: vec![],
            roles: vec![
                Role { name: "ops".into(), users: vec!["Alice".into()] },
                Role { name: "dev".into(), users: vec!["bob".into()] },
            ],
        };
        let names: Vec<_> = security.roles_of("alice").map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["ops"]);
        assert!(security.role("OPS").is_some());
    }

    #[test]
    fn fresh_graph_is_local_only() {
        assert!(graph().is_local_only());
    }
}
