//! Pipeline groups, pipelines, stages and jobs

use pipecfg_artifact::CaseInsensitiveName;
use serde::{Deserialize, Serialize};

use crate::material::Material;
use crate::origin::ConfigOrigin;
use crate::task::Task;

/// Label used when a pipeline does not declare one
pub const DEFAULT_LABEL_TEMPLATE: &str = "${COUNT}";

/// Named container of pipelines with its own administrators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineGroup {
    pub name: CaseInsensitiveName,
    #[serde(default, skip_serializing_if = "Authorization::is_empty")]
    pub authorization: Authorization,
    #[serde(default)]
    pub pipelines: Vec<Pipeline>,
}

/// Users and roles administering a group or template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admins: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl Authorization {
    /// No admins and no roles
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.admins.is_empty() && self.roles.is_empty()
    }
}

/// A named sequence of stages triggered by materials
///
/// Either owns `stages` or references a `template`, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub name: CaseInsensitiveName,
    #[serde(default = "default_label_template")]
    pub label_template: String,
    #[serde(default)]
    pub lock_behavior: LockBehavior,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<CaseInsensitiveName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer: Option<Timer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariable>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<Stage>,
    /// Stamped by the merge engine, never serialized
    #[serde(skip)]
    pub origin: ConfigOrigin,
}

impl Pipeline {
    /// Pipeline with defaults and no materials or stages
    #[must_use]
    pub fn named(name: impl Into<CaseInsensitiveName>) -> Self {
        Self {
            name: name.into(),
            label_template: default_label_template(),
            lock_behavior: LockBehavior::default(),
            template: None,
            timer: None,
            params: Vec::new(),
            environment_variables: Vec::new(),
            materials: Vec::new(),
            stages: Vec::new(),
            origin: ConfigOrigin::Local,
        }
    }

    /// Own stage by name
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name.matches(name))
    }

    /// Dependency materials pointing at `upstream`
    pub fn dependencies_on<'a>(
        &'a self,
        upstream: &'a str,
    ) -> impl Iterator<Item = &'a crate::material::DependencyMaterial> + 'a {
        self.materials.iter().filter_map(move |m| match m {
            Material::Dependency(dep) if dep.pipeline.matches(upstream) => Some(dep),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LockBehavior {
    #[default]
    None,
    LockOnFailure,
    UnlockWhenFinished,
}

/// Cron-style trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub spec: String,
    #[serde(default)]
    pub only_on_changes: bool,
}

/// Pipeline parameter, referenced as `#{name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Environment variable of a pipeline, stage, job or environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    pub name: CaseInsensitiveName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_value: Option<String>,
    #[serde(default)]
    pub secure: bool,
}

impl EnvironmentVariable {
    /// Plain, non-secure variable
    #[must_use]
    pub fn plain(name: impl Into<CaseInsensitiveName>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            encrypted_value: None,
            secure: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub name: CaseInsensitiveName,
    #[serde(default = "default_true")]
    pub fetch_materials: bool,
    #[serde(default)]
    pub clean_working_dir: bool,
    #[serde(default)]
    pub artifact_cleanup_prohibited: bool,
    #[serde(default)]
    pub approval: Approval,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariable>,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl Stage {
    /// Stage with default settings and no jobs
    #[must_use]
    pub fn named(name: impl Into<CaseInsensitiveName>) -> Self {
        Self {
            name: name.into(),
            fetch_materials: true,
            clean_working_dir: false,
            artifact_cleanup_prohibited: false,
            approval: Approval::default(),
            environment_variables: Vec::new(),
            jobs: Vec::new(),
        }
    }

    /// Job by name, case-insensitively
    #[must_use]
    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.name.matches(name))
    }
}

/// How a stage is triggered once the previous one finishes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    #[serde(rename = "type", default)]
    pub kind: ApprovalType,
    #[serde(default, skip_serializing_if = "Authorization::is_empty")]
    pub authorization: Authorization,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalType {
    #[default]
    Success,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub name: CaseInsensitiveName,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elastic_profile_id: Option<String>,
    #[serde(default)]
    pub run_on_all_agents: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_instance_count: Option<u32>,
    /// Minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariable>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactConfig>,
}

impl Job {
    /// Job with default settings and no tasks
    #[must_use]
    pub fn named(name: impl Into<CaseInsensitiveName>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            elastic_profile_id: None,
            run_on_all_agents: false,
            run_instance_count: None,
            timeout: None,
            environment_variables: Vec::new(),
            tasks: Vec::new(),
            artifacts: Vec::new(),
        }
    }
}

/// Artifact a job publishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactConfig {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Build,
    Test,
}

fn default_label_template() -> String {
    DEFAULT_LABEL_TEMPLATE.to_owned()
}

fn default_true() -> bool {
    true
}
