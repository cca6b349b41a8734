//! Environments, templates and agents

use pipecfg_artifact::CaseInsensitiveName;
use serde::{Deserialize, Serialize};

use crate::origin::ConfigOrigin;
use crate::pipeline::{Authorization, EnvironmentVariable, Stage};

/// Group of agents and pipelines sharing environment variables
///
/// A pipeline belongs to at most one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: CaseInsensitiveName,
    /// Agent UUIDs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipelines: Vec<CaseInsensitiveName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariable>,
    #[serde(skip)]
    pub origin: ConfigOrigin,
}

impl Environment {
    /// Empty environment
    #[must_use]
    pub fn named(name: impl Into<CaseInsensitiveName>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            pipelines: Vec::new(),
            environment_variables: Vec::new(),
            origin: ConfigOrigin::Local,
        }
    }

    /// Contains the pipeline?
    #[must_use]
    pub fn has_pipeline(&self, name: &CaseInsensitiveName) -> bool {
        self.pipelines.contains(name)
    }

    /// Contains the agent?
    #[must_use]
    pub fn has_agent(&self, uuid: &str) -> bool {
        self.agents.iter().any(|a| a == uuid)
    }
}

/// Reusable stage sequence referenced by pipelines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: CaseInsensitiveName,
    #[serde(default, skip_serializing_if = "Authorization::is_empty")]
    pub authorization: Authorization,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(skip)]
    pub origin: ConfigOrigin,
}

impl Template {
    /// Template with the given stages
    #[must_use]
    pub fn new(name: impl Into<CaseInsensitiveName>, stages: Vec<Stage>) -> Self {
        Self {
            name: name.into(),
            authorization: Authorization::default(),
            stages,
            origin: ConfigOrigin::Local,
        }
    }
}

/// Registered build agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub uuid: String,
    pub hostname: String,
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
}
