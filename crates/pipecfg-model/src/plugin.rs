//! Plugin-typed resources and their key/value configuration

use serde::{Deserialize, Serialize};

use crate::material::Material;

/// One key of a plugin configuration; the value is plain or encrypted at rest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigProperty {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_value: Option<String>,
}

impl ConfigProperty {
    /// Plain-valued property
    #[must_use]
    pub fn plain(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            encrypted_value: None,
        }
    }

    /// Has any value, plain or encrypted
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.is_empty()) || self.encrypted_value.is_some()
    }
}

/// Elastic agent profile a job may run on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticProfile {
    pub id: String,
    pub plugin_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<ConfigProperty>,
}

/// Package repository with its packages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRepository {
    pub id: String,
    pub name: String,
    pub plugin_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configuration: Vec<ConfigProperty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<PackageDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configuration: Vec<ConfigProperty>,
}

/// Pluggable SCM referenced by `plugin` materials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scm {
    pub id: String,
    pub name: String,
    pub plugin_id: String,
    #[serde(default = "default_true")]
    pub auto_update: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configuration: Vec<ConfigProperty>,
}

/// External repository whose content is parsed into a partial graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRepo {
    pub id: String,
    pub plugin_id: String,
    pub material: Material,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn property_value_detection() {
        assert!(ConfigProperty::plain("k", "v").has_value());
        assert!(!ConfigProperty::plain("k", "").has_value());
        let encrypted = ConfigProperty {
            key: "k".into(),
            value: None,
            encrypted_value: Some("b3:..".into()),
        };
        assert!(encrypted.has_value());
    }

    #[test]
    fn repository_with_packages_deserializes() {
        let repo: PackageRepository = serde_json::from_value(json!({
            "id": "repo-1", "name": "yum", "pluginId": "yum",
            "configuration": [{"key": "REPO_URL", "value": "http://mirror"}],
            "packages": [{"id": "pkg-1", "name": "nginx"}]
        }))
        .unwrap();
        assert_eq!(repo.packages[0].id, "pkg-1");
        assert_eq!(repo.configuration[0].value.as_deref(), Some("http://mirror"));
    }
}
