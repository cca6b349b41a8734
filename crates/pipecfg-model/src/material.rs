//! Materials: the sources that trigger and feed a pipeline
//!
//! [`Material`] is a closed sum type. Every consumer (structural build,
//! validation, dependency traversal) matches it exhaustively.
//!
//! A material's identity is its [fingerprint](Material::fingerprint): a hash
//! over the variant and its identity fields only. Two materials with the same
//! fingerprint are "the same material", whatever their name, destination or
//! polling settings.

use pipecfg_artifact::{CaseInsensitiveName, ContentHash};
use serde::{Deserialize, Serialize};

/// A source of change for a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Material {
    /// Git repository
    Git(GitMaterial),
    /// Mercurial repository
    Hg(HgMaterial),
    /// Subversion repository
    Svn(SvnMaterial),
    /// Perforce depot
    P4(P4Material),
    /// Stage of an upstream pipeline
    Dependency(DependencyMaterial),
    /// Package from a package repository
    Package(PackageMaterial),
    /// Pluggable SCM declared under `scms`
    Plugin(PluggableScmMaterial),
}

/// Settings shared by every source-control material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScmSettings {
    /// Optional material name, usable in label templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<CaseInsensitiveName>,
    /// Checkout subdirectory of the working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Poll automatically
    #[serde(default = "default_true")]
    pub auto_update: bool,
    /// Ignore patterns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<String>,
}

impl Default for ScmSettings {
    fn default() -> Self {
        Self {
            name: None,
            destination: None,
            auto_update: true,
            filter: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitMaterial {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub shallow_clone: bool,
    #[serde(flatten)]
    pub settings: ScmSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HgMaterial {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(flatten)]
    pub settings: ScmSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvnMaterial {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Plain password, encrypted away during validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_password: Option<String>,
    #[serde(default)]
    pub check_externals: bool,
    #[serde(flatten)]
    pub settings: ScmSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct P4Material {
    pub port: String,
    pub view: String,
    #[serde(default)]
    pub use_tickets: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_password: Option<String>,
    #[serde(flatten)]
    pub settings: ScmSettings,
}

/// Upstream pipeline + stage this pipeline depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyMaterial {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<CaseInsensitiveName>,
    pub pipeline: CaseInsensitiveName,
    pub stage: CaseInsensitiveName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMaterial {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<CaseInsensitiveName>,
    /// Id of a package inside `repositories`
    #[serde(rename = "ref")]
    pub package_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluggableScmMaterial {
    /// Id of an entry in `scms`
    #[serde(rename = "ref")]
    pub scm_ref: String,
    #[serde(flatten)]
    pub settings: ScmSettings,
}

impl Material {
    /// Variant name as written in documents
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Git(_) => "git",
            Self::Hg(_) => "hg",
            Self::Svn(_) => "svn",
            Self::P4(_) => "p4",
            Self::Dependency(_) => "dependency",
            Self::Package(_) => "package",
            Self::Plugin(_) => "plugin",
        }
    }

    /// Identity hash over the variant and its identity fields
    #[must_use]
    pub fn fingerprint(&self) -> ContentHash {
        let parts: Vec<String> = match self {
            Self::Git(m) => vec![m.url.clone(), m.branch.clone()],
            Self::Hg(m) => vec![m.url.clone(), m.branch.clone().unwrap_or_default()],
            Self::Svn(m) => vec![
                m.url.clone(),
                m.username.clone().unwrap_or_default(),
                m.check_externals.to_string(),
            ],
            Self::P4(m) => vec![
                m.port.clone(),
                m.view.clone(),
                m.username.clone().unwrap_or_default(),
            ],
            Self::Dependency(m) => vec![m.pipeline.normalized(), m.stage.normalized()],
            Self::Package(m) => vec![m.package_ref.clone()],
            Self::Plugin(m) => vec![m.scm_ref.clone()],
        };
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.kind_name().as_bytes());
        for part in parts {
            // length prefix keeps ("ab","c") and ("a","bc") apart
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        ContentHash::new(*hasher.finalize().as_bytes())
    }

    /// Checkout-producing materials (everything but dependency and package)
    #[inline]
    #[must_use]
    pub const fn is_scm(&self) -> bool {
        !matches!(self, Self::Dependency(_) | Self::Package(_))
    }

    /// Shared source-control settings
    #[must_use]
    pub const fn scm_settings(&self) -> Option<&ScmSettings> {
        match self {
            Self::Git(m) => Some(&m.settings),
            Self::Hg(m) => Some(&m.settings),
            Self::Svn(m) => Some(&m.settings),
            Self::P4(m) => Some(&m.settings),
            Self::Plugin(m) => Some(&m.settings),
            Self::Dependency(_) | Self::Package(_) => None,
        }
    }

    /// Declared material name
    #[must_use]
    pub fn name(&self) -> Option<&CaseInsensitiveName> {
        match self {
            Self::Dependency(m) => m.name.as_ref(),
            Self::Package(m) => m.name.as_ref(),
            other => other.scm_settings().and_then(|s| s.name.as_ref()),
        }
    }

    /// Name a label template or fetch path refers to this material by
    ///
    /// A dependency material without an explicit name answers to its
    /// upstream pipeline's name.
    #[must_use]
    pub fn reference_name(&self) -> Option<CaseInsensitiveName> {
        match self {
            Self::Dependency(m) => Some(m.name.clone().unwrap_or_else(|| m.pipeline.clone())),
            other => other.name().cloned(),
        }
    }

    /// Checkout destination, if any
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        self.scm_settings().and_then(|s| s.destination.as_deref())
    }

    /// Whether the material is polled automatically
    #[must_use]
    pub fn auto_update(&self) -> bool {
        self.scm_settings().map_or(true, |s| s.auto_update)
    }

    /// Short human description, for messages
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Git(m) => format!("git {} ({})", m.url, m.branch),
            Self::Hg(m) => format!("hg {}", m.url),
            Self::Svn(m) => format!("svn {}", m.url),
            Self::P4(m) => format!("p4 {} {}", m.port, m.view),
            Self::Dependency(m) => format!("{} :: {}", m.pipeline, m.stage),
            Self::Package(m) => format!("package {}", m.package_ref),
            Self::Plugin(m) => format!("scm {}", m.scm_ref),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_branch() -> String {
    "master".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn git(url: &str, dest: Option<&str>, auto_update: bool) -> Material {
        Material::Git(GitMaterial {
            url: url.into(),
            branch: "master".into(),
            shallow_clone: false,
            settings: ScmSettings {
                destination: dest.map(String::from),
                auto_update,
                ..ScmSettings::default()
            },
        })
    }

    #[test]
    fn fingerprint_ignores_non_identity_fields() {
        let a = git("https://example.com/app.git", Some("app"), true);
        let b = git("https://example.com/app.git", None, false);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), git("https://example.com/lib.git", None, true).fingerprint());
    }

    #[test]
    fn dependency_fingerprint_is_case_insensitive() {
        let dep = |p: &str, s: &str| {
            Material::Dependency(DependencyMaterial {
                name: None,
                pipeline: p.into(),
                stage: s.into(),
            })
        };
        assert_eq!(dep("Up", "Build").fingerprint(), dep("up", "build").fingerprint());
        assert_ne!(dep("up", "build").fingerprint(), dep("up", "test").fingerprint());
    }

    #[test]
    fn deserializes_tagged_variants_with_defaults() {
        let m: Material = serde_json::from_value(json!({
            "type": "git",
            "url": "https://example.com/app.git",
            "destination": "app"
        }))
        .unwrap();
        let Material::Git(git) = &m else {
            panic!("expected git material");
        };
        assert_eq!(git.branch, "master");
        assert!(git.settings.auto_update);
        assert_eq!(m.destination(), Some("app"));
        assert!(m.is_scm());
    }

    #[test]
    fn dependency_reference_name_falls_back_to_pipeline() {
        let m: Material = serde_json::from_value(json!({
            "type": "dependency", "pipeline": "Upstream", "stage": "dist"
        }))
        .unwrap();
        assert!(!m.is_scm());
        assert_eq!(m.reference_name().unwrap().as_str(), "Upstream");
        assert_eq!(m.describe(), "Upstream :: dist");
    }

    #[test]
    fn serializes_back_to_tagged_form() {
        let value = serde_json::to_value(git("u", None, true)).unwrap();
        assert_eq!(
            value,
            json!({"type": "git", "url": "u", "branch": "master", "shallowClone": false, "autoUpdate": true})
        );
    }
}
