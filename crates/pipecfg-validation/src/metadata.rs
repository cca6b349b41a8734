//! Plugin metadata collaborator
//!
//! Plugins describe the configuration keys they accept. Validation only
//! needs the static shape: which keys exist, which are required, which hold
//! secrets and which make up a package's identity.

use std::collections::HashMap;
use std::fmt::Debug;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One configuration key a plugin accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyMetadata {
    pub key: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_true")]
    pub part_of_identity: bool,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub display_order: u32,
}

impl PropertyMetadata {
    /// Optional, non-secure key
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secure: false,
            required: false,
            part_of_identity: true,
            display_name: None,
            display_order: 0,
        }
    }

    #[must_use]
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self.part_of_identity = false;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Name shown in messages
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.key)
    }
}

/// Source of plugin configuration metadata
pub trait PluginMetadataStore: Send + Sync + Debug {
    /// Keys of a plugin's own configuration (elastic profiles, package
    /// repositories, SCMs, tasks); `None` for an unknown plugin
    fn properties(&self, plugin_id: &str) -> Option<Vec<PropertyMetadata>>;

    /// Keys of the packages inside a package repository of this plugin
    fn package_properties(&self, _plugin_id: &str) -> Option<Vec<PropertyMetadata>> {
        None
    }
}

/// In-memory metadata, registered up front
#[derive(Debug, Default)]
pub struct StaticPluginMetadata {
    plugins: RwLock<HashMap<String, Vec<PropertyMetadata>>>,
    packages: RwLock<HashMap<String, Vec<PropertyMetadata>>>,
}

impl StaticPluginMetadata {
    /// No plugins known
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata from a plugin id → keys map
    #[must_use]
    pub fn from_map(plugins: HashMap<String, Vec<PropertyMetadata>>) -> Self {
        Self {
            plugins: RwLock::new(plugins),
            packages: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) a plugin's keys
    pub fn register(&self, plugin_id: impl Into<String>, properties: Vec<PropertyMetadata>) {
        self.plugins.write().insert(plugin_id.into(), properties);
    }

    /// Register (or replace) the package keys of a package plugin
    pub fn register_package(&self, plugin_id: impl Into<String>, properties: Vec<PropertyMetadata>) {
        self.packages.write().insert(plugin_id.into(), properties);
    }

    /// Number of plugins with configuration metadata
    #[must_use]
    pub fn plugin_count(&self) -> usize {
        self.plugins.read().len()
    }
}

impl PluginMetadataStore for StaticPluginMetadata {
    fn properties(&self, plugin_id: &str) -> Option<Vec<PropertyMetadata>> {
        self.plugins.read().get(plugin_id).cloned()
    }

    fn package_properties(&self, plugin_id: &str) -> Option<Vec<PropertyMetadata>> {
        self.packages.read().get(plugin_id).cloned()
    }
}

/// Metadata for one key of a plugin, if both are known
pub(crate) fn lookup<'m>(metadata: Option<&'m [PropertyMetadata]>, key: &str) -> Option<&'m PropertyMetadata> {
    metadata.and_then(|m| m.iter().find(|p| p.key == key))
}

fn default_true() -> bool {
    true
}
