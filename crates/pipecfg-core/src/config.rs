//! Engine settings
//!
//! Everything tunable about the service, loadable from TOML:
//!
//! ```toml
//! max_document_size = 10485760
//! cache_capacity = 64
//! write_back_upgrades = true
//! keep_last_valid_partial = true
//! cipher_key_file = "/etc/pipecfg/cipher"
//!
//! [[plugins.docker]]
//! key = "Image"
//! required = true
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pipecfg_artifact::Blake3Cipher;
use pipecfg_loader::{ConfigLoader, StructuralError, DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_DOCUMENT_SIZE};
use pipecfg_validation::{PropertyMetadata, StaticPluginMetadata};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};

/// Configuration service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest document accepted from the store (bytes)
    pub max_document_size: usize,
    /// Loads kept in the parse cache
    pub cache_capacity: u64,
    /// Write a migrated document back to the store after loading it
    pub write_back_upgrades: bool,
    /// Keep a repository's previous partial when its new one is invalid
    pub keep_last_valid_partial: bool,
    /// File holding the secret secure values are encrypted under
    pub cipher_key_file: Option<PathBuf>,
    /// Property metadata per plugin id
    pub plugins: HashMap<String, Vec<PropertyMetadata>>,
    /// Package property metadata per repository plugin id
    pub package_plugins: HashMap<String, Vec<PropertyMetadata>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            write_back_upgrades: true,
            keep_last_valid_partial: true,
            cipher_key_file: None,
            plugins: HashMap::new(),
            package_plugins: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_max_document_size(mut self, max: usize) -> Self {
        self.max_document_size = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_write_back_upgrades(mut self, enabled: bool) -> Self {
        self.write_back_upgrades = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_keep_last_valid_partial(mut self, enabled: bool) -> Self {
        self.keep_last_valid_partial = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_cipher_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cipher_key_file = Some(path.into());
        self
    }

    /// Register property metadata for a plugin
    #[must_use]
    pub fn with_plugin(mut self, plugin_id: impl Into<String>, properties: Vec<PropertyMetadata>) -> Self {
        self.plugins.insert(plugin_id.into(), properties);
        self
    }

    /// Parse TOML settings; missing keys take their defaults
    ///
    /// # Errors
    /// Returns [`CoreError::ConfigParse`] for malformed TOML
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read TOML settings from a file
    ///
    /// # Errors
    /// Returns [`CoreError::ConfigIo`] if the file cannot be read, else as
    /// [`EngineConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Returns [`CoreError::ConfigRender`] if the settings cannot be rendered
    pub fn to_toml_string(&self) -> CoreResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loader honouring the size and cache settings
    ///
    /// # Errors
    /// Returns error if the grammar fails to compile
    pub fn loader(&self) -> Result<ConfigLoader, StructuralError> {
        Ok(ConfigLoader::new()?
            .with_max_document_size(self.max_document_size)
            .with_cache_capacity(self.cache_capacity))
    }

    /// Plugin metadata collaborator built from the `plugins` tables
    #[must_use]
    pub fn plugin_metadata(&self) -> StaticPluginMetadata {
        let metadata = StaticPluginMetadata::from_map(self.plugins.clone());
        for (plugin_id, properties) in &self.package_plugins {
            metadata.register_package(plugin_id.clone(), properties.clone());
        }
        metadata
    }

    /// Cipher for secure values
    ///
    /// With a key file, its contents are the secret; a missing file is
    /// created with a fresh random secret. Without one the secret is random
    /// and lives only as long as the process.
    ///
    /// # Errors
    /// Returns [`CoreError::ConfigIo`] if the key file cannot be read or created
    pub fn cipher(&self) -> CoreResult<Blake3Cipher> {
        let Some(path) = &self.cipher_key_file else {
            warn!("no cipher key file configured; secure values will not decrypt after a restart");
            return Ok(Blake3Cipher::from_secret(&rand::random::<[u8; 32]>()));
        };
        let io = |source| CoreError::ConfigIo {
            path: path.clone(),
            source,
        };
        match std::fs::read_to_string(path) {
            Ok(secret) => Ok(Blake3Cipher::from_secret(secret.trim().as_bytes())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let secret = hex::encode(rand::random::<[u8; 32]>());
                std::fs::write(path, &secret).map_err(io)?;
                info!(path = %path.display(), "generated cipher key");
                Ok(Blake3Cipher::from_secret(secret.as_bytes()))
            }
            Err(e) => Err(io(e)),
        }
    }
}
