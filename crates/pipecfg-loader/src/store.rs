//! Document Store Adapter
//!
//! The opaque byte store the configuration document lives in. Writes are a
//! whole-document compare-and-swap on the token returned by the last read.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use pipecfg_artifact::{ContentHash, VersionToken};
use tracing::debug;

use crate::error::StoreError;

/// Bytes read from a store with their whole-document token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub bytes: Vec<u8>,
    pub token: VersionToken,
}

impl StoredDocument {
    /// Wrap bytes, computing their token
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        let token = token_of(&bytes);
        Self { bytes, token }
    }
}

/// Whole-document token of raw bytes
#[inline]
#[must_use]
pub fn token_of(bytes: &[u8]) -> VersionToken {
    VersionToken::from_hash(ContentHash::compute(bytes))
}

/// Persistent home of the configuration document
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    /// Current bytes and token
    ///
    /// # Errors
    /// Returns error if nothing is stored or the store cannot be read
    async fn read(&self) -> Result<StoredDocument, StoreError>;

    /// Replace the document if it is still at `expected`
    ///
    /// # Errors
    /// Returns [`StoreError::Conflict`] if the document changed since
    /// `expected` was read
    async fn write(&self, bytes: Vec<u8>, expected: &VersionToken) -> Result<VersionToken, StoreError>;
}

/// Store kept in memory, for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    current: Mutex<Option<StoredDocument>>,
    writes: Mutex<u64>,
}

impl InMemoryDocumentStore {
    /// Empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `bytes`
    #[must_use]
    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            current: Mutex::new(Some(StoredDocument::new(bytes.into()))),
            writes: Mutex::new(0),
        }
    }

    /// Successful writes so far
    #[must_use]
    pub fn write_count(&self) -> u64 {
        *self.writes.lock()
    }

    /// Current bytes, if any
    #[must_use]
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.current.lock().as_ref().map(|d| d.bytes.clone())
    }

    /// Replace the bytes behind the engine's back, as another writer would
    pub fn overwrite(&self, bytes: impl Into<Vec<u8>>) {
        *self.current.lock() = Some(StoredDocument::new(bytes.into()));
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn read(&self) -> Result<StoredDocument, StoreError> {
        self.current
            .lock()
            .clone()
            .ok_or_else(|| StoreError::NotFound(PathBuf::from("<memory>")))
    }

    async fn write(&self, bytes: Vec<u8>, expected: &VersionToken) -> Result<VersionToken, StoreError> {
        let mut current = self.current.lock();
        if let Some(existing) = current.as_ref() {
            existing
                .token
                .check(expected)
                .map_err(|stale| StoreError::Conflict {
                    expected: stale.expected,
                    actual: stale.actual,
                })?;
        }
        let stored = StoredDocument::new(bytes);
        let token = stored.token;
        *current = Some(stored);
        *self.writes.lock() += 1;
        Ok(token)
    }
}

/// Store backed by a single file, replaced atomically on write
#[derive(Debug)]
pub struct FileDocumentStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileDocumentStore {
    /// Store at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Location of the document
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read_existing(&self) -> Result<Option<StoredDocument>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(StoredDocument::new(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io_error(&self.path, e)),
        }
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn read(&self) -> Result<StoredDocument, StoreError> {
        self.read_existing()
            .await?
            .ok_or_else(|| StoreError::NotFound(self.path.clone()))
    }

    async fn write(&self, bytes: Vec<u8>, expected: &VersionToken) -> Result<VersionToken, StoreError> {
        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self.read_existing().await? {
            existing
                .token
                .check(expected)
                .map_err(|stale| StoreError::Conflict {
                    expected: stale.expected,
                    actual: stale.actual,
                })?;
        }

        let staging = self.staging_path();
        tokio::fs::write(&staging, &bytes)
            .await
            .map_err(|e| StoreError::io_error(&staging, e))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| StoreError::io_error(&self.path, e))?;

        let token = token_of(&bytes);
        debug!(path = %self.path.display(), %token, "document written");
        Ok(token)
    }
}
