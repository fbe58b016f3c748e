use crate::error::Result;
use crate::path::shard_path;
use crate::{BackendHandle, StorageBackend};
use futures::{StreamExt, TryStreamExt, stream};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Every stored image is WebP.
pub const DEFAULT_EXTENSION: &str = "webp";
/// Upper bound on concurrent writes for [`BlobStore::put_many`].
const MAX_PUT_CONCURRENCY: usize = 8;

/// Lowercase hex SHA-256 digest of `data`.
///
/// ```
/// assert_eq!(
///     inkvault_storage::content_hash(b"test"),
///     "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
/// );
/// ```
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Content-addressed store on top of any [`StorageBackend`].
///
/// Putting the same bytes twice yields the same hash and stores them once.
#[derive(Clone)]
pub struct BlobStore {
    backend: BackendHandle,
    extension: String,
}

impl std::fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore")
            .field("backend", &self.backend.name())
            .field("extension", &self.extension)
            .finish()
    }
}

impl BlobStore {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend, extension: DEFAULT_EXTENSION.to_string() }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Relative shard path of a blob on whatever backend is configured.
    pub fn path_for(&self, hash: &str) -> Result<PathBuf> {
        shard_path(hash, &self.extension)
    }

    /// Stores `data` unless a blob with the same digest already exists.
    #[instrument(level = "debug", skip_all, fields(backend = self.backend.name(), bytes = data.len()))]
    pub async fn put(&self, data: &[u8]) -> Result<String> {
        let hash = content_hash(data);
        let path = self.path_for(&hash)?;
        if self.backend.exists(&path).await? {
            debug!(%hash, "Blob already stored");
        } else {
            self.backend.write(&path, data).await?;
        }
        Ok(hash)
    }

    /// Stores several blobs with bounded concurrency; hashes come back in input order.
    pub async fn put_many(&self, blobs: &[Vec<u8>]) -> Result<Vec<String>> {
        let puts: Vec<_> = blobs.iter().map(|data| self.put(data)).collect();
        stream::iter(puts)
            .buffered(MAX_PUT_CONCURRENCY)
            .try_collect()
            .await
    }

    pub async fn get(&self, hash: &str) -> Result<Vec<u8>> {
        self.backend.read(&self.path_for(hash)?).await
    }

    pub async fn exists(&self, hash: &str) -> Result<bool> {
        self.backend.exists(&self.path_for(hash)?).await
    }

    /// Removes a blob. Callers are responsible for knowing nothing references it.
    pub async fn delete(&self, hash: &str) -> Result<()> {
        self.backend.delete(&self.path_for(hash)?).await
    }
}
