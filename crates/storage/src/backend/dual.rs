//! Dual-write storage backend.
//!
//! Every write goes to both a primary and a secondary backend, one after the
//! other. The primary is authoritative: its failures are returned, the
//! secondary's are logged and swallowed. Reads prefer the primary and fall
//! back to the secondary for files the primary never received.

use crate::backend::FileInfoStream;
use crate::error::{ErrorKind, Result};
use crate::{BackendHandle, FileInfo, StorageBackend};
use async_trait::async_trait;
use std::path::Path;
use tracing::warn;

#[derive(Clone)]
pub struct DualBackend {
    name: String,
    primary: BackendHandle,
    secondary: BackendHandle,
}
impl DualBackend {
    pub fn new(primary: BackendHandle, secondary: BackendHandle) -> Self {
        let name = format!("{}+{}", primary.name(), secondary.name());
        Self { name, primary, secondary }
    }

    pub fn primary(&self) -> &BackendHandle {
        &self.primary
    }

    pub fn secondary(&self) -> &BackendHandle {
        &self.secondary
    }
}

#[async_trait]
impl StorageBackend for DualBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        self.primary.list_stream(prefix)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.primary.exists(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        match self.primary.read(path).await {
            Err(err) if err.is_not_found() => self.secondary.read(path).await,
            result => result,
        }
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        self.primary.write(path, data).await?;
        if let Err(err) = self.secondary.write(path, data).await {
            warn!(backend = self.secondary.name(), path = %path.display(), error = %err, "Secondary write failed");
        }
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        self.primary.delete(path).await?;
        match self.secondary.delete(path).await {
            Err(err) if !err.is_not_found() => {
                warn!(backend = self.secondary.name(), path = %path.display(), error = %err, "Secondary delete failed");
            },
            _ => {},
        }
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.primary.stat(path).await
    }
}
