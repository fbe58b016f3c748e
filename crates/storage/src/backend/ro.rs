//! Dry-run decorator.
//!
//! Reads pass through to the wrapped backend. Writes and deletes report
//! success without touching it, and are tallied so a rehearsed migration can
//! say what it would have done.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

use crate::{BackendHandle, StorageBackend, backend::FileInfoStream, error::Result, file::FileInfo};

/// What a [`ReadOnlyBackend`] has swallowed so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Skipped {
    pub writes: usize,
    pub bytes: u64,
    pub deletes: usize,
}

pub struct ReadOnlyBackend {
    inner: BackendHandle,
    writes: AtomicUsize,
    bytes: AtomicU64,
    deletes: AtomicUsize,
}
impl ReadOnlyBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
            bytes: AtomicU64::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn skipped(&self) -> Skipped {
        Skipped {
            writes: self.writes.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl StorageBackend for ReadOnlyBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        self.inner.list_stream(prefix)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
        debug!(backend = self.inner.name(), path = %path.display(), bytes = data.len(), "Dry run, write skipped");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        debug!(backend = self.inner.name(), path = %path.display(), "Dry run, delete skipped");
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        self.inner.stat(path).await
    }
}
