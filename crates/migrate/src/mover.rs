//! Batched copying and deletion across storage backends.
//!
//! The full listing is taken up front and cut into fixed-size batches. Each
//! batch runs concurrently and must succeed as a whole; a failed batch is
//! retried, after a cooldown, until it does. Later batches never start while
//! an earlier one is incomplete.

use std::path::Path;
use std::time::Duration;

use exn::ResultExt;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use inkvault_storage::{BackendHandle, FileInfo};
use tracing::{info, instrument, warn};

use crate::error::{ErrorKind, Result};

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);
/// In-flight operations within one batch.
const MAX_BATCH_CONCURRENCY: usize = 32;

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveReport {
    /// Files handled, across all batches.
    pub files: usize,
    /// Size of every batch, in order.
    pub batches: Vec<usize>,
    /// Failed batch attempts that were retried.
    pub retries: usize,
}

/// Every file on `backend`. Local backends walk their directory tree, S3
/// backends page through the bucket listing.
pub async fn list_all(backend: &BackendHandle) -> Result<Vec<FileInfo>> {
    backend.list(None).await.or_raise(|| ErrorKind::Storage)
}

/// Moves or deletes blobs in batches, retrying failed batches in place.
#[derive(Debug, Clone)]
pub struct BatchMover {
    batch_size: usize,
    cooldown: Duration,
    production: bool,
}

impl Default for BatchMover {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_COOLDOWN)
    }
}

impl BatchMover {
    pub fn new(batch_size: usize, cooldown: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            cooldown,
            production: false,
        }
    }

    /// Marks the instance as production, which forbids [`clear_all`](Self::clear_all).
    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// Copies every file of `from` onto `to`, under the same path.
    #[instrument(skip_all, fields(from = from.name(), to = to.name(), batch_size = self.batch_size))]
    pub async fn migrate(&self, from: &BackendHandle, to: &BackendHandle) -> Result<MoveReport> {
        let files = list_all(from).await?;
        info!(files = files.len(), "Migrating blobs");
        let report = self.run(&files, |path| copy_file(from, to, path)).await;
        info!(files = report.files, retries = report.retries, "Migration complete");
        Ok(report)
    }

    /// Deletes every file of `backend`. Refused in production.
    #[instrument(skip_all, fields(backend = backend.name(), batch_size = self.batch_size))]
    pub async fn clear_all(&self, backend: &BackendHandle) -> Result<MoveReport> {
        if self.production {
            exn::bail!(ErrorKind::Blocked("clear a storage backend"));
        }
        let files = list_all(backend).await?;
        warn!(files = files.len(), "Clearing storage backend");
        let report = self
            .run(&files, |path| async move { backend.delete(path).await.or_raise(|| ErrorKind::Storage) })
            .await;
        warn!(files = report.files, "Storage backend cleared");
        Ok(report)
    }

    async fn run<'a, F, Fut>(&self, files: &'a [FileInfo], operation: F) -> MoveReport
    where
        F: Fn(&'a Path) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut report = MoveReport::default();
        let total = files.len().div_ceil(self.batch_size);
        for (index, batch) in files.chunks(self.batch_size).enumerate() {
            loop {
                match run_batch(batch, &operation).await {
                    Ok(()) => break,
                    Err(err) => {
                        report.retries += 1;
                        warn!(
                            batch = index + 1,
                            total,
                            error = %*err,
                            cooldown_secs = self.cooldown.as_secs_f32(),
                            "Batch failed, retrying"
                        );
                        tokio::time::sleep(self.cooldown).await;
                    },
                }
            }
            info!(batch = index + 1, total, files = batch.len(), "Batch done");
            report.files += batch.len();
            report.batches.push(batch.len());
        }
        report
    }
}

/// Runs `operation` on every file of the batch with bounded concurrency,
/// failing on the first error.
async fn run_batch<'a, F, Fut>(batch: &'a [FileInfo], operation: &F) -> Result<()>
where
    F: Fn(&'a Path) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut pending = batch.iter().map(|file| operation(&file.path));
    let mut processing = FuturesUnordered::new();
    processing.extend(pending.by_ref().take(MAX_BATCH_CONCURRENCY));
    while let Some(result) = processing.next().await {
        result?;
        if let Some(next) = pending.next() {
            processing.push(next);
        }
    }
    Ok(())
}

async fn copy_file(from: &BackendHandle, to: &BackendHandle, path: &Path) -> Result<()> {
    let data = from.read(path).await.or_raise(|| ErrorKind::Storage)?;
    to.write(path, &data).await.or_raise(|| ErrorKind::Storage)
}
