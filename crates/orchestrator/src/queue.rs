//! The persisted `{pending, current}` pair.

use std::collections::VecDeque;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;

use exn::ResultExt;
use inkvault_source::models::CatalogEntry;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{ErrorKind, Result};

/// Download queue state, exactly as written to the snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    #[serde(rename = "queuedDownloads", default)]
    pub queued: VecDeque<CatalogEntry>,
    #[serde(rename = "currentDownload", default)]
    pub current: Option<CatalogEntry>,
}

impl QueueState {
    /// Whether the series is pending or current.
    pub fn contains(&self, entry: &CatalogEntry) -> bool {
        self.current.as_ref().is_some_and(|current| current.is_same_series(entry))
            || self.queued.iter().any(|queued| queued.is_same_series(entry))
    }

    /// Appends unless already present; returns whether it was added.
    pub fn push(&mut self, entry: CatalogEntry) -> bool {
        if self.contains(&entry) {
            return false;
        }
        self.queued.push_back(entry);
        true
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queued.is_empty()
    }

    /// Puts an interrupted current series back at the head of the queue.
    pub fn requeue_current(&mut self) {
        if let Some(current) = self.current.take() {
            self.queued.retain(|queued| !queued.is_same_series(&current));
            self.queued.push_front(current);
        }
    }

    pub fn clear(&mut self) {
        self.queued.clear();
        self.current = None;
    }

    /// Current first, then pending.
    pub fn listing(&self) -> Vec<CatalogEntry> {
        self.current.iter().chain(self.queued.iter()).cloned().collect()
    }

    /// Reads a snapshot as written. A missing file is an empty queue.
    pub async fn read(path: &Path) -> Result<Self> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err).or_raise(|| ErrorKind::Snapshot),
        };
        serde_json::from_slice(&data).or_raise(|| ErrorKind::Snapshot)
    }

    /// Reads a snapshot, requeueing whatever was current when it was written.
    pub async fn load(path: &Path) -> Result<Self> {
        let mut state = Self::read(path).await?;
        state.requeue_current();
        Ok(state)
    }

    /// Writes the snapshot to a sibling temp file, then renames it into place.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self).or_raise(|| ErrorKind::Snapshot)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Snapshot)?;
        }
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, data).await.or_raise(|| ErrorKind::Snapshot)?;
        fs::rename(&temp, path).await.or_raise(|| ErrorKind::Snapshot)
    }
}
