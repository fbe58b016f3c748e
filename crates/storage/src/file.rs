//! File metadata returned by storage backends.

use crate::path::hash_from_path;
use std::path::PathBuf;
use time::OffsetDateTime;

/// File metadata returned by storage backends.
///
/// Used by listing operations (migrations walk every blob of a backend) and
/// by `stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from storage root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: impl Into<OffsetDateTime>) -> Self {
        Self {
            path: path.into(),
            size,
            modified: modified.into(),
        }
    }

    /// The content hash encoded in the file name, if this file sits at a
    /// shard path (`ab/ab12...ef.webp`).
    pub fn content_hash(&self) -> Option<String> {
        hash_from_path(&self.path)
    }
}
