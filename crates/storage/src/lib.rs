//! Content-addressed blob storage.
//!
//! Every blob is addressed by the SHA-256 digest of its bytes and stored under
//! a two-character shard directory (`ab/abcdef....webp`), whatever backend is
//! configured. The [`BlobStore`] is the only reader/writer of image bytes; the
//! catalog only ever holds hashes.

pub mod backend;
mod blob;
pub mod error;
pub mod file;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::blob::{BlobStore, DEFAULT_EXTENSION, content_hash};
pub use crate::file::FileInfo;
pub use crate::path::{hash_from_path, shard_path, validate as validate_path, validate_hash};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
