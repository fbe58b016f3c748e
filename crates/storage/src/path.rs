//! Path validation and blob path conventions.
//!
//! Blob paths are the same on every backend: `<hash[0:2]>/<hash>.<ext>`. Local
//! backends join them onto their root directory, S3 backends use them as keys
//! (optionally under a prefix), so a listing from one backend can be replayed
//! verbatim against another.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Length of a hex-encoded SHA-256 digest.
const HASH_LENGTH: usize = 64;
/// Number of leading hash characters used as the shard directory.
const SHARD_LENGTH: usize = 2;

/// Validates a storage path for security and correctness.
/// Ensures that paths don't escape the storage root (no `..` traversal).
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use inkvault_storage::validate_path;
/// assert!(validate_path("ab/abcdef.webp").is_ok());
/// assert!(validate_path("ab/../cd/cdef.webp").is_ok()); // never leaves the root
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(validate_path("./ab//abcdef.webp/").unwrap(), Path::new("ab/abcdef.webp"));
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
    }
    Ok(components.into_iter().collect())
}

/// Checks that `hash` is a lowercase hex-encoded SHA-256 digest.
pub fn validate_hash(hash: &str) -> Result<&str> {
    let valid = hash.len() == HASH_LENGTH && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    match valid {
        true => Ok(hash),
        false => exn::bail!(ErrorKind::InvalidHash(hash.to_string())),
    }
}

/// Builds the shard path of a blob: `<hash[0:2]>/<hash>.<extension>`.
///
/// ```
/// use std::path::Path;
/// use inkvault_storage::shard_path;
/// let hash = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
/// assert_eq!(
///     shard_path(hash, "webp").unwrap(),
///     Path::new("9f/9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08.webp"),
/// );
/// assert!(shard_path("not-a-hash", "webp").is_err());
/// ```
pub fn shard_path(hash: &str, extension: &str) -> Result<PathBuf> {
    let hash = validate_hash(hash)?;
    Ok(PathBuf::from(&hash[..SHARD_LENGTH]).join(format!("{hash}.{extension}")))
}

/// Recovers the content hash from a shard path, ignoring the extension.
///
/// Returns `None` for anything that doesn't look like a blob: wrong shard
/// directory, malformed hash, or extra nesting.
pub fn hash_from_path(path: impl AsRef<Path>) -> Option<String> {
    let path = path.as_ref();
    let mut components = path.components();
    let shard = components.next()?.as_os_str().to_str()?;
    let file = components.next()?.as_os_str();
    if components.next().is_some() {
        return None;
    }
    let stem = Path::new(file).file_stem()?.to_str()?;
    if validate_hash(stem).is_err() || !stem.starts_with(shard) || shard.len() != SHARD_LENGTH {
        return None;
    }
    Some(stem.to_string())
}
