//! Chunked export of the catalog's blobs, for bootstrapping another instance.
//!
//! Image rows are cut into numbered chunks (1-based). A chunk travels as a
//! zip archive holding one `<hash>.webp` entry per image; the receiving side
//! stores every entry and checks that it hashes to its name.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use exn::ResultExt;
use inkvault_catalog::Repository;
use inkvault_storage::{BlobStore, DEFAULT_EXTENSION, content_hash};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ErrorKind, Result};

pub const DEFAULT_CHUNK_SIZE: u32 = 10_000;

/// How much there is to pull from an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationInfo {
    pub image_count: u64,
    #[serde(rename = "chunkNumber")]
    pub chunk_count: u32,
}

pub async fn migration_info(catalog: &Repository, chunk_size: u32) -> Result<MigrationInfo> {
    let image_count = catalog.image_count().await.or_raise(|| ErrorKind::Catalog)?;
    let chunk_count = image_count.div_ceil(u64::from(chunk_size.max(1)));
    Ok(MigrationInfo {
        image_count,
        chunk_count: u32::try_from(chunk_count).or_raise(|| ErrorKind::Misconfigured("chunk size".to_string()))?,
    })
}

/// Zips the blobs of the `chunk`-th run of image rows.
#[instrument(skip(catalog))]
pub async fn export_chunk(catalog: &Repository, chunk: u32, chunk_size: u32) -> Result<Vec<u8>> {
    let hashes = catalog.image_hashes(chunk, chunk_size).await.or_raise(|| ErrorKind::Catalog)?;
    let mut blobs = Vec::with_capacity(hashes.len());
    for hash in hashes {
        let data = catalog.blobs().get(&hash).await.or_raise(|| ErrorKind::Storage)?;
        blobs.push((hash, data));
    }
    debug!(blobs = blobs.len(), "Bundling chunk");
    tokio::task::spawn_blocking(move || zip_blobs(&blobs)).await.or_raise(|| ErrorKind::Bundle)?
}

/// Stores every blob of a chunk archive. Returns how many there were.
#[instrument(skip_all, fields(bytes = archive.len()))]
pub async fn import_chunk(blobs: &BlobStore, archive: Vec<u8>) -> Result<usize> {
    let entries = tokio::task::spawn_blocking(move || unzip_blobs(archive)).await.or_raise(|| ErrorKind::Bundle)??;
    for (expected, data) in &entries {
        let actual = content_hash(data);
        if &actual != expected {
            exn::bail!(ErrorKind::Integrity {
                expected: expected.clone(),
                actual,
            });
        }
        blobs.put(data).await.or_raise(|| ErrorKind::Storage)?;
    }
    Ok(entries.len())
}

fn zip_blobs(blobs: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    // WebP is already compressed.
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (hash, data) in blobs {
        writer.start_file(format!("{hash}.{DEFAULT_EXTENSION}"), options).or_raise(|| ErrorKind::Bundle)?;
        writer.write_all(data).or_raise(|| ErrorKind::Bundle)?;
    }
    Ok(writer.finish().or_raise(|| ErrorKind::Bundle)?.into_inner())
}

fn unzip_blobs(archive: Vec<u8>) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = ZipArchive::new(Cursor::new(archive)).or_raise(|| ErrorKind::Bundle)?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).or_raise(|| ErrorKind::Bundle)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let Some(hash) = Path::new(&name).file_stem().and_then(|stem| stem.to_str()).map(str::to_string) else {
            exn::bail!(ErrorKind::Bundle);
        };
        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
        entry.read_to_end(&mut data).or_raise(|| ErrorKind::Bundle)?;
        entries.push((hash, data));
    }
    Ok(entries)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use inkvault_catalog::Database;
    use inkvault_source::models::{CatalogEntry, Provider, SeriesAssets, Stars};
    use inkvault_storage::backend::MockBackend;
    use std::sync::Arc;

    fn entry() -> CatalogEntry {
        CatalogEntry {
            title: "Lore Olympus".to_string(),
            author: "Rachel Smythe".to_string(),
            link: "https://www.webtoons.com/en/romance/lore-olympus/list?title_no=1320".to_string(),
            thumbnail: "https://cdn.example.com/t.jpg".to_string(),
            stars: Stars { raw: "9.8".to_string(), value: 9.8 },
            genres: vec!["romance".to_string()],
            id: "1320".to_string(),
            language: "en".to_string(),
            provider: Provider::Webtoons,
        }
    }

    /// Chunk archive of `blobs`, named by their hashes.
    pub(crate) fn archive(blobs: &[Vec<u8>]) -> Vec<u8> {
        let entries: Vec<_> = blobs.iter().map(|data| (content_hash(data), data.clone())).collect();
        zip_blobs(&entries).unwrap()
    }

    async fn catalog() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::new(&db, BlobStore::new(Arc::new(MockBackend::default())));
        let assets = SeriesAssets {
            thumbnail: b"thumbnail".to_vec(),
            background_banner: Some(b"background".to_vec()),
            top_banner: b"top".to_vec(),
            mobile_banner: None,
        };
        repo.save_series(&entry(), &assets).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_migration_info() {
        let repo = catalog().await;
        assert_eq!(
            migration_info(&repo, 2).await.unwrap(),
            MigrationInfo { image_count: 3, chunk_count: 2 }
        );
        let json = serde_json::to_value(migration_info(&repo, 10).await.unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"imageCount": 3, "chunkNumber": 1}));
    }

    #[tokio::test]
    async fn test_chunks_round_trip_into_another_store() {
        let repo = catalog().await;
        let target = Arc::new(MockBackend::default());
        let store = BlobStore::new(target.clone());

        let mut imported = 0;
        for chunk in 1..=2 {
            let archive = export_chunk(&repo, chunk, 2).await.unwrap();
            imported += import_chunk(&store, archive).await.unwrap();
        }
        assert_eq!(imported, 3);
        assert_eq!(target.len().await, 3);
        assert_eq!(store.get(&content_hash(b"top")).await.unwrap(), b"top");
        assert!(export_chunk(&repo, 3, 2).await.map(|archive| archive.len()).unwrap() > 0);
    }

    #[tokio::test]
    async fn test_import_rejects_mislabelled_blob() {
        let hash = content_hash(b"expected");
        let archive = zip_blobs(&[(hash.clone(), b"tampered".to_vec())]).unwrap();
        let target = Arc::new(MockBackend::default());
        let err = import_chunk(&BlobStore::new(target.clone()), archive).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Integrity { expected, .. } if *expected == hash));
        assert!(target.is_empty().await);
        assert_eq!(target.write_count(), 0);
    }

    #[tokio::test]
    async fn test_import_stops_at_first_mislabelled_blob() {
        let good = b"good page".to_vec();
        let archive = zip_blobs(&[
            (content_hash(&good), good.clone()),
            (content_hash(b"expected"), b"tampered".to_vec()),
        ])
        .unwrap();
        let target = Arc::new(MockBackend::default());
        let store = BlobStore::new(target.clone());
        assert!(import_chunk(&store, archive).await.is_err());
        assert_eq!(target.len().await, 1);
        assert!(store.exists(&content_hash(&good)).await.unwrap());
        assert!(!store.exists(&content_hash(b"tampered")).await.unwrap());
    }

    #[tokio::test]
    async fn test_import_rejects_garbage() {
        let target = Arc::new(MockBackend::default());
        let err = import_chunk(&BlobStore::new(target), b"not a zip".to_vec()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Bundle));
    }
}
