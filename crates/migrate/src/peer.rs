//! Pulling a whole catalog from another running instance.

use std::path::Path;
use std::time::Duration;

use exn::ResultExt;
use inkvault_catalog::Repository;
use inkvault_storage::BlobStore;
use reqwest::Client;
use tokio::fs;
use tracing::{info, instrument};

use crate::bundle::{MigrationInfo, import_chunk};
use crate::error::{ErrorKind, Result};

const MIGRATION_PATH: &str = "/api/v1/migration";

/// Admin migration endpoints of another instance.
#[derive(Debug, Clone)]
pub struct HttpPeer {
    client: Client,
    base_url: String,
    admin_key: String,
}

impl HttpPeer {
    pub fn new(base_url: impl Into<String>, admin_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .or_raise(|| ErrorKind::Misconfigured("peer HTTP client".to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_key: admin_key.into(),
        })
    }

    async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Vec<u8>> {
        let url = format!("{}{MIGRATION_PATH}/{endpoint}", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.admin_key)
            .query(query)
            .send()
            .await
            .or_raise(|| ErrorKind::Peer(url.clone()))?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Peer(format!("{url} answered {status}")));
        }
        let body = response.bytes().await.or_raise(|| ErrorKind::Peer(url))?;
        Ok(body.to_vec())
    }

    pub async fn info(&self) -> Result<MigrationInfo> {
        let body = self.get("infos", &[]).await?;
        serde_json::from_slice(&body).or_raise(|| ErrorKind::Peer("malformed migration info".to_string()))
    }

    /// Zip archive of the `chunk`-th (1-based) run of blobs.
    pub async fn chunk(&self, chunk: u32) -> Result<Vec<u8>> {
        self.get("images", &[("chunk", chunk.to_string())]).await
    }

    /// Raw SQLite file of the peer's catalog.
    pub async fn database(&self) -> Result<Vec<u8>> {
        self.get("database", &[]).await
    }
}

/// What [`import_from`] brought over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub chunks: u32,
    pub blobs: usize,
}

/// Copies every blob of `peer` into `blobs`, then replaces the database file
/// at `database` with the peer's.
///
/// Nothing may hold `database` open while this runs.
#[instrument(skip_all, fields(peer = %peer.base_url))]
pub async fn import_from(peer: &HttpPeer, blobs: &BlobStore, database: &Path) -> Result<ImportReport> {
    let migration = peer.info().await?;
    info!(images = migration.image_count, chunks = migration.chunk_count, "Importing from peer");
    let mut report = ImportReport::default();
    for chunk in 1..=migration.chunk_count {
        let archive = peer.chunk(chunk).await?;
        report.blobs += import_chunk(blobs, archive).await?;
        report.chunks = chunk;
        info!(chunk, total = migration.chunk_count, "Chunk imported");
    }
    let snapshot = peer.database().await?;
    if let Some(parent) = database.parent() {
        fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Io)?;
    }
    let temp = database.with_extension("sqlite.tmp");
    fs::write(&temp, snapshot).await.or_raise(|| ErrorKind::Io)?;
    // A stale log would be replayed over the new file on next open.
    for suffix in ["-wal", "-shm"] {
        let mut sidecar = database.as_os_str().to_os_string();
        sidecar.push(suffix);
        remove_if_present(Path::new(&sidecar)).await?;
    }
    fs::rename(&temp, database).await.or_raise(|| ErrorKind::Io)?;
    info!(blobs = report.blobs, "Database replaced");
    Ok(report)
}

/// A consistent copy of the catalog database, as served to peers.
///
/// `scratch` is a file path the copy is staged at; it is removed afterwards.
pub async fn export_database(catalog: &Repository, scratch: &Path) -> Result<Vec<u8>> {
    remove_if_present(scratch).await?;
    catalog.export_database(scratch).await.or_raise(|| ErrorKind::Catalog)?;
    let data = fs::read(scratch).await.or_raise(|| ErrorKind::Io)?;
    fs::remove_file(scratch).await.or_raise(|| ErrorKind::Io)?;
    Ok(data)
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err).or_raise(|| ErrorKind::Io),
        _ => Ok(()),
    }
}
