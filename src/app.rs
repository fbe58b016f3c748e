//! Building the long-lived components from a [`Config`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use exn::ResultExt;
use inkvault_catalog::{Database, Repository};
use inkvault_config::{Config, StorageMode};
use inkvault_discover::DiscoveryCache;
use inkvault_fetch::{ClientOptions, FetchOptions, HttpClient, HttpRemote, MOBILE_USER_AGENT, Remote, RetryPolicy};
use inkvault_migrate::BatchMover;
use inkvault_orchestrator::Orchestrator;
use inkvault_source::Endpoints;
use inkvault_storage::backend::{DualBackend, LocalBackend};
use inkvault_storage::{BackendHandle, BlobStore};
use tracing::debug;

use crate::error::{ErrorKind, Result};

/// Pause between canvas listing batches, in milliseconds.
const CANVAS_PAUSE_MS: std::ops::RangeInclusive<u64> = 2300..=2700;

/// Everything a download-side command needs, sharing one database pool.
pub struct App {
    pub db: Database,
    pub cache: Arc<DiscoveryCache>,
    pub orchestrator: Arc<Orchestrator>,
}

impl App {
    pub async fn build(config: &Config) -> Result<Self> {
        let blobs = blob_store(config)?;
        let db = connect(config).await?;
        let catalog = Repository::new(&db, blobs);
        let remote = remote(config)?;
        let cache = Arc::new(DiscoveryCache::new(
            Arc::clone(&remote),
            config.enabled_languages(),
            config.discovery_snapshot(),
        ));
        let orchestrator = Orchestrator::new(Arc::clone(&cache), remote, catalog, config.queue_snapshot());
        Ok(Self { db, cache, orchestrator })
    }
}

pub async fn connect(config: &Config) -> Result<Database> {
    let path = config.database_path();
    ensure_parent(&path)?;
    debug!(path = %path.display(), "Opening catalog database");
    Database::connect(&path).await.or_raise(|| ErrorKind::Catalog)
}

/// Catalog over the configured blob backend, for commands that never
/// download anything.
pub async fn catalog(config: &Config) -> Result<(Database, Repository)> {
    let db = connect(config).await?;
    let repo = Repository::new(&db, blob_store(config)?);
    Ok((db, repo))
}

pub fn blob_store(config: &Config) -> Result<BlobStore> {
    let backend: BackendHandle = match config.storage.mode {
        StorageMode::Local => local_backend(config)?,
        StorageMode::S3 => s3_backend(config)?,
        StorageMode::Dual => Arc::new(DualBackend::new(local_backend(config)?, s3_backend(config)?)),
    };
    Ok(BlobStore::new(backend))
}

pub fn local_backend(config: &Config) -> Result<BackendHandle> {
    let root = std::path::absolute(config.images_root()).or_raise(|| ErrorKind::Io)?;
    std::fs::create_dir_all(&root).or_raise(|| ErrorKind::Io)?;
    let backend = LocalBackend::new("local", &root).or_raise(|| ErrorKind::Storage)?;
    Ok(Arc::new(backend))
}

#[cfg(feature = "s3")]
pub fn s3_backend(config: &Config) -> Result<BackendHandle> {
    use inkvault_storage::backend::{S3Backend, S3Options};

    let Some(s3) = &config.storage.s3 else {
        exn::bail!(ErrorKind::Misconfigured("storage.s3 is not set".to_string()));
    };
    let backend = S3Backend::new("s3", S3Options {
        bucket: s3.bucket.clone(),
        prefix: s3.prefix.clone(),
        region: s3.region.clone(),
        endpoint: s3.endpoint.clone(),
        key_id: s3.key_id.clone(),
        key_secret: s3.key_secret.clone(),
        storage_class: s3.storage_class.clone(),
    })
    .or_raise(|| ErrorKind::Storage)?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "s3"))]
pub fn s3_backend(_config: &Config) -> Result<BackendHandle> {
    exn::bail!(ErrorKind::Misconfigured("built without S3 support".to_string()))
}

pub fn remote(config: &Config) -> Result<Arc<dyn Remote>> {
    let defaults = ClientOptions::default();
    let http = HttpClient::new(&ClientOptions {
        user_agent: config.http.user_agent.clone().unwrap_or(defaults.user_agent),
        mobile_user_agent: MOBILE_USER_AGENT.to_string(),
        referer: config.http.referer.clone(),
        timeout: Duration::from_secs(config.http.timeout_secs),
    })
    .or_raise(|| ErrorKind::Fetch)?;
    let delay = Duration::from_secs(config.retry.delay_secs);
    let retry = match config.retry.max_attempts {
        0 => RetryPolicy::unbounded(delay),
        max => RetryPolicy::bounded(max, delay),
    };
    let options = FetchOptions {
        jitter_ms: config.fetch.jitter_min_ms..=config.fetch.jitter_max_ms,
        webp_quality: config.fetch.webp_quality,
        canvas: config.canvas.enabled,
        canvas_max_pages: config.canvas.max_pages,
        canvas_pause_ms: CANVAS_PAUSE_MS,
    };
    Ok(Arc::new(HttpRemote::new(http, Endpoints::default(), retry, options)))
}

pub fn mover(config: &Config) -> BatchMover {
    BatchMover::new(config.migration.batch_size, Duration::from_secs(config.migration.cooldown_secs))
        .production(config.environment.is_production())
}

/// Staging path for database exports.
pub fn export_scratch(config: &Config) -> std::path::PathBuf {
    config.cache_dir().join("export.sqlite")
}

pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Io)?;
    }
    Ok(())
}
