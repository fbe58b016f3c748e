use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use exn::ResultExt;
use inkvault_config::Config;
use inkvault_migrate::{HttpPeer, MoveReport};
use inkvault_orchestrator::{DownloadEvent, Enqueued, Orchestrator, QueueState, run_daily};
use inkvault_storage::BackendHandle;
use inkvault_storage::backend::ReadOnlyBackend;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::app::{self, App};
use crate::cli::{Command, QueueAction, Target};
use crate::error::{ErrorKind, Result};

/// Chunks can run to hundreds of megabytes.
const PEER_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub async fn run(config: Config, command: Command) -> Result<()> {
    match command {
        Command::Daemon => daemon(&config).await,
        Command::Enqueue { names, language } => enqueue(&config, &names, &language).await,
        Command::UpdateAll => update_all(&config).await,
        Command::Find { name, language } => find(&config, &name, &language).await,
        Command::Queue { action } => queue(&config, action).await,
        Command::RefreshCache => refresh_cache(&config).await,
        Command::Redownload { episode_id } => redownload(&config, episode_id).await,
        Command::Migrate { to, dry_run } => migrate(&config, to, dry_run.dry_run).await,
        Command::ClearRemote { dry_run } => clear_remote(&config, dry_run.dry_run).await,
        Command::MigrationInfo => migration_info(&config).await,
        Command::ExportChunk { chunk, output } => export_chunk(&config, chunk, &output).await,
        Command::ExportDatabase { output } => export_database(&config, &output).await,
        Command::ImportFrom { url, admin_key } => import_from(&config, &url, &admin_key).await,
    }
}

async fn daemon(config: &Config) -> Result<()> {
    let app = App::build(config).await?;
    let cache = Arc::clone(&app.cache);
    tokio::spawn(async move {
        if let Err(err) = cache.load().await {
            error!(error = %*err, "Series index failed to load; downloads will wait");
        }
    });
    app.orchestrator.restore().await.or_raise(|| ErrorKind::Download)?;
    tokio::spawn(log_events(Arc::clone(&app.orchestrator)));
    if let Some(hour) = config.schedule.daily_update_hour {
        let orchestrator = Arc::clone(&app.orchestrator);
        let shutdown = orchestrator.shutdown_token();
        tokio::spawn(async move {
            if let Err(err) = run_daily(orchestrator, hour, shutdown).await {
                error!(error = %*err, "Daily update stopped");
            }
        });
    }
    info!("Running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.or_raise(|| ErrorKind::Io)?;
    stop(&app).await;
    Ok(())
}

async fn enqueue(config: &Config, names: &[String], language: &str) -> Result<()> {
    let app = App::build(config).await?;
    app.cache.load().await.or_raise(|| ErrorKind::Discovery)?;
    app.orchestrator.restore().await.or_raise(|| ErrorKind::Download)?;
    tokio::spawn(log_events(Arc::clone(&app.orchestrator)));
    for name in names {
        match app.orchestrator.enqueue(name, language).await {
            Ok(Enqueued::Added) => info!(name, language, "Queued"),
            Ok(Enqueued::AlreadyQueued) => info!(name, language, "Already queued"),
            Err(err) => warn!(name, language, error = %*err, "Not queued"),
        }
    }
    until_idle(&app).await
}

async fn update_all(config: &Config) -> Result<()> {
    let app = App::build(config).await?;
    app.cache.load().await.or_raise(|| ErrorKind::Discovery)?;
    app.orchestrator.restore().await.or_raise(|| ErrorKind::Download)?;
    tokio::spawn(log_events(Arc::clone(&app.orchestrator)));
    let added = app.orchestrator.enqueue_all().await.or_raise(|| ErrorKind::Download)?;
    info!(added, "Archived series queued for new episodes");
    until_idle(&app).await
}

async fn find(config: &Config, name: &str, language: &str) -> Result<()> {
    let remote = app::remote(config)?;
    let cache = inkvault_discover::DiscoveryCache::new(remote, config.enabled_languages(), config.discovery_snapshot());
    cache.load().await.or_raise(|| ErrorKind::Discovery)?;
    let entry = cache.find_entry(name, language).await.or_raise(|| ErrorKind::Discovery)?;
    print_json(&entry)
}

/// Works on the snapshot file; a running daemon only picks edits up on restart.
async fn queue(config: &Config, action: QueueAction) -> Result<()> {
    let path = config.queue_snapshot();
    let mut state = QueueState::read(&path).await.or_raise(|| ErrorKind::Download)?;
    match action {
        QueueAction::Show => return print_json(&state.listing()),
        QueueAction::Skip => match state.current.take() {
            Some(skipped) => info!(title = skipped.title, language = skipped.language, "Skipped"),
            None => info!("Nothing is downloading"),
        },
        QueueAction::Clear => {
            info!(pending = state.listing().len(), "Queue cleared");
            state.clear();
        },
    }
    state.save(&path).await.or_raise(|| ErrorKind::Download)
}

async fn refresh_cache(config: &Config) -> Result<()> {
    let app = App::build(config).await?;
    let existed = config.discovery_snapshot().exists();
    app.cache.load().await.or_raise(|| ErrorKind::Discovery)?;
    // Without a snapshot, loading already listed everything.
    if existed {
        app.orchestrator.refresh_cache().await.or_raise(|| ErrorKind::Download)?;
    }
    info!(series = app.cache.len().await, "Series index rebuilt");
    app.db.close().await;
    Ok(())
}

async fn redownload(config: &Config, episode_id: i64) -> Result<()> {
    let app = App::build(config).await?;
    app.cache.load().await.or_raise(|| ErrorKind::Discovery)?;
    let result = app.orchestrator.redownload_episode(episode_id).await.or_raise(|| ErrorKind::Download);
    app.db.close().await;
    result
}

async fn migrate(config: &Config, to: Target, dry_run: bool) -> Result<()> {
    let (from, to) = match to {
        Target::Local => (app::s3_backend(config)?, app::local_backend(config)?),
        Target::S3 => (app::local_backend(config)?, app::s3_backend(config)?),
    };
    let (to, rehearsal) = guard(to, dry_run);
    let report = app::mover(config).migrate(&from, &to).await.or_raise(|| ErrorKind::Migration)?;
    log_report(&report, rehearsal.as_deref());
    Ok(())
}

async fn clear_remote(config: &Config, dry_run: bool) -> Result<()> {
    let (remote, rehearsal) = guard(app::s3_backend(config)?, dry_run);
    let report = app::mover(config).clear_all(&remote).await.or_raise(|| ErrorKind::Migration)?;
    log_report(&report, rehearsal.as_deref());
    Ok(())
}

async fn migration_info(config: &Config) -> Result<()> {
    let (db, catalog) = app::catalog(config).await?;
    let info = inkvault_migrate::migration_info(&catalog, config.migration.chunk_size).await;
    db.close().await;
    print_json(&info.or_raise(|| ErrorKind::Migration)?)
}

async fn export_chunk(config: &Config, chunk: u32, output: &Path) -> Result<()> {
    let (db, catalog) = app::catalog(config).await?;
    let archive = inkvault_migrate::export_chunk(&catalog, chunk, config.migration.chunk_size).await;
    db.close().await;
    write_output(output, &archive.or_raise(|| ErrorKind::Migration)?).await
}

async fn export_database(config: &Config, output: &Path) -> Result<()> {
    let (db, catalog) = app::catalog(config).await?;
    let scratch = app::export_scratch(config);
    app::ensure_parent(&scratch)?;
    let data = inkvault_migrate::export_database(&catalog, &scratch).await;
    db.close().await;
    write_output(output, &data.or_raise(|| ErrorKind::Migration)?).await
}

async fn import_from(config: &Config, url: &str, admin_key: &str) -> Result<()> {
    let peer = HttpPeer::new(url, admin_key, PEER_TIMEOUT).or_raise(|| ErrorKind::Migration)?;
    let blobs = app::blob_store(config)?;
    let report = inkvault_migrate::import_from(&peer, &blobs, &config.database_path())
        .await
        .or_raise(|| ErrorKind::Migration)?;
    info!(chunks = report.chunks, blobs = report.blobs, "Import complete");
    Ok(())
}

/// Waits for the queue to drain, or for Ctrl-C.
async fn until_idle(app: &App) -> Result<()> {
    tokio::select! {
        () = app.orchestrator.wait_idle() => {},
        signal = tokio::signal::ctrl_c() => {
            signal.or_raise(|| ErrorKind::Io)?;
            info!("Interrupted; the queue resumes on next start");
        },
    }
    stop(app).await;
    Ok(())
}

async fn stop(app: &App) {
    app.orchestrator.shutdown();
    app.orchestrator.wait_idle().await;
    app.db.close().await;
    debug!("Stopped");
}

async fn log_events(orchestrator: Arc<Orchestrator>) {
    let mut events = orchestrator.subscribe();
    loop {
        match events.recv().await {
            Ok(DownloadEvent::Started(entry)) => info!(title = entry.title, language = entry.language, "Downloading"),
            Ok(DownloadEvent::Progress(percent)) => info!(percent = format!("{percent:.1}"), "Series progress"),
            Ok(DownloadEvent::EpisodeProgress(percent)) => debug!(percent = format!("{percent:.1}"), "Episode progress"),
            Ok(DownloadEvent::Ended) => info!("Queue empty"),
            Err(RecvError::Lagged(missed)) => debug!(missed, "Progress events dropped"),
            Err(RecvError::Closed) => return,
        }
    }
}

/// On a dry run, wraps `backend` so writes and deletes are only counted.
fn guard(backend: BackendHandle, dry_run: bool) -> (BackendHandle, Option<Arc<ReadOnlyBackend>>) {
    if !dry_run {
        return (backend, None);
    }
    let rehearsal = Arc::new(ReadOnlyBackend::new(backend));
    let handle: BackendHandle = rehearsal.clone();
    (handle, Some(rehearsal))
}

fn log_report(report: &MoveReport, rehearsal: Option<&ReadOnlyBackend>) {
    info!(files = report.files, batches = report.batches.len(), retries = report.retries, "Done");
    if let Some(rehearsal) = rehearsal {
        let skipped = rehearsal.skipped();
        info!(
            writes = skipped.writes,
            bytes = skipped.bytes,
            deletes = skipped.deletes,
            "Dry run, nothing was changed"
        );
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).or_raise(|| ErrorKind::Io)?;
    println!("{json}");
    Ok(())
}

async fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    app::ensure_parent(path)?;
    tokio::fs::write(path, data).await.or_raise(|| ErrorKind::Io)?;
    info!(path = %path.display(), bytes = data.len(), "Written");
    Ok(())
}
