//! The download queue and the single worker draining it.
//!
//! One series is current at a time. Its missing episodes are fetched in
//! ascending order, each committed to the catalog before the next one
//! starts, so an interrupted run resumes from the last committed episode.
//! The `{pending, current}` pair is written to disk after every change; a
//! restart puts whatever was current back at the head of the queue.

use std::path::PathBuf;
use std::sync::{Arc, Mutex as SyncMutex};

use exn::{OptionExt, ResultExt};
use inkvault_catalog::Repository;
use inkvault_discover::DiscoveryCache;
use inkvault_discover::error::{Error as DiscoverError, ErrorKind as DiscoverErrorKind};
use inkvault_fetch::{EpisodeProgress, ProgressSink, Remote, no_progress};
use inkvault_source::models::{CatalogEntry, Episode, EpisodeData};
use tokio::sync::{Mutex, broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::events::DownloadEvent;
use crate::queue::QueueState;

const EVENT_CAPACITY: usize = 256;

/// Outcome of [`Orchestrator::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Added,
    /// Already pending or current; nothing changed.
    AlreadyQueued,
}

fn discover_error(err: DiscoverError) -> Error {
    let kind = match &*err {
        DiscoverErrorKind::NotReady => ErrorKind::CacheNotReady,
        DiscoverErrorKind::NotFound(name) => ErrorKind::NotFound(name.clone()),
        DiscoverErrorKind::Ambiguous { query, matches } => ErrorKind::Ambiguous {
            query: query.clone(),
            matches: *matches,
        },
        _ => ErrorKind::Discovery,
    };
    err.raise(kind)
}

fn catalog_error(err: inkvault_catalog::error::Error) -> Error {
    let kind = match err.is_not_found() {
        true => ErrorKind::NotFound((*err).to_string()),
        false => ErrorKind::Catalog,
    };
    err.raise(kind)
}

/// Durable download queue over a [`Remote`], a [`DiscoveryCache`] and the
/// catalog.
///
/// Always used behind an [`Arc`]: enqueueing starts a background drain task
/// that holds its own reference.
pub struct Orchestrator {
    cache: Arc<DiscoveryCache>,
    remote: Arc<dyn Remote>,
    catalog: Repository,
    snapshot: PathBuf,
    state: Mutex<QueueState>,
    events: broadcast::Sender<DownloadEvent>,
    draining: watch::Sender<bool>,
    /// Cancelled to skip the current series; replaced for every new one.
    current_token: SyncMutex<CancellationToken>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<DiscoveryCache>,
        remote: Arc<dyn Remote>,
        catalog: Repository,
        snapshot: impl Into<PathBuf>,
    ) -> Arc<Self> {
        let shutdown = CancellationToken::new();
        Arc::new(Self {
            cache,
            remote,
            catalog,
            snapshot: snapshot.into(),
            state: Mutex::new(QueueState::default()),
            events: broadcast::Sender::new(EVENT_CAPACITY),
            draining: watch::Sender::new(false),
            current_token: SyncMutex::new(shutdown.child_token()),
            shutdown,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.events.subscribe()
    }

    pub fn catalog(&self) -> &Repository {
        &self.catalog
    }

    pub fn cache(&self) -> &Arc<DiscoveryCache> {
        &self.cache
    }

    /// Stops the worker after its current page; the snapshot still names
    /// the interrupted series, so the next [`restore`](Self::restore)
    /// resumes it.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Reloads the persisted queue and starts draining it. Call once at
    /// startup; the worker waits for the discovery cache before fetching.
    #[instrument(skip_all, fields(snapshot = %self.snapshot.display()))]
    pub async fn restore(self: &Arc<Self>) -> Result<()> {
        let restored = QueueState::load(&self.snapshot).await?;
        let pending = restored.queued.len();
        {
            let mut state = self.state.lock().await;
            *state = restored;
            state.save(&self.snapshot).await?;
        }
        if pending > 0 {
            info!(pending, "Restored download queue");
            self.start_draining();
        }
        Ok(())
    }

    /// Resolves `name` against the discovery cache and appends the series.
    #[instrument(skip(self))]
    pub async fn enqueue(self: &Arc<Self>, name: &str, language: &str) -> Result<Enqueued> {
        let entry = self.cache.find_entry(name, language).await.map_err(discover_error)?;
        let added = {
            let mut state = self.state.lock().await;
            let added = state.push(entry);
            if added {
                state.save(&self.snapshot).await?;
            }
            added
        };
        self.start_draining();
        Ok(match added {
            true => Enqueued::Added,
            false => Enqueued::AlreadyQueued,
        })
    }

    /// Enqueues every series already in the catalog, to pick up new
    /// episodes. Series the discovery cache no longer lists are skipped.
    #[instrument(skip(self))]
    pub async fn enqueue_all(self: &Arc<Self>) -> Result<usize> {
        if !self.cache.is_ready() {
            exn::bail!(ErrorKind::CacheNotReady);
        }
        let keys = self.catalog.list_series_keys().await.map_err(catalog_error)?;
        let mut entries = Vec::with_capacity(keys.len());
        for (title, language) in keys {
            match self.cache.find_entry(&title, &language).await {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(title, language, error = %*err, "Series no longer listed, not updating it"),
            }
        }
        let added = {
            let mut state = self.state.lock().await;
            let added = entries.into_iter().filter(|entry| state.push(entry.clone())).count();
            state.save(&self.snapshot).await?;
            added
        };
        info!(added, "Queued catalog update");
        self.start_draining();
        Ok(added)
    }

    /// The series being downloaded right now.
    pub async fn current(&self) -> Result<CatalogEntry> {
        let state = self.state.lock().await;
        state.current.clone().ok_or_raise(|| ErrorKind::NotFound("current download".to_string()))
    }

    /// Current series first, then everything pending.
    pub async fn queue(&self) -> Result<Vec<CatalogEntry>> {
        let state = self.state.lock().await;
        if state.is_idle() {
            exn::bail!(ErrorKind::NotFound("download queue".to_string()));
        }
        Ok(state.listing())
    }

    /// Abandons the current series. An episode already being fetched is
    /// not interrupted, its result is just not saved.
    #[instrument(skip(self))]
    pub async fn skip_current(&self) -> Result<Option<CatalogEntry>> {
        let mut state = self.state.lock().await;
        let skipped = state.current.take();
        self.cancel_current();
        state.save(&self.snapshot).await?;
        if let Some(entry) = &skipped {
            info!(title = entry.title, "Skipped current download");
        }
        Ok(skipped)
    }

    /// Empties the queue and abandons the current series.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.clear();
        self.cancel_current();
        state.save(&self.snapshot).await?;
        info!("Cleared download queue");
        Ok(())
    }

    /// Drops the discovery cache and lists everything again. Rejected
    /// while a load is already running.
    #[instrument(skip(self))]
    pub async fn refresh_cache(&self) -> Result<()> {
        if !self.cache.is_ready() {
            exn::bail!(ErrorKind::CacheNotReady);
        }
        self.cache.clear().await.map_err(discover_error)?;
        self.cache.load().await.map_err(discover_error)
    }

    /// Fetches one stored episode again and replaces its pages.
    #[instrument(skip(self))]
    pub async fn redownload_episode(&self, episode_id: i64) -> Result<()> {
        let record = self.catalog.get_episode(episode_id).await.map_err(catalog_error)?;
        let series = self.catalog.get_series(record.series_id).await.map_err(catalog_error)?;
        let entry = self.cache.find_entry(&series.title, &series.language).await.map_err(discover_error)?;
        let episodes = self.remote.episodes(&entry).await.or_raise(|| ErrorKind::Remote)?;
        let episode = episodes
            .into_iter()
            .find(|episode| episode.number == record.number)
            .ok_or_raise(|| ErrorKind::NotFound(format!("episode {} of {}", record.number, series.title)))?;
        let links = self.remote.image_links(&entry, &episode).await.or_raise(|| ErrorKind::Remote)?;
        let data = self.remote.episode_data(&episode, &links, no_progress()).await.or_raise(|| ErrorKind::Remote)?;
        self.catalog.save_episode(&entry, &episode, &data, true).await.map_err(catalog_error)?;
        info!(title = series.title, number = record.number, "Episode downloaded again");
        Ok(())
    }

    /// Resolves once the worker has nothing left to do.
    pub async fn wait_idle(&self) {
        let mut draining = self.draining.subscribe();
        _ = draining.wait_for(|draining| !*draining).await;
    }

    fn cancel_current(&self) {
        if let Ok(token) = self.current_token.lock() {
            token.cancel();
        }
    }

    fn fresh_token(&self) -> CancellationToken {
        let token = self.shutdown.child_token();
        if let Ok(mut current) = self.current_token.lock() {
            *current = token.clone();
        }
        token
    }

    fn emit(&self, event: DownloadEvent) {
        // Nobody listening is fine.
        _ = self.events.send(event);
    }

    async fn save_logged(&self, state: &QueueState) {
        if let Err(err) = state.save(&self.snapshot).await {
            error!(error = %*err, "Failed to write queue snapshot");
        }
    }

    fn start_draining(self: &Arc<Self>) {
        let started = self.draining.send_if_modified(|draining| match *draining {
            true => false,
            false => {
                *draining = true;
                true
            },
        });
        if started {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.drain().await });
        }
    }

    async fn drain(&self) {
        tokio::select! {
            () = self.cache.wait_ready() => {},
            () = self.shutdown.cancelled() => {},
        }
        loop {
            if self.shutdown.is_cancelled() {
                info!("Download worker stopped");
                self.draining.send_replace(false);
                return;
            }
            let (entry, token) = {
                let mut state = self.state.lock().await;
                let Some(entry) = state.queued.pop_front() else {
                    state.current = None;
                    self.save_logged(&state).await;
                    self.draining.send_replace(false);
                    self.emit(DownloadEvent::Ended);
                    debug!("Download queue drained");
                    return;
                };
                state.current = Some(entry.clone());
                self.save_logged(&state).await;
                (entry, self.fresh_token())
            };
            self.emit(DownloadEvent::Started(entry.clone()));
            let span = info_span!("download", title = entry.title, language = entry.language);
            if let Err(err) = self.download_series(&entry, &token).instrument(span).await {
                error!(title = entry.title, error = %*err, "Download failed, moving on");
            }
            // On shutdown the series stays current so the next start resumes it.
            if !self.shutdown.is_cancelled() {
                self.state.lock().await.current = None;
            }
        }
    }

    async fn download_series(&self, entry: &CatalogEntry, token: &CancellationToken) -> Result<()> {
        if !self.catalog.is_series_saved(&entry.title, &entry.language).await.map_err(catalog_error)? {
            let info = self.remote.series_info(entry).await.or_raise(|| ErrorKind::Remote)?;
            let assets = self.remote.series_assets(&info).await.or_raise(|| ErrorKind::Remote)?;
            self.catalog.save_series(&info.entry, &assets).await.map_err(catalog_error)?;
            info!("Series saved");
        }
        let last = self.catalog.last_saved_episode_number(&entry.title, &entry.language).await.map_err(catalog_error)?;
        let episodes = self.remote.episodes(entry).await.or_raise(|| ErrorKind::Remote)?;
        let total = episodes.len();
        info!(last, total, "Fetching missing episodes");
        for (index, episode) in episodes.iter().enumerate().filter(|(_, episode)| episode.number > last) {
            if token.is_cancelled() {
                info!("Download abandoned");
                return Ok(());
            }
            self.emit(DownloadEvent::Progress(index as f64 / total as f64 * 100.0));
            let data = self.fetch_episode(entry, episode).await?;
            if token.is_cancelled() {
                info!(number = episode.number, "Download abandoned, discarding episode");
                return Ok(());
            }
            self.catalog.save_episode(entry, episode, &data, false).await.map_err(catalog_error)?;
            debug!(number = episode.number, pages = data.images.len(), "Episode saved");
        }
        Ok(())
    }

    async fn fetch_episode(&self, entry: &CatalogEntry, episode: &Episode) -> Result<EpisodeData> {
        let links = self.remote.image_links(entry, episode).await.or_raise(|| ErrorKind::Remote)?;
        let events = self.events.clone();
        let sink: ProgressSink = Arc::new(move |progress: EpisodeProgress| {
            _ = events.send(DownloadEvent::EpisodeProgress(progress.percent()));
        });
        self.remote.episode_data(episode, &links, sink).await.or_raise(|| ErrorKind::Remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::tests::entry;
    use async_trait::async_trait;
    use inkvault_catalog::Database;
    use inkvault_fetch::error::{ErrorKind as FetchErrorKind, Result as FetchResult};
    use inkvault_source::models::{SeriesAssets, SeriesInfo};
    use inkvault_storage::BlobStore;
    use inkvault_storage::backend::MockBackend;
    use std::collections::{HashMap, HashSet};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Remote serving a fixed listing. `episodes()` waits on `gate`, which
    /// lets a test hold the worker on the current series.
    struct FakeRemote {
        listing: Vec<CatalogEntry>,
        episode_counts: SyncMutex<HashMap<String, u32>>,
        failing: HashSet<String>,
        gate: Semaphore,
        fetched: SyncMutex<Vec<String>>,
        version: AtomicUsize,
    }

    impl FakeRemote {
        fn new(gated: bool) -> Arc<Self> {
            Arc::new(Self {
                listing: vec![entry("Tower of God", "en"), entry("Lore Olympus", "en")],
                episode_counts: SyncMutex::new(HashMap::new()),
                failing: HashSet::new(),
                gate: Semaphore::new(if gated { 0 } else { Semaphore::MAX_PERMITS }),
                fetched: SyncMutex::new(Vec::new()),
                version: AtomicUsize::new(1),
            })
        }

        fn open(&self) {
            self.gate.add_permits(Semaphore::MAX_PERMITS);
        }

        fn set_episodes(&self, title: &str, count: u32) {
            self.episode_counts.lock().unwrap().insert(title.to_string(), count);
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Remote for FakeRemote {
        async fn listing(&self, _: &str) -> FetchResult<Vec<CatalogEntry>> {
            Ok(self.listing.clone())
        }

        async fn series_info(&self, entry: &CatalogEntry) -> FetchResult<SeriesInfo> {
            if self.failing.contains(&entry.title) {
                exn::bail!(FetchErrorKind::Parse);
            }
            Ok(SeriesInfo {
                entry: entry.clone(),
                episode_count: 0,
                banners: Default::default(),
            })
        }

        async fn episodes(&self, entry: &CatalogEntry) -> FetchResult<Vec<Episode>> {
            drop(self.gate.acquire().await.unwrap());
            let count = self.episode_counts.lock().unwrap().get(&entry.title).copied().unwrap_or(3);
            Ok((1..=count)
                .map(|number| Episode {
                    title: format!("Episode {number}"),
                    number,
                    link: format!("{}/{number}", entry.title),
                    thumbnail: String::new(),
                })
                .collect())
        }

        async fn image_links(&self, _: &CatalogEntry, episode: &Episode) -> FetchResult<Vec<String>> {
            Ok(vec![format!("{}/0", episode.link), format!("{}/1", episode.link)])
        }

        async fn series_assets(&self, info: &SeriesInfo) -> FetchResult<SeriesAssets> {
            Ok(SeriesAssets {
                thumbnail: format!("{}-thumb", info.entry.title).into_bytes(),
                top_banner: b"top".to_vec(),
                ..SeriesAssets::default()
            })
        }

        async fn episode_data(&self, episode: &Episode, links: &[String], progress: ProgressSink) -> FetchResult<EpisodeData> {
            self.fetched.lock().unwrap().push(episode.link.clone());
            let version = self.version.load(Ordering::SeqCst);
            progress(EpisodeProgress {
                downloaded: links.len(),
                total: links.len(),
                elapsed: Duration::from_millis(10),
            });
            Ok(EpisodeData {
                thumbnail: format!("{}-thumb", episode.link).into_bytes(),
                images: links.iter().map(|link| format!("{link}@v{version}").into_bytes()).collect(),
            })
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        snapshot: PathBuf,
        remote: Arc<FakeRemote>,
        orchestrator: Arc<Orchestrator>,
    }

    impl Harness {
        async fn new(remote: Arc<FakeRemote>, load_cache: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let snapshot = dir.path().join(".cache/download_queue.json");
            let cache = Arc::new(DiscoveryCache::new(
                remote.clone(),
                vec!["en".to_string()],
                dir.path().join(".cache/webtoons.json"),
            ));
            if load_cache {
                cache.load().await.unwrap();
            }
            let db = Database::connect_in_memory().await.unwrap();
            let catalog = Repository::new(&db, BlobStore::new(Arc::new(MockBackend::default())));
            let orchestrator = Orchestrator::new(cache, remote.clone(), catalog, snapshot.clone());
            Self {
                _dir: dir,
                snapshot,
                remote,
                orchestrator,
            }
        }

        async fn last_saved(&self, title: &str) -> u32 {
            self.orchestrator.catalog().last_saved_episode_number(title, "en").await.unwrap()
        }

        fn snapshot(&self) -> serde_json::Value {
            serde_json::from_slice(&std::fs::read(&self.snapshot).unwrap()).unwrap()
        }
    }

    /// Collects events up to and including the first one matching `stop`.
    async fn until(
        events: &mut broadcast::Receiver<DownloadEvent>,
        stop: impl Fn(&DownloadEvent) -> bool,
    ) -> Vec<DownloadEvent> {
        let collect = async {
            let mut seen = Vec::new();
            loop {
                let event = events.recv().await.unwrap();
                let done = stop(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), collect).await.unwrap()
    }

    fn is_ended(event: &DownloadEvent) -> bool {
        matches!(event, DownloadEvent::Ended)
    }

    fn started(events: &[DownloadEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|event| match event {
                DownloadEvent::Started(entry) => Some(entry.title.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_enqueue_requires_loaded_cache() {
        let harness = Harness::new(FakeRemote::new(false), false).await;
        let err = harness.orchestrator.enqueue("Tower of God", "en").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::CacheNotReady));
        assert!(err.is_retryable());
        let err = harness.orchestrator.enqueue_all().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::CacheNotReady));
    }

    #[tokio::test]
    async fn test_enqueue_unknown_series() {
        let harness = Harness::new(FakeRemote::new(false), true).await;
        let err = harness.orchestrator.enqueue("Solo Leveling", "en").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_drains_series_in_episode_order() {
        let harness = Harness::new(FakeRemote::new(false), true).await;
        let mut events = harness.orchestrator.subscribe();
        assert_eq!(harness.orchestrator.enqueue("tower of god", "en").await.unwrap(), Enqueued::Added);
        let seen = until(&mut events, is_ended).await;

        assert_eq!(started(&seen), ["Tower of God"]);
        let progress: Vec<f64> = seen
            .iter()
            .filter_map(|event| match event {
                DownloadEvent::Progress(percent) => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(progress, [0.0, 1.0 / 3.0 * 100.0, 2.0 / 3.0 * 100.0]);
        assert!(seen.contains(&DownloadEvent::EpisodeProgress(100.0)));
        assert_eq!(harness.remote.fetched(), ["Tower of God/1", "Tower of God/2", "Tower of God/3"]);
        assert_eq!(harness.last_saved("Tower of God").await, 3);

        harness.orchestrator.wait_idle().await;
        let err = harness.orchestrator.queue().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert!(harness.orchestrator.current().await.is_err());
        let snapshot = harness.snapshot();
        assert_eq!(snapshot["queuedDownloads"], serde_json::json!([]));
        assert!(snapshot["currentDownload"].is_null());
    }

    #[tokio::test]
    async fn test_resumes_after_last_saved_episode() {
        let harness = Harness::new(FakeRemote::new(false), true).await;
        harness.remote.set_episodes("Tower of God", 2);
        harness.orchestrator.enqueue("Tower of God", "en").await.unwrap();
        harness.orchestrator.wait_idle().await;
        assert_eq!(harness.last_saved("Tower of God").await, 2);

        harness.remote.set_episodes("Tower of God", 4);
        let mut events = harness.orchestrator.subscribe();
        harness.orchestrator.enqueue("Tower of God", "en").await.unwrap();
        until(&mut events, is_ended).await;
        assert_eq!(
            harness.remote.fetched(),
            ["Tower of God/1", "Tower of God/2", "Tower of God/3", "Tower of God/4"]
        );
        assert_eq!(harness.last_saved("Tower of God").await, 4);
    }

    #[tokio::test]
    async fn test_enqueue_deduplicates_pending_and_current() {
        let harness = Harness::new(FakeRemote::new(true), true).await;
        let orchestrator = &harness.orchestrator;
        let mut events = orchestrator.subscribe();
        orchestrator.enqueue("Tower of God", "en").await.unwrap();
        until(&mut events, |event| matches!(event, DownloadEvent::Started(_))).await;

        assert_eq!(orchestrator.enqueue("Tower of God", "en").await.unwrap(), Enqueued::AlreadyQueued);
        assert_eq!(orchestrator.enqueue("Lore Olympus", "en").await.unwrap(), Enqueued::Added);
        assert_eq!(orchestrator.enqueue("Lore Olympus", "en").await.unwrap(), Enqueued::AlreadyQueued);
        assert_eq!(orchestrator.current().await.unwrap().title, "Tower of God");
        let titles: Vec<_> = orchestrator.queue().await.unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, ["Tower of God", "Lore Olympus"]);
        assert_eq!(harness.snapshot()["currentDownload"]["title"], "Tower of God");

        harness.remote.open();
        let seen = until(&mut events, is_ended).await;
        assert_eq!(started(&seen), ["Lore Olympus"]);
        assert_eq!(harness.last_saved("Tower of God").await, 3);
        assert_eq!(harness.last_saved("Lore Olympus").await, 3);
    }

    #[tokio::test]
    async fn test_skip_current_moves_on() {
        let harness = Harness::new(FakeRemote::new(true), true).await;
        let orchestrator = &harness.orchestrator;
        let mut events = orchestrator.subscribe();
        orchestrator.enqueue("Tower of God", "en").await.unwrap();
        orchestrator.enqueue("Lore Olympus", "en").await.unwrap();
        until(&mut events, |event| matches!(event, DownloadEvent::Started(_))).await;

        let skipped = orchestrator.skip_current().await.unwrap().unwrap();
        assert_eq!(skipped.title, "Tower of God");
        assert!(harness.snapshot()["currentDownload"].is_null());

        harness.remote.open();
        let seen = until(&mut events, is_ended).await;
        assert_eq!(started(&seen), ["Lore Olympus"]);
        assert_eq!(harness.last_saved("Tower of God").await, 0);
        assert_eq!(harness.last_saved("Lore Olympus").await, 3);
        assert!(harness.remote.fetched().iter().all(|link| link.starts_with("Lore Olympus")));
    }

    #[tokio::test]
    async fn test_clear_all_drops_everything() {
        let harness = Harness::new(FakeRemote::new(true), true).await;
        let orchestrator = &harness.orchestrator;
        let mut events = orchestrator.subscribe();
        orchestrator.enqueue("Tower of God", "en").await.unwrap();
        orchestrator.enqueue("Lore Olympus", "en").await.unwrap();
        until(&mut events, |event| matches!(event, DownloadEvent::Started(_))).await;

        orchestrator.clear_all().await.unwrap();
        assert!(orchestrator.queue().await.is_err());
        harness.remote.open();
        until(&mut events, is_ended).await;
        assert!(harness.remote.fetched().is_empty());
        assert_eq!(harness.snapshot()["queuedDownloads"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_restore_requeues_interrupted_series_first() {
        let harness = Harness::new(FakeRemote::new(false), false).await;
        let interrupted = QueueState {
            queued: [entry("Lore Olympus", "en")].into(),
            current: Some(entry("Tower of God", "en")),
        };
        interrupted.save(&harness.snapshot).await.unwrap();

        let orchestrator = &harness.orchestrator;
        let mut events = orchestrator.subscribe();
        orchestrator.restore().await.unwrap();
        let titles: Vec<_> = orchestrator.queue().await.unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, ["Tower of God", "Lore Olympus"]);
        assert!(harness.snapshot()["currentDownload"].is_null());

        // The worker holds off until the series index is loaded.
        orchestrator.cache().load().await.unwrap();
        let seen = until(&mut events, is_ended).await;
        assert_eq!(started(&seen), ["Tower of God", "Lore Olympus"]);
    }

    #[tokio::test]
    async fn test_failed_series_does_not_stall_queue() {
        let remote = Arc::new(FakeRemote {
            failing: HashSet::from(["Tower of God".to_string()]),
            ..Arc::into_inner(FakeRemote::new(false)).unwrap()
        });
        let harness = Harness::new(remote, true).await;
        let mut events = harness.orchestrator.subscribe();
        harness.orchestrator.enqueue("Tower of God", "en").await.unwrap();
        harness.orchestrator.enqueue("Lore Olympus", "en").await.unwrap();
        let seen = until(&mut events, is_ended).await;
        assert_eq!(started(&seen).last(), Some(&"Lore Olympus"));
        assert!(!harness.orchestrator.catalog().is_series_saved("Tower of God", "en").await.unwrap());
        assert_eq!(harness.last_saved("Lore Olympus").await, 3);
    }

    #[tokio::test]
    async fn test_enqueue_all_skips_unlisted_series() {
        let harness = Harness::new(FakeRemote::new(false), true).await;
        let orchestrator = &harness.orchestrator;
        let assets = SeriesAssets {
            thumbnail: b"t".to_vec(),
            top_banner: b"b".to_vec(),
            ..SeriesAssets::default()
        };
        let catalog = orchestrator.catalog();
        catalog.save_series(&entry("Tower of God", "en"), &assets).await.unwrap();
        catalog.save_series(&entry("Delisted", "en"), &assets).await.unwrap();

        let mut events = orchestrator.subscribe();
        assert_eq!(orchestrator.enqueue_all().await.unwrap(), 1);
        let seen = until(&mut events, is_ended).await;
        assert_eq!(started(&seen), ["Tower of God"]);
        assert_eq!(harness.last_saved("Tower of God").await, 3);
    }

    #[tokio::test]
    async fn test_redownload_episode_replaces_pages() {
        let harness = Harness::new(FakeRemote::new(false), true).await;
        let orchestrator = &harness.orchestrator;
        harness.remote.set_episodes("Tower of God", 2);
        orchestrator.enqueue("Tower of God", "en").await.unwrap();
        orchestrator.wait_idle().await;

        let catalog = orchestrator.catalog();
        let series = catalog.list_series().await.unwrap().remove(0);
        let episode = catalog.list_episodes(series.id, 1).await.unwrap().items.remove(1);
        assert_eq!(episode.number, 2);
        let before = catalog.list_episode_images(episode.id, 1).await.unwrap().items;

        harness.remote.version.store(2, Ordering::SeqCst);
        orchestrator.redownload_episode(episode.id).await.unwrap();
        let replaced = catalog.list_episodes(series.id, 1).await.unwrap().items.remove(1);
        assert_eq!(replaced.number, 2);
        let after = catalog.list_episode_images(replaced.id, 1).await.unwrap().items;
        assert_eq!(after.len(), 2);
        assert_ne!(before, after);
        assert_eq!(harness.remote.fetched().last().map(String::as_str), Some("Tower of God/2"));
    }

    #[tokio::test]
    async fn test_redownload_unknown_episode() {
        let harness = Harness::new(FakeRemote::new(false), true).await;
        let err = harness.orchestrator.redownload_episode(42).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_refresh_cache_requires_loaded_cache() {
        let harness = Harness::new(FakeRemote::new(false), false).await;
        let err = harness.orchestrator.refresh_cache().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::CacheNotReady));

        harness.orchestrator.cache().load().await.unwrap();
        harness.orchestrator.refresh_cache().await.unwrap();
        assert!(harness.orchestrator.cache().is_ready());
        assert_eq!(harness.orchestrator.cache().len().await, 2);
    }

    #[tokio::test]
    async fn test_shutdown_leaves_current_in_snapshot() {
        let harness = Harness::new(FakeRemote::new(true), true).await;
        let orchestrator = &harness.orchestrator;
        let mut events = orchestrator.subscribe();
        orchestrator.enqueue("Tower of God", "en").await.unwrap();
        until(&mut events, |event| matches!(event, DownloadEvent::Started(_))).await;

        orchestrator.shutdown();
        harness.remote.open();
        orchestrator.wait_idle().await;
        assert_eq!(harness.last_saved("Tower of God").await, 0);
        assert_eq!(harness.snapshot()["currentDownload"]["title"], "Tower of God");

        let restored = QueueState::load(Path::new(&harness.snapshot)).await.unwrap();
        assert_eq!(restored.queued.front().map(|e| e.title.as_str()), Some("Tower of God"));
    }
}
