use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use exn::ResultExt;
use inkvault_fetch::Remote;
use inkvault_source::error::ErrorKind as ResolveErrorKind;
use inkvault_source::models::CatalogEntry;
use tokio::fs;
use tokio::sync::{RwLock, watch};
use tracing::{info, instrument, warn};

use crate::error::{ErrorKind, Result};

/// Series per language, as persisted in the snapshot.
pub type Index = BTreeMap<String, Vec<CatalogEntry>>;

/// Folds entries listed under several genres into one entry per title,
/// keeping first-seen order and the union of their genres.
pub fn merge(entries: impl IntoIterator<Item = CatalogEntry>) -> Vec<CatalogEntry> {
    let mut merged: Vec<CatalogEntry> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for entry in entries {
        match positions.get(&entry.title) {
            Some(&position) => merged[position].merge_genres(entry.genres),
            None => {
                positions.insert(entry.title.clone(), merged.len());
                merged.push(entry);
            },
        }
    }
    merged
}

/// Every series the remote lists, per language, with name resolution.
///
/// Reads fail with [`NotReady`](ErrorKind::NotReady) until the first
/// [`load`](Self::load) or [`refresh`](Self::refresh) completes. A refresh
/// of an already loaded cache keeps serving the previous index meanwhile.
pub struct DiscoveryCache {
    remote: Arc<dyn Remote>,
    languages: Vec<String>,
    snapshot: PathBuf,
    index: RwLock<Index>,
    ready: watch::Sender<bool>,
}

impl DiscoveryCache {
    pub fn new(remote: Arc<dyn Remote>, languages: Vec<String>, snapshot: impl Into<PathBuf>) -> Self {
        Self {
            remote,
            languages,
            snapshot: snapshot.into(),
            index: RwLock::new(Index::new()),
            ready: watch::Sender::new(false),
        }
    }

    /// Languages this cache was configured with.
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Resolves once the cache is ready.
    pub async fn wait_ready(&self) {
        let mut ready = self.ready.subscribe();
        // The sender lives in `self`, so it cannot be dropped while we wait.
        _ = ready.wait_for(|ready| *ready).await;
    }

    /// Loads the snapshot, or lists everything from the remote if there is
    /// none (or it is unreadable).
    #[instrument(skip(self), fields(snapshot = %self.snapshot.display()))]
    pub async fn load(&self) -> Result<()> {
        match self.read_snapshot().await {
            Ok(Some(index)) => {
                let count: usize = index.values().map(Vec::len).sum();
                info!(count, "Loaded series index from snapshot");
                *self.index.write().await = index;
                self.ready.send_replace(true);
                Ok(())
            },
            Ok(None) => self.refresh(&self.languages).await,
            Err(err) => {
                warn!(error = %*err, "Unreadable snapshot, rebuilding from the remote");
                self.refresh(&self.languages).await
            },
        }
    }

    /// Lists `languages` from the remote, replaces their part of the index
    /// and rewrites the snapshot.
    ///
    /// Transient failures are retried by the remote's own policy, so this
    /// only fails on markup the parsers do not understand, or when a bounded
    /// policy gives up.
    #[instrument(skip(self))]
    pub async fn refresh(&self, languages: &[String]) -> Result<()> {
        let mut fresh = Index::new();
        for language in languages {
            let entries = self.remote.listing(language).await.or_raise(|| ErrorKind::Remote)?;
            let entries = merge(entries);
            info!(language, count = entries.len(), "Listed series");
            fresh.insert(language.clone(), entries);
        }
        let snapshot = {
            let mut index = self.index.write().await;
            index.extend(fresh);
            serde_json::to_vec_pretty(&*index).or_raise(|| ErrorKind::Snapshot)?
        };
        self.ready.send_replace(true);
        self.write_snapshot(&snapshot).await
    }

    /// Forgets the index and deletes the snapshot. The next
    /// [`load`](Self::load) lists everything from the remote again.
    pub async fn clear(&self) -> Result<()> {
        self.ready.send_replace(false);
        self.index.write().await.clear();
        match fs::remove_file(&self.snapshot).await {
            Err(err) if err.kind() != IoErrorKind::NotFound => Err(err).or_raise(|| ErrorKind::Snapshot),
            _ => Ok(()),
        }
    }

    /// Resolves a user supplied name to exactly one series.
    ///
    /// Exact title first, then a unique case-insensitive match, then a
    /// unique accent-insensitive substring match.
    pub async fn find_entry(&self, name: &str, language: &str) -> Result<CatalogEntry> {
        if !self.is_ready() {
            exn::bail!(ErrorKind::NotReady);
        }
        let index = self.index.read().await;
        let entries = index.get(language).map(Vec::as_slice).unwrap_or_default();
        match inkvault_source::find_entry(entries, name) {
            Ok(entry) => Ok(entry.clone()),
            Err(err) => {
                let kind = match &*err {
                    ResolveErrorKind::Ambiguous { query, matches } => ErrorKind::Ambiguous {
                        query: query.clone(),
                        matches: *matches,
                    },
                    _ => ErrorKind::NotFound(name.to_string()),
                };
                Err(err.raise(kind))
            },
        }
    }

    pub async fn entries(&self, language: &str) -> Result<Vec<CatalogEntry>> {
        if !self.is_ready() {
            exn::bail!(ErrorKind::NotReady);
        }
        Ok(self.index.read().await.get(language).cloned().unwrap_or_default())
    }

    /// Number of series across all languages.
    pub async fn len(&self) -> usize {
        self.index.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn read_snapshot(&self) -> Result<Option<Index>> {
        let data = match fs::read(&self.snapshot).await {
            Ok(data) => data,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).or_raise(|| ErrorKind::Snapshot),
        };
        serde_json::from_slice(&data).map(Some).or_raise(|| ErrorKind::Snapshot)
    }

    /// Write to a sibling temp file, then rename over the snapshot.
    async fn write_snapshot(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.snapshot.parent() {
            fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Snapshot)?;
        }
        let temp = self.snapshot.with_extension("json.tmp");
        fs::write(&temp, data).await.or_raise(|| ErrorKind::Snapshot)?;
        fs::rename(&temp, &self.snapshot).await.or_raise(|| ErrorKind::Snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use inkvault_fetch::ProgressSink;
    use inkvault_fetch::error::Result as FetchResult;
    use inkvault_source::models::{Episode, EpisodeData, Provider, SeriesAssets, SeriesInfo, Stars};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn entry(title: &str, genre: &str) -> CatalogEntry {
        CatalogEntry {
            title: title.to_string(),
            author: "Author".to_string(),
            link: format!("https://www.webtoons.com/en/{genre}/x/list?title_no=1"),
            thumbnail: "https://cdn.example.com/t.jpg".to_string(),
            stars: Stars { raw: "1".to_string(), value: 1.0 },
            genres: vec![genre.to_string()],
            id: "1".to_string(),
            language: "en".to_string(),
            provider: Provider::Webtoons,
        }
    }

    #[derive(Default)]
    struct FakeRemote {
        listings: HashMap<String, Vec<CatalogEntry>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Remote for FakeRemote {
        async fn listing(&self, language: &str) -> FetchResult<Vec<CatalogEntry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.listings.get(language).cloned().unwrap_or_default())
        }
        async fn series_info(&self, _: &CatalogEntry) -> FetchResult<SeriesInfo> {
            unimplemented!()
        }
        async fn episodes(&self, _: &CatalogEntry) -> FetchResult<Vec<Episode>> {
            unimplemented!()
        }
        async fn image_links(&self, _: &CatalogEntry, _: &Episode) -> FetchResult<Vec<String>> {
            unimplemented!()
        }
        async fn series_assets(&self, _: &SeriesInfo) -> FetchResult<SeriesAssets> {
            unimplemented!()
        }
        async fn episode_data(&self, _: &Episode, _: &[String], _: ProgressSink) -> FetchResult<EpisodeData> {
            unimplemented!()
        }
    }

    fn remote() -> Arc<FakeRemote> {
        let en = vec![
            entry("Tower of God", "fantasy"),
            entry("The Tower Guardian", "fantasy"),
            entry("Tower of God", "action"),
            entry("Lore Olympus", "romance"),
        ];
        Arc::new(FakeRemote {
            listings: HashMap::from([("en".to_string(), en)]),
            ..FakeRemote::default()
        })
    }

    fn cache(remote: Arc<FakeRemote>, dir: &Path) -> DiscoveryCache {
        DiscoveryCache::new(remote, vec!["en".to_string()], dir.join(".cache/webtoons.json"))
    }

    #[test]
    fn test_merge_unions_genres() {
        let merged = merge([entry("A", "fantasy"), entry("B", "drama"), entry("A", "action"), entry("A", "fantasy")]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title, "A");
        assert_eq!(merged[0].genres, ["fantasy", "action"]);
    }

    #[tokio::test]
    async fn test_not_ready_until_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(remote(), dir.path());
        let err = cache.find_entry("Tower of God", "en").await.unwrap_err();
        assert_eq!(*err, ErrorKind::NotReady);
        assert!(err.is_retryable());
        cache.load().await.unwrap();
        assert!(cache.is_ready());
        assert_eq!(cache.len().await, 3);
    }

    #[tokio::test]
    async fn test_find_entry_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(remote(), dir.path());
        cache.load().await.unwrap();

        let tog = cache.find_entry("Tower Of God", "en").await.unwrap();
        assert_eq!(tog.title, "Tower of God");
        assert_eq!(tog.genres, ["fantasy", "action"]);

        let err = cache.find_entry("tower", "en").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Ambiguous { matches: 2, .. }));
        let err = cache.find_entry("Solo Leveling", "en").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        let err = cache.find_entry("Tower of God", "fr").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_snapshot_avoids_relisting() {
        let dir = tempfile::tempdir().unwrap();
        let first = remote();
        cache(first.clone(), dir.path()).load().await.unwrap();
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert!(dir.path().join(".cache/webtoons.json").is_file());

        let second = remote();
        let restarted = cache(second.clone(), dir.path());
        restarted.load().await.unwrap();
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
        assert_eq!(restarted.find_entry("Lore Olympus", "en").await.unwrap().genres, ["romance"]);
    }

    #[tokio::test]
    async fn test_clear_forces_relisting() {
        let dir = tempfile::tempdir().unwrap();
        let remote = remote();
        let cache = cache(remote.clone(), dir.path());
        cache.load().await.unwrap();
        cache.clear().await.unwrap();
        assert!(!cache.is_ready());
        assert!(cache.is_empty().await);
        assert!(!cache.snapshot_path().exists());
        // Clearing twice is fine.
        cache.clear().await.unwrap();

        cache.load().await.unwrap();
        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cache/webtoons.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{not json").unwrap();
        let remote = remote();
        let cache = cache(remote.clone(), dir.path());
        cache.load().await.unwrap();
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        let snapshot: Index = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(snapshot["en"].len(), 3);
    }

    #[tokio::test]
    async fn test_wait_ready() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(cache(remote(), dir.path()));
        let waiter = tokio::spawn({
            let cache = cache.clone();
            async move { cache.wait_ready().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        cache.load().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }
}
