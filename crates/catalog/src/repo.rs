//! Queries over series, episodes and their image references.
//!
//! Image bytes never touch the database: they go to the [`BlobStore`] first
//! and only their content hash is recorded. Every multi-row write runs in
//! one transaction, so a failed save leaves nothing that `is_*_saved` could
//! mistake for finished work. Blobs written before a rolled back transaction
//! stay behind unreferenced, which is harmless.

use std::collections::HashMap;
use std::path::Path;

use exn::{OptionExt, ResultExt};
use inkvault_source::models::{CatalogEntry, Episode, EpisodeData, SeriesAssets};
use inkvault_storage::BlobStore;
use sqlx::{Sqlite, SqlitePool, Transaction};
use time::UtcDateTime;
use tracing::{debug, info, instrument};

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{EpisodeRecord, EpisodeRow, ImageKind, ImageRow, Page, SeriesRecord, SeriesRow};

/// Items per page on every paged read path.
pub const PAGE_SIZE: u32 = 10;

fn total_pages(count: i64) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX).div_ceil(PAGE_SIZE)
}

fn offset(page: u32) -> i64 {
    i64::from(page.max(1) - 1) * i64::from(PAGE_SIZE)
}

/// Repository for the catalog database and the blobs its rows reference.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    blobs: BlobStore,
}
impl Repository {
    pub fn new(db: &Database, blobs: BlobStore) -> Self {
        Self { pool: db.pool().clone(), blobs }
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    async fn upsert_image(tx: &mut Transaction<'_, Sqlite>, sum: &str, kind: ImageKind) -> Result<i64> {
        sqlx::query_scalar(include_str!("../queries/upsert_image.sql"))
            .bind(sum)
            .bind(kind.as_str())
            .fetch_one(&mut **tx)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    async fn series_id(&self, title: &str, language: &str) -> Result<Option<i64>> {
        sqlx::query_scalar(include_str!("../queries/series_id.sql"))
            .bind(title)
            .bind(language)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Existence
    // =========================================================================

    pub async fn is_series_saved(&self, title: &str, language: &str) -> Result<bool> {
        Ok(self.series_id(title, language).await?.is_some())
    }

    pub async fn is_episode_saved(&self, series_id: i64, number: u32) -> Result<bool> {
        sqlx::query_scalar(include_str!("../queries/episode_exists.sql"))
            .bind(series_id)
            .bind(i64::from(number))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Highest saved episode number of a series, 0 when nothing (not even the
    /// series) is saved yet.
    pub async fn last_saved_episode_number(&self, title: &str, language: &str) -> Result<u32> {
        let Some(series_id) = self.series_id(title, language).await? else {
            return Ok(0);
        };
        let number: i64 = sqlx::query_scalar(include_str!("../queries/last_episode_number.sql"))
            .bind(series_id)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u32::try_from(number).or_raise(|| ErrorKind::InvalidData("episode number"))
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Saves a series with its images and genres.
    ///
    /// First writer wins: returns `false` without touching anything when a
    /// series with the same title and language exists.
    #[instrument(skip_all, fields(title = %entry.title, language = %entry.language))]
    pub async fn save_series(&self, entry: &CatalogEntry, assets: &SeriesAssets) -> Result<bool> {
        if self.is_series_saved(&entry.title, &entry.language).await? {
            return Ok(false);
        }
        let put = |data: &[u8]| {
            let blobs = self.blobs.clone();
            let data = data.to_vec();
            async move { blobs.put(&data).await.or_raise(|| ErrorKind::Storage) }
        };
        let thumbnail = put(&assets.thumbnail).await?;
        let top = put(&assets.top_banner).await?;
        let background = match &assets.background_banner {
            Some(data) => Some(put(data).await?),
            None => None,
        };
        let mobile = match &assets.mobile_banner {
            Some(data) => Some(put(data).await?),
            None => None,
        };

        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let mut genre_ids = Vec::with_capacity(entry.genres.len());
        for genre in &entry.genres {
            let id: Option<i64> = sqlx::query_scalar(include_str!("../queries/genre_id.sql"))
                .bind(genre)
                .fetch_optional(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            genre_ids.push(id.ok_or_raise(|| ErrorKind::GenreNotFound(genre.clone()))?);
        }
        let thumbnail_id = Self::upsert_image(&mut tx, &thumbnail, ImageKind::WebtoonThumbnail).await?;
        let top_id = Self::upsert_image(&mut tx, &top, ImageKind::TopBanner).await?;
        let background_id = match &background {
            Some(sum) => Some(Self::upsert_image(&mut tx, sum, ImageKind::BackgroundBanner).await?),
            None => None,
        };
        let mobile_id = match &mobile {
            Some(sum) => Some(Self::upsert_image(&mut tx, sum, ImageKind::MobileBanner).await?),
            None => None,
        };
        let now = UtcDateTime::now().unix_timestamp();
        let series_id: i64 = sqlx::query_scalar(include_str!("../queries/insert_series.sql"))
            .bind(&entry.title)
            .bind(&entry.language)
            .bind(&entry.author)
            .bind(thumbnail_id)
            .bind(background_id)
            .bind(top_id)
            .bind(mobile_id)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for genre_id in genre_ids {
            sqlx::query(include_str!("../queries/insert_series_genre.sql"))
                .bind(series_id)
                .bind(genre_id)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        info!(series_id, "Saved series");
        Ok(true)
    }

    /// Saves one episode, its thumbnail and its pages (0-based positions).
    ///
    /// Returns `false` when the episode is already saved and `force` is not
    /// set. With `force`, the existing episode and its image links are
    /// replaced within the same transaction.
    #[instrument(skip_all, fields(title = %entry.title, language = %entry.language, number = episode.number, force = force))]
    pub async fn save_episode(
        &self,
        entry: &CatalogEntry,
        episode: &Episode,
        data: &EpisodeData,
        force: bool,
    ) -> Result<bool> {
        let series_id = self
            .series_id(&entry.title, &entry.language)
            .await?
            .ok_or_raise(|| ErrorKind::SeriesNotFound(entry.title.clone()))?;
        let number = i64::from(episode.number);
        if !force && self.is_episode_saved(series_id, episode.number).await? {
            debug!("Episode already saved");
            return Ok(false);
        }
        let thumbnail = self.blobs.put(&data.thumbnail).await.or_raise(|| ErrorKind::Storage)?;
        let sums = self.blobs.put_many(&data.images).await.or_raise(|| ErrorKind::Storage)?;

        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        if force {
            // Image links go with the episode (ON DELETE CASCADE).
            sqlx::query(include_str!("../queries/delete_episode.sql"))
                .bind(series_id)
                .bind(number)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        let thumbnail_id = Self::upsert_image(&mut tx, &thumbnail, ImageKind::EpisodeThumbnail).await?;
        let now = UtcDateTime::now().unix_timestamp();
        let episode_id: i64 = sqlx::query_scalar(include_str!("../queries/insert_episode.sql"))
            .bind(series_id)
            .bind(number)
            .bind(&episode.title)
            .bind(thumbnail_id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;

        // Look up every known hash at once, insert only the new ones.
        let wanted = serde_json::to_string(&sums).or_raise(|| ErrorKind::InvalidData("image hashes"))?;
        let known: Vec<ImageRow> = sqlx::query_as(include_str!("../queries/find_images.sql"))
            .bind(wanted)
            .fetch_all(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut ids: HashMap<String, i64> = known.into_iter().map(|row| (row.sum, row.id)).collect();
        for (position, sum) in sums.iter().enumerate() {
            let image_id = match ids.get(sum) {
                Some(id) => *id,
                None => {
                    let id = Self::upsert_image(&mut tx, sum, ImageKind::EpisodeImage).await?;
                    ids.insert(sum.clone(), id);
                    id
                },
            };
            sqlx::query(include_str!("../queries/insert_episode_image.sql"))
                .bind(episode_id)
                .bind(i64::try_from(position).or_raise(|| ErrorKind::InvalidData("image position"))?)
                .bind(image_id)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        sqlx::query(include_str!("../queries/touch_series.sql"))
            .bind(now)
            .bind(series_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        debug!(episode_id, pages = sums.len(), "Saved episode");
        Ok(true)
    }

    // =========================================================================
    // Listing
    // =========================================================================

    /// `(title, language)` of every saved series, oldest first.
    pub async fn list_series_keys(&self) -> Result<Vec<(String, String)>> {
        sqlx::query_as(include_str!("../queries/list_series_keys.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Every saved series, by title.
    pub async fn list_series(&self) -> Result<Vec<SeriesRecord>> {
        let rows: Vec<SeriesRow> = sqlx::query_as(include_str!("../queries/list_series.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(SeriesRecord::try_from).collect()
    }

    pub async fn get_series(&self, series_id: i64) -> Result<SeriesRecord> {
        let row: Option<SeriesRow> = sqlx::query_as(include_str!("../queries/get_series.sql"))
            .bind(series_id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.ok_or_raise(|| ErrorKind::SeriesNotFound(series_id.to_string()))?.try_into()
    }

    /// Episodes of a series, newest first.
    pub async fn list_episodes(&self, series_id: i64, page: u32) -> Result<Page<EpisodeRecord>> {
        // Surfaces SeriesNotFound rather than an empty page.
        self.get_series(series_id).await?;
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_episodes.sql"))
            .bind(series_id)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let rows: Vec<EpisodeRow> = sqlx::query_as(include_str!("../queries/list_episodes.sql"))
            .bind(series_id)
            .bind(i64::from(PAGE_SIZE))
            .bind(offset(page))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Page {
            items: rows.into_iter().map(EpisodeRecord::try_from).collect::<Result<Vec<_>>>()?,
            page: page.max(1),
            total_pages: total_pages(count),
        })
    }

    pub async fn get_episode(&self, episode_id: i64) -> Result<EpisodeRecord> {
        let row: Option<EpisodeRow> = sqlx::query_as(include_str!("../queries/get_episode.sql"))
            .bind(episode_id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.ok_or_raise(|| ErrorKind::EpisodeNotFound(episode_id.to_string()))?.try_into()
    }

    /// Page hashes of an episode in reading order.
    pub async fn list_episode_images(&self, episode_id: i64, page: u32) -> Result<Page<String>> {
        self.get_episode(episode_id).await?;
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_episode_images.sql"))
            .bind(episode_id)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let items: Vec<String> = sqlx::query_scalar(include_str!("../queries/list_episode_images.sql"))
            .bind(episode_id)
            .bind(i64::from(PAGE_SIZE))
            .bind(offset(page))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Page {
            items,
            page: page.max(1),
            total_pages: total_pages(count),
        })
    }

    // =========================================================================
    // Migration
    // =========================================================================

    pub async fn image_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_images.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("image count"))
    }

    /// Hashes of the `chunk`-th (1-based) run of `chunk_size` image rows.
    pub async fn image_hashes(&self, chunk: u32, chunk_size: u32) -> Result<Vec<String>> {
        let offset = i64::from(chunk.max(1) - 1) * i64::from(chunk_size);
        sqlx::query_scalar(include_str!("../queries/list_image_sums.sql"))
            .bind(i64::from(chunk_size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// Writes a consistent copy of the whole database to `destination`, which
    /// must not exist yet.
    #[instrument(skip(self))]
    pub async fn export_database(&self, destination: &Path) -> Result<()> {
        let destination = destination.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?;
        sqlx::query(include_str!("../queries/export_database.sql"))
            .bind(destination)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}
