use async_trait::async_trait;
use exn::ResultExt;
use futures::{StreamExt, TryStreamExt, stream};
use inkvault_source::GENRES;
use inkvault_source::models::CatalogEntry;
use inkvault_source::parse;
use tracing::{debug, instrument};

use super::{Session, SourceProvider};
use crate::error::{ErrorKind, Result};

/// Genre pages loaded at once per language.
const GENRE_CONCURRENCY: usize = 8;

/// Originals, listed genre page by genre page.
pub(crate) struct Webtoons;

impl Webtoons {
    /// One genre, preferring the better cropped mobile thumbnails.
    async fn genre(&self, session: &Session, language: &str, genre: &str) -> Result<Vec<CatalogEntry>> {
        let mobile = session.http.mobile_page(&session.endpoints.mobile_genre(language, genre)).await?;
        let thumbnails = parse::mobile_thumbnails(&mobile, genre).or_raise(|| ErrorKind::Parse)?;
        let html = session.http.page(&session.endpoints.genre(language, genre)).await?;
        let entries = parse::genre_listing(&html, language, genre, &thumbnails).or_raise(|| ErrorKind::Parse)?;
        debug!(language, genre, count = entries.len(), "Loaded genre");
        Ok(entries)
    }
}

#[async_trait]
impl SourceProvider for Webtoons {
    #[instrument(skip(self, session))]
    async fn listing(&self, session: &Session, language: &str) -> Result<Vec<CatalogEntry>> {
        let lookups: Vec<_> = GENRES
            .into_iter()
            .map(|genre| session.retry.run("genre listing", move || self.genre(session, language, genre)))
            .collect();
        let genres: Vec<Vec<CatalogEntry>> = stream::iter(lookups)
            .buffered(GENRE_CONCURRENCY)
            .try_collect()
            .await?;
        Ok(genres.into_iter().flatten().collect())
    }
}
