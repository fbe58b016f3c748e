use async_trait::async_trait;
use exn::ResultExt;
use futures::future::try_join_all;
use inkvault_source::GENRES;
use inkvault_source::error::ErrorKind as ParseErrorKind;
use inkvault_source::models::CatalogEntry;
use inkvault_source::parse;
use tracing::{debug, instrument, warn};

use super::{Session, SourceProvider, random_delay};
use crate::error::{ErrorKind, Result};

/// Pages requested together before the first failure.
const BATCH_SIZE: u32 = 10;

/// Community series, listed through the paginated canvas directory.
pub(crate) struct Canvas;

impl Canvas {
    /// Last page number of a genre, or 0 when the genre has no canvas series.
    async fn page_count(&self, session: &Session, language: &str, genre: &str) -> Result<u32> {
        let url = session.endpoints.canvas_last_page(language, genre);
        let html = session.retry.run("canvas page count", || session.http.page(&url)).await?;
        match parse::canvas_page_count(&html) {
            Ok(count) => Ok(count),
            Err(err) if *err == ParseErrorKind::MissingField("pagination") => {
                debug!(language, genre, "No canvas pagination");
                Ok(0)
            },
            Err(err) => Err(err.raise(ErrorKind::Parse)),
        }
    }

    async fn page(&self, session: &Session, language: &str, genre: &str, page: u32) -> Result<Vec<CatalogEntry>> {
        let html = session.http.page(&session.endpoints.canvas_page(language, genre, page)).await?;
        parse::canvas_listing(&html, language, genre).or_raise(|| ErrorKind::Parse)
    }

    /// Loads pages in concurrent batches. A failed batch is retried whole,
    /// one page smaller each time.
    #[instrument(skip(self, session))]
    async fn genre(&self, session: &Session, language: &str, genre: &str) -> Result<Vec<CatalogEntry>> {
        let mut pages = self.page_count(session, language, genre).await?;
        if let Some(max) = session.options.canvas_max_pages {
            pages = pages.min(max);
        }
        let mut entries = Vec::new();
        let mut batch = BATCH_SIZE;
        let mut start = 1;
        let mut failures = 0;
        while start <= pages {
            let end = (start + batch - 1).min(pages);
            debug!(start, end, "Loading canvas pages");
            match try_join_all((start..=end).map(|page| self.page(session, language, genre, page))).await {
                Ok(loaded) => {
                    entries.extend(loaded.into_iter().flatten());
                    start = end + 1;
                    failures = 0;
                    tokio::time::sleep(random_delay(&session.options.canvas_pause_ms)).await;
                },
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    failures += 1;
                    if session.retry.gives_up_after(failures) {
                        return Err(err.raise(ErrorKind::Exhausted(failures)));
                    }
                    batch = batch.saturating_sub(1).max(1);
                    warn!(start, batch, error = %*err, "Canvas batch failed, retrying smaller");
                    tokio::time::sleep(session.retry.delay).await;
                },
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl SourceProvider for Canvas {
    #[instrument(skip(self, session))]
    async fn listing(&self, session: &Session, language: &str) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        for genre in GENRES {
            entries.extend(self.genre(session, language, genre).await?);
        }
        Ok(entries)
    }
}
