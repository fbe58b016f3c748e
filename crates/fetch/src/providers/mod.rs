//! One listing implementation per [`Provider`](inkvault_source::models::Provider).
//!
//! Series pages, viewer sidebars and image lists are the same for every
//! provider, so those live on the trait as defaults.

mod canvas;
mod webtoons;

pub(crate) use self::canvas::Canvas;
pub(crate) use self::webtoons::Webtoons;

use std::ops::RangeInclusive;
use std::time::Duration;

use async_trait::async_trait;
use exn::ResultExt;
use inkvault_source::Endpoints;
use inkvault_source::models::{CatalogEntry, Episode, SeriesInfo};
use inkvault_source::parse;
use rand::Rng;
use tracing::{debug, instrument};

use crate::client::HttpClient;
use crate::error::{ErrorKind, Result};
use crate::remote::FetchOptions;
use crate::retry::RetryPolicy;

/// Everything a provider needs to reach the remote.
pub(crate) struct Session {
    pub(crate) http: HttpClient,
    pub(crate) endpoints: Endpoints,
    pub(crate) retry: RetryPolicy,
    pub(crate) options: FetchOptions,
}

/// Random duration within a millisecond range.
pub(crate) fn random_delay(range: &RangeInclusive<u64>) -> Duration {
    if range.is_empty() {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(range.clone()))
}

#[async_trait]
pub(crate) trait SourceProvider: Send + Sync {
    /// Every series this provider lists for `language`. Not deduplicated.
    async fn listing(&self, session: &Session, language: &str) -> Result<Vec<CatalogEntry>>;

    /// Desktop and mobile series pages, fetched together.
    #[instrument(skip_all, fields(title = %entry.title, language = %entry.language))]
    async fn series_info(&self, session: &Session, entry: &CatalogEntry) -> Result<SeriesInfo> {
        let mobile_url = session.endpoints.mobile_series(entry);
        session
            .retry
            .run("series info", || async {
                let (html, mobile) =
                    futures::try_join!(session.http.page(&entry.link), session.http.mobile_page(&mobile_url))?;
                parse::series_info(entry, &html, &mobile).or_raise(|| ErrorKind::Parse)
            })
            .await
    }

    /// Episode list read off the first viewer page that loads.
    ///
    /// Early episodes may have been taken down, so an unavailable viewer
    /// moves on to the next number. Whatever loads first numbers
    /// the list.
    #[instrument(skip_all, fields(title = %entry.title, language = %entry.language))]
    async fn episodes(&self, session: &Session, entry: &CatalogEntry) -> Result<Vec<Episode>> {
        let mut number = 1;
        let mut misses = 0;
        loop {
            match session.http.page(&session.endpoints.viewer_page(entry, number)).await {
                Ok(html) => return parse::viewer_episodes(&html, number).or_raise(|| ErrorKind::Parse),
                Err(err) if err.is_unavailable() => {
                    misses += 1;
                    if session.retry.gives_up_after(misses) {
                        return Err(err.raise(ErrorKind::Exhausted(misses)));
                    }
                    debug!(number, "Viewer unavailable, trying the next episode");
                    number += 1;
                    tokio::time::sleep(session.retry.delay).await;
                },
                Err(err) => return Err(err),
            }
        }
    }

    async fn image_links(&self, session: &Session, entry: &CatalogEntry, episode: &Episode) -> Result<Vec<String>> {
        let url = session.endpoints.episode_viewer(entry, episode);
        let html = session.retry.run("episode viewer", || session.http.page(&url)).await?;
        parse::episode_image_links(&html).or_raise(|| ErrorKind::Parse)
    }
}
