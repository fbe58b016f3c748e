//! URL construction for every page the scrapers read.

use crate::consts::{MOBILE_ORIGIN, ORIGIN};
use crate::models::{CatalogEntry, Episode};

/// Canvas pagination is read off a page far past the last one.
const PAST_LAST_PAGE: u32 = 999_999_999;

/// Desktop and mobile site origins.
///
/// Defaults to the public site; tests point both at a local mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub origin: String,
    pub mobile_origin: String,
}
impl Default for Endpoints {
    fn default() -> Self {
        Self {
            origin: ORIGIN.to_string(),
            mobile_origin: MOBILE_ORIGIN.to_string(),
        }
    }
}

impl Endpoints {
    /// Same origin for desktop and mobile pages.
    pub fn single(origin: impl Into<String>) -> Self {
        let origin = origin.into();
        Self {
            mobile_origin: format!("{origin}/m"),
            origin,
        }
    }

    pub fn genre(&self, language: &str, genre: &str) -> String {
        format!("{}/{language}/genres/{genre}", self.origin)
    }

    pub fn mobile_genre(&self, language: &str, genre: &str) -> String {
        format!("{}/{language}/genres/{genre}?webtoon-platform-redirect=true", self.mobile_origin)
    }

    pub fn canvas_page(&self, language: &str, genre: &str, page: u32) -> String {
        format!(
            "{}/{language}/canvas/list?genreTab={}&sortOrder=LIKEIT&page={page}",
            self.origin,
            genre.to_uppercase()
        )
    }

    pub fn canvas_last_page(&self, language: &str, genre: &str) -> String {
        format!(
            "{}/{language}/canvas/list?genreTab={}&page={PAST_LAST_PAGE}",
            self.origin,
            genre.to_uppercase()
        )
    }

    /// Mobile twin of a desktop series page.
    pub fn mobile_series(&self, entry: &CatalogEntry) -> String {
        let link = match entry.link.strip_prefix(&self.origin) {
            Some(path) => format!("{}{path}", self.mobile_origin),
            None => entry.link.clone(),
        };
        format!("{link}&webtoon-platform-redirect=true")
    }

    /// Viewer page of episode `number`; its sidebar lists the episodes.
    pub fn viewer_page(&self, entry: &CatalogEntry, number: u32) -> String {
        format!("{}/x/viewer?title_no={}&episode_no={number}", entry.base_url(), entry.id)
    }

    pub fn episode_viewer(&self, entry: &CatalogEntry, episode: &Episode) -> String {
        let number = episode.number;
        format!("{}/episode-{number}/viewer?title_no={}&episode_no={number}", entry.base_url(), entry.id)
    }
}
