use serde::{Deserialize, Serialize};

use super::{Provider, Stars};

/// A series as listed by the remote source.
///
/// Entries only live in the discovery cache and the download queue. Two
/// entries describe the same series when their title and language match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub author: String,
    /// Series page, `https://www.webtoons.com/<lang>/<genre>/<slug>/list?title_no=<id>`
    pub link: String,
    pub thumbnail: String,
    pub stars: Stars,
    pub genres: Vec<String>,
    /// Remote `title_no`.
    pub id: String,
    pub language: String,
    #[serde(default)]
    pub provider: Provider,
}

impl CatalogEntry {
    pub fn is_same_series(&self, other: &CatalogEntry) -> bool {
        self.title == other.title && self.language == other.language
    }

    /// Series page URL minus the `/list?title_no=<id>` tail; episode and
    /// viewer URLs hang off it.
    pub fn base_url(&self) -> &str {
        let suffix = format!("/list?title_no={}", self.id);
        self.link.strip_suffix(suffix.as_str()).unwrap_or(&self.link)
    }

    /// Adds genres this entry was not yet listed under.
    pub fn merge_genres(&mut self, genres: impl IntoIterator<Item = String>) {
        for genre in genres {
            if !self.genres.contains(&genre) {
                self.genres.push(genre);
            }
        }
    }
}
