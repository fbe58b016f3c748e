use serde::{Deserialize, Serialize};

use super::CatalogEntry;

/// Banner image URLs of a series page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banners {
    pub background: Option<String>,
    pub top: String,
    pub mobile: Option<String>,
}

/// A catalog entry enriched with what only the series page knows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesInfo {
    pub entry: CatalogEntry,
    pub episode_count: u32,
    pub banners: Banners,
}
