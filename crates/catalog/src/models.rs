use exn::ResultExt;
use serde::Serialize;
use time::UtcDateTime;

use crate::error::{Error, ErrorKind};

/// What an image row is used for. Stored as a seeded lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    WebtoonThumbnail,
    BackgroundBanner,
    TopBanner,
    MobileBanner,
    EpisodeThumbnail,
    EpisodeImage,
}
impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::WebtoonThumbnail => "webtoon_thumbnail",
            ImageKind::BackgroundBanner => "background_banner",
            ImageKind::TopBanner => "top_banner",
            ImageKind::MobileBanner => "mobile_banner",
            ImageKind::EpisodeThumbnail => "episode_thumbnail",
            ImageKind::EpisodeImage => "episode_image",
        }
    }
}

/// A persisted series. Images are referenced by content hash only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesRecord {
    pub id: i64,
    pub title: String,
    pub language: String,
    pub author: String,
    pub genres: Vec<String>,
    pub thumbnail: String,
    pub background_banner: Option<String>,
    pub top_banner: String,
    pub mobile_banner: Option<String>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeRecord {
    pub id: i64,
    pub series_id: i64,
    pub number: u32,
    pub title: String,
    pub thumbnail: String,
}

/// One page of a paged listing, 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
}

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
pub(crate) struct SeriesRow {
    id: i64,
    title: String,
    language: String,
    author: String,
    thumbnail: String,
    background_banner: Option<String>,
    top_banner: String,
    mobile_banner: Option<String>,
    genres: Option<String>,
    created_at: i64,
    updated_at: i64,
}
impl TryFrom<SeriesRow> for SeriesRecord {
    type Error = Error;
    fn try_from(row: SeriesRow) -> Result<Self, Self::Error> {
        let mut genres: Vec<String> = match row.genres {
            Some(genres) => genres.split(',').map(str::to_string).collect(),
            None => Vec::new(),
        };
        genres.sort();
        Ok(Self {
            id: row.id,
            title: row.title,
            language: row.language,
            author: row.author,
            genres,
            thumbnail: row.thumbnail,
            background_banner: row.background_banner,
            top_banner: row.top_banner,
            mobile_banner: row.mobile_banner,
            created_at: UtcDateTime::from_unix_timestamp(row.created_at)
                .or_raise(|| ErrorKind::InvalidData("created_at"))?,
            updated_at: UtcDateTime::from_unix_timestamp(row.updated_at)
                .or_raise(|| ErrorKind::InvalidData("updated_at"))?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct EpisodeRow {
    id: i64,
    series_id: i64,
    number: i64,
    title: String,
    thumbnail: String,
}
impl TryFrom<EpisodeRow> for EpisodeRecord {
    type Error = Error;
    fn try_from(row: EpisodeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            series_id: row.series_id,
            number: u32::try_from(row.number).or_raise(|| ErrorKind::InvalidData("episode number"))?,
            title: row.title,
            thumbnail: row.thumbnail,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ImageRow {
    pub(crate) id: i64,
    pub(crate) sum: String,
}
