use exn::OptionExt;
use scraper::Html;
use tracing::instrument;

use super::{absolute, attr_of, text_of, title_no};
use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::{CatalogEntry, Provider, Stars};

/// Highest page number in the pagination block.
///
/// Meant for the page past the end, where the block shows the last pages.
#[instrument(level = "trace", skip(html))]
pub fn canvas_page_count(html: &str) -> Result<u32> {
    let document = Html::parse_document(html);
    let paginate = document
        .select(&consts::PAGINATE_SELECTOR)
        .next()
        .ok_or_raise(|| ErrorKind::MissingField("pagination"))?;
    paginate
        .select(&consts::PAGINATE_NUMBER_SELECTOR)
        .filter_map(|span| span.text().collect::<String>().trim().parse::<u32>().ok())
        .max()
        .ok_or_raise(|| ErrorKind::MissingField("page numbers"))
}

/// Series cards of one canvas listing page.
#[instrument(level = "debug", skip(html))]
pub fn canvas_listing(html: &str, language: &str, genre: &str) -> Result<Vec<CatalogEntry>> {
    let document = Html::parse_document(html);
    let list = document
        .select(&consts::CANVAS_LIST_SELECTOR)
        .next()
        .ok_or_raise(|| ErrorKind::MissingField("canvas cards"))?;
    let mut entries = Vec::new();
    for li in list.select(&consts::LIST_ITEM_SELECTOR) {
        let Some(a) = li.select(&consts::ANCHOR_SELECTOR).next() else {
            continue;
        };
        let link = a.value().attr("href").map(absolute).ok_or_raise(|| ErrorKind::MissingField("link"))?;
        let stars = text_of(a, &consts::CANVAS_STARS_SELECTOR).ok_or_raise(|| ErrorKind::MissingField("stars"))?;
        entries.push(CatalogEntry {
            title: text_of(a, &consts::CANVAS_TITLE_SELECTOR).ok_or_raise(|| ErrorKind::MissingField("title"))?,
            author: text_of(a, &consts::CANVAS_AUTHOR_SELECTOR).ok_or_raise(|| ErrorKind::MissingField("author"))?,
            thumbnail: attr_of(a, &consts::CANVAS_IMG_SELECTOR, "src")
                .map(|src| absolute(&src))
                .ok_or_raise(|| ErrorKind::MissingField("thumbnail"))?,
            stars: stars.parse::<Stars>()?,
            genres: vec![genre.to_string()],
            id: title_no(&link).ok_or_raise(|| ErrorKind::MissingField("id"))?,
            link,
            language: language.to_string(),
            provider: Provider::Canvas,
        });
    }
    Ok(entries)
}
