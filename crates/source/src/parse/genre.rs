use std::collections::HashMap;

use exn::OptionExt;
use scraper::{Html, Selector};
use tracing::{instrument, warn};

use super::{absolute, attr_of, text_of, title_no};
use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::{CatalogEntry, Provider, Stars};

/// Title to thumbnail URL, from the mobile version of a genre page.
///
/// Mobile thumbnails are better cropped than the desktop ones. Cards that
/// lack either piece are skipped; this is only a preference layer.
#[instrument(level = "trace", skip(html))]
pub fn mobile_thumbnails(html: &str, genre: &str) -> Result<HashMap<String, String>> {
    let css = format!("ul.genre_{}_list li", genre.to_uppercase());
    let cards = Selector::parse(&css).ok().ok_or_raise(|| ErrorKind::ParseError {
        field: "genre",
        value: genre.to_string(),
    })?;
    let document = Html::parse_document(html);
    Ok(document
        .select(&cards)
        .filter_map(|li| {
            let title = text_of(li, &consts::MOBILE_CARD_TITLE_SELECTOR)?;
            let thumbnail = attr_of(li, &consts::MOBILE_CARD_IMG_SELECTOR, "src")?;
            Some((title, absolute(&thumbnail)))
        })
        .collect())
}

/// Series cards of a desktop genre page.
///
/// A page with no list at all is a genre with nothing in this language and
/// yields no entries. A card missing a field fails the whole page.
#[instrument(level = "debug", skip(html, mobile_thumbnails))]
pub fn genre_listing(
    html: &str,
    language: &str,
    genre: &str,
    mobile_thumbnails: &HashMap<String, String>,
) -> Result<Vec<CatalogEntry>> {
    let document = Html::parse_document(html);
    let Some(list) = document.select(&consts::GENRE_LIST_SELECTOR).next() else {
        warn!(language, genre, "No series found for genre");
        return Ok(Vec::new());
    };
    let mut entries = Vec::new();
    for li in list.select(&consts::LIST_ITEM_SELECTOR) {
        let Some(a) = li.select(&consts::ANCHOR_SELECTOR).next() else {
            continue;
        };
        let title = text_of(a, &consts::CARD_TITLE_SELECTOR).ok_or_raise(|| ErrorKind::MissingField("title"))?;
        let author = text_of(a, &consts::CARD_AUTHOR_SELECTOR).ok_or_raise(|| ErrorKind::MissingField("author"))?;
        let stars = text_of(a, &consts::CARD_STARS_SELECTOR).ok_or_raise(|| ErrorKind::MissingField("stars"))?;
        let link = a.value().attr("href").map(absolute).ok_or_raise(|| ErrorKind::MissingField("link"))?;
        let id = title_no(&link).ok_or_raise(|| ErrorKind::MissingField("id"))?;
        let thumbnail = match mobile_thumbnails.get(&title) {
            Some(thumbnail) => thumbnail.clone(),
            None => attr_of(a, &consts::IMG_SELECTOR, "src")
                .map(|src| absolute(&src))
                .ok_or_raise(|| ErrorKind::MissingField("thumbnail"))?,
        };
        entries.push(CatalogEntry {
            stars: stars.parse::<Stars>()?,
            title,
            author,
            link,
            thumbnail,
            genres: vec![genre.to_string()],
            id,
            language: language.to_string(),
            provider: Provider::Webtoons,
        });
    }
    Ok(entries)
}
