use exn::{OptionExt, ResultExt};
use scraper::{ElementRef, Html};
use tracing::instrument;

use super::absolute;
use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::{Banners, CatalogEntry, SeriesInfo};

/// The `url(...)` of an inline style, unquoted.
fn css_url(style: &str) -> Option<String> {
    let captures = consts::CSS_URL_REGEX.captures(style)?;
    let url = captures.get(1)?.as_str().replace(['\'', '"'], "");
    let url = url.trim();
    (!url.is_empty()).then(|| absolute(url))
}

fn style_url(element: Option<ElementRef<'_>>) -> Option<String> {
    element.and_then(|el| el.value().attr("style")).and_then(css_url)
}

/// Combines the desktop and mobile series pages into a [`SeriesInfo`].
///
/// The first entry of the episode list carries the newest episode number,
/// which is the episode count.
#[instrument(level = "debug", skip_all, fields(title = %entry.title))]
pub fn series_info(entry: &CatalogEntry, html: &str, mobile_html: &str) -> Result<SeriesInfo> {
    let document = Html::parse_document(html);
    let mobile = Html::parse_document(mobile_html);

    let raw_count = document
        .select(&consts::EPISODE_COUNT_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>().replace('#', "").trim().to_string())
        .ok_or_raise(|| ErrorKind::MissingField("episode count"))?;
    let episode_count = raw_count.parse::<u32>().or_raise(|| ErrorKind::ParseError {
        field: "episode count",
        value: raw_count.clone(),
    })?;

    let top = document
        .select(&consts::TOP_BANNER_SELECTOR)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(|src| absolute(&src.replace('\'', "")))
        .ok_or_raise(|| ErrorKind::MissingField("top banner"))?;
    let banners = Banners {
        background: style_url(document.select(&consts::DETAIL_BG_SELECTOR).next()),
        top,
        mobile: style_url(mobile.select(&consts::MOBILE_HEADER_SELECTOR).next()),
    };

    Ok(SeriesInfo {
        entry: entry.clone(),
        episode_count,
        banners,
    })
}
