//! Page parsers.
//!
//! Each parser takes the raw HTML of one page and returns models. Anything
//! structural that is missing fails with
//! [`MissingField`](crate::error::ErrorKind::MissingField): a layout change
//! will not fix itself on retry, so nothing is silently skipped.

mod canvas;
mod genre;
mod series;
mod viewer;

pub use self::canvas::{canvas_listing, canvas_page_count};
pub use self::genre::{genre_listing, mobile_thumbnails};
pub use self::series::series_info;
pub use self::viewer::{episode_image_links, viewer_episodes};

use scraper::{ElementRef, Selector};

use crate::consts::ORIGIN;

/// Trimmed text content of the first `selector` match under `parent`.
fn text_of(parent: ElementRef<'_>, selector: &Selector) -> Option<String> {
    parent
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn attr_of(parent: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    parent
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Makes scheme-relative and root-relative links absolute.
fn absolute(href: &str) -> String {
    if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("{ORIGIN}{href}")
    } else {
        href.to_string()
    }
}

/// The `title_no` query value of a series link.
fn title_no(link: &str) -> Option<String> {
    let (_, rest) = link.split_once("?title_no=")?;
    let id = rest.split('&').next().unwrap_or(rest);
    (!id.is_empty()).then(|| id.to_string())
}
