use exn::OptionExt;
use scraper::Html;
use tracing::instrument;

use super::{absolute, attr_of, text_of};
use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::Episode;

/// Episode list from the sidebar of a viewer page.
///
/// The sidebar starts at the viewer's own episode, so entries are numbered
/// sequentially from `first_number`.
#[instrument(level = "debug", skip(html))]
pub fn viewer_episodes(html: &str, first_number: u32) -> Result<Vec<Episode>> {
    let document = Html::parse_document(html);
    let list = document
        .select(&consts::VIEWER_EPISODE_LIST_SELECTOR)
        .next()
        .ok_or_raise(|| ErrorKind::MissingField("episode list"))?;
    let mut episodes = Vec::new();
    let mut number = first_number;
    for li in list.select(&consts::LIST_ITEM_SELECTOR) {
        let Some(a) = li.select(&consts::ANCHOR_SELECTOR).next() else {
            continue;
        };
        episodes.push(Episode {
            title: text_of(a, &consts::VIEWER_EPISODE_TITLE_SELECTOR)
                .ok_or_raise(|| ErrorKind::MissingField("episode title"))?,
            number,
            link: a.value().attr("href").map(absolute).ok_or_raise(|| ErrorKind::MissingField("episode link"))?,
            thumbnail: attr_of(a, &consts::VIEWER_EPISODE_THUMB_SELECTOR, "data-url")
                .map(|src| absolute(&src))
                .ok_or_raise(|| ErrorKind::MissingField("episode thumbnail"))?,
        });
        number += 1;
    }
    Ok(episodes)
}

/// Page image URLs of an episode viewer, in reading order.
#[instrument(level = "debug", skip(html))]
pub fn episode_image_links(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let container = document
        .select(&consts::IMAGE_LIST_SELECTOR)
        .next()
        .ok_or_raise(|| ErrorKind::MissingField("image list"))?;
    container
        .select(&consts::IMG_SELECTOR)
        .map(|img| {
            img.value()
                .attr("data-url")
                .map(|url| absolute(url.trim()))
                .ok_or_raise(|| ErrorKind::MissingField("image data-url"))
        })
        .collect()
}
