use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

/// Every language the remote source publishes in.
pub const LANGUAGES: [&str; 7] = ["fr", "en", "es", "zh-hant", "th", "de", "id"];

/// Genre slugs, as used both in genre page URLs and in the catalog.
pub const GENRES: [&str; 29] = [
    "drama",
    "fantasy",
    "comedy",
    "action",
    "slice_of_life",
    "romance",
    "super_hero",
    "thriller",
    "sports",
    "sf",
    "horror",
    "tiptoon",
    "local",
    "school",
    "martial_arts",
    "bl_gl",
    "romance_m",
    "time_slip",
    "city_office",
    "mystery",
    "heartwarming",
    "shonen",
    "eastern_palace",
    "web_novel",
    "western_palace",
    "adaptation",
    "supernatural",
    "historical",
    "romantic_fantasy",
];

pub(crate) const ORIGIN: &str = "https://www.webtoons.com";
pub(crate) const MOBILE_ORIGIN: &str = "https://m.webtoons.com";

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Genre listing (desktop)
selector!(GENRE_LIST_SELECTOR, "ul.webtoon_list");
selector!(LIST_ITEM_SELECTOR, "li");
selector!(ANCHOR_SELECTOR, "a");
selector!(CARD_TITLE_SELECTOR, ".info_text .title");
selector!(CARD_AUTHOR_SELECTOR, ".info_text .author");
selector!(CARD_STARS_SELECTOR, ".info_text .view_count");
selector!(IMG_SELECTOR, "img");
// Genre listing (mobile), the list itself is `ul.genre_<GENRE>_list`.
selector!(MOBILE_CARD_TITLE_SELECTOR, "a div.info p.subj span");
selector!(MOBILE_CARD_IMG_SELECTOR, "a div.pic img");
// Canvas listing
selector!(CANVAS_LIST_SELECTOR, "div.challenge_lst ul");
selector!(CANVAS_TITLE_SELECTOR, "p.subj");
selector!(CANVAS_AUTHOR_SELECTOR, "p.author");
selector!(CANVAS_STARS_SELECTOR, "p.grade_area em");
selector!(CANVAS_IMG_SELECTOR, "span img");
selector!(PAGINATE_SELECTOR, "div.paginate");
selector!(PAGINATE_NUMBER_SELECTOR, "a span");
// Series page
selector!(EPISODE_COUNT_SELECTOR, "ul#_listUl li a span.tx");
selector!(DETAIL_BG_SELECTOR, "div.detail_bg");
selector!(TOP_BANNER_SELECTOR, "span.thmb img");
selector!(MOBILE_HEADER_SELECTOR, "#header");
// Viewer pages
selector!(VIEWER_EPISODE_LIST_SELECTOR, "div.episode_cont ul");
selector!(VIEWER_EPISODE_THUMB_SELECTOR, "span.thmb img");
selector!(VIEWER_EPISODE_TITLE_SELECTOR, "span.subj");
selector!(IMAGE_LIST_SELECTOR, "div#_imageList");
regex!(CSS_URL_REGEX, r"url\(([^)]*)\)");
regex!(LEADING_FLOAT_REGEX, r"^[+-]?(?:\d+\.?\d*|\.\d+)");
