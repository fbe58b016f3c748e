use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

/// Where a series is listed; selects the listing scraper.
///
/// Series pages, episode lists and viewer pages share one layout, so only
/// discovery differs between providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Official series, listed per genre page.
    #[default]
    Webtoons,
    /// User-published series, listed across paginated canvas pages.
    Canvas,
}
impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Webtoons => "webtoons",
            Provider::Canvas => "canvas",
        }
    }
}
impl FromStr for Provider {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "webtoons" | "webtoon" => Self::Webtoons,
            "canvas" | "webtoon_canvas" => Self::Canvas,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "provider",
                value: s.to_string(),
            }),
        })
    }
}
impl Display for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
