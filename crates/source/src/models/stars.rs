use exn::{OptionExt, ResultExt};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::consts::LEADING_FLOAT_REGEX;
use crate::error::{Error, ErrorKind};

const NBSP: char = '\u{a0}';
const MILLION: f64 = 1_000_000.0;

/// Popularity figure shown on listing cards, e.g. `1,2M` or `523`.
///
/// The page text is kept next to the parsed value since the display format
/// is locale specific and lossy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stars {
    pub raw: String,
    pub value: f64,
}

impl FromStr for Stars {
    type Err = Error;

    /// ```
    /// use inkvault_source::models::Stars;
    /// assert_eq!("1,2M".parse::<Stars>().unwrap().value, 1_200_000.0);
    /// assert_eq!("523".parse::<Stars>().unwrap().value, 523.0);
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.replace(NBSP, " ");
        let mut normalized = raw.replacen(',', ".", 1).replacen(' ', "", 1);
        let mut multiplier = 1.0;
        for suffix in ["M", "JT"] {
            if let Some(stripped) = normalized.strip_suffix(suffix) {
                normalized = stripped.to_string();
                multiplier = MILLION;
                break;
            }
        }
        let error = || ErrorKind::ParseError {
            field: "stars",
            value: raw.clone(),
        };
        let number = LEADING_FLOAT_REGEX.find(normalized.trim()).ok_or_raise(error)?;
        let value = number.as_str().parse::<f64>().or_raise(error)?;
        Ok(Self { raw: raw.clone(), value: value * multiplier })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1,2M", 1_200_000.0)]
    #[case("523", 523.0)]
    #[case("12,5JT", 12_500_000.0)]
    #[case("1.9M", 1_900_000.0)]
    #[case("123\u{a0}456", 123_456.0)]
    #[case("98 765", 98_765.0)]
    fn test_parse(#[case] input: &str, #[case] expected: f64) {
        assert_eq!(input.parse::<Stars>().unwrap().value, expected);
    }

    #[test]
    fn test_raw_is_nbsp_normalized() {
        let stars: Stars = "123\u{a0}456".parse().unwrap();
        assert_eq!(stars.raw, "123 456");
    }

    #[rstest]
    #[case("")]
    #[case("M")]
    #[case("lots")]
    fn test_unparseable(#[case] input: &str) {
        let err = input.parse::<Stars>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::ParseError { field: "stars", .. }));
    }
}
