//! Resolution of a human-entered series name against a listing.

use tracing::instrument;
use unicode_normalization::UnicodeNormalization;

use crate::error::{ErrorKind, Result};
use crate::models::CatalogEntry;

/// Lowercases, decomposes (NFD), and drops combining diacritical marks.
///
/// ```
/// assert_eq!(inkvault_source::normalize("Crème Brûlée"), "creme brulee");
/// ```
pub fn normalize(s: &str) -> String {
    s.to_lowercase().nfd().filter(|c| !('\u{0300}'..='\u{036f}').contains(c)).collect()
}

/// Finds the one entry `name` refers to.
///
/// Tried in order:
/// 1. exact title,
/// 2. case-insensitive title, only when a single entry matches,
/// 3. normalized substring of the title.
///
/// The last tier fails with [`Ambiguous`](ErrorKind::Ambiguous) on several
/// matches and [`NoMatch`](ErrorKind::NoMatch) on none.
#[instrument(level = "debug", skip(entries), fields(candidates = entries.len()))]
pub fn find_entry<'a>(entries: &'a [CatalogEntry], name: &str) -> Result<&'a CatalogEntry> {
    if let Some(exact) = entries.iter().find(|e| e.title == name) {
        return Ok(exact);
    }
    let lowercase = name.to_lowercase();
    let mut insensitive = entries.iter().filter(|e| e.title.to_lowercase() == lowercase);
    if let (Some(only), None) = (insensitive.next(), insensitive.next()) {
        return Ok(only);
    }
    let needle = normalize(name);
    let matches: Vec<&CatalogEntry> = entries.iter().filter(|e| normalize(&e.title).contains(&needle)).collect();
    match matches.as_slice() {
        [] => exn::bail!(ErrorKind::NoMatch(name.to_string())),
        [only] => Ok(*only),
        many => exn::bail!(ErrorKind::Ambiguous {
            query: name.to_string(),
            matches: many.len(),
        }),
    }
}
