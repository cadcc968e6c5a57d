//! Text normalization for upstream query construction.
//!
//! The consumption dataset matches addresses with an upper-cased,
//! accent-free syntax ("RUE DE L INGENIEUR ..."), so the free-text pieces
//! coming back from the geocoder have to be folded before they are usable in
//! a `where` clause. Only query plumbing lives here; nothing in this module
//! touches scoring.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Strips diacritics via NFKD decomposition ("ingénieur" -> "ingenieur").
pub fn fold_accents(s: &str) -> String {
    s.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Builds the address string for the consumption dataset's match syntax:
/// accent-free, apostrophes replaced by spaces ("L'Ingénieur" -> "L
/// INGENIEUR"), upper-cased, whitespace collapsed.
pub fn consumption_query_address(house_number: Option<&str>, street: Option<&str>) -> String {
    let joined = [house_number, street]
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    fold_accents(&joined)
        .replace('\'', " ")
        .replace('’', " ")
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
