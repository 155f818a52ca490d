//! Address string construction and query normalization.
//!
//! WARN notices split the site address into street, city, state, and ZIP
//! columns with inconsistent spacing (`"100  Main St "`, embedded tabs and
//! line breaks from the spreadsheet export). The lookup service wants one
//! line with single separators.

/// Joins the address parts with single spaces, skipping blank parts.
#[must_use]
pub fn build_full_address(street: &str, city: &str, state: &str, zip: &str) -> String {
    [street, city, state, zip]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Collapses every run of whitespace to a single space and trims the ends.
///
/// The query-string encoder renders each remaining space as `+`, which is
/// the separator Nominatim expects in `q`.
#[must_use]
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
