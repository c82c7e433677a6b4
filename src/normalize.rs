//! Key normalization for entity matching.
//!
//! ## Normalization Rules
//!
//! ```text
//! normalize_key(s) = collapse_whitespace(lowercase(trim(s)))
//! normalize_doi(s) = normalize_key(strip_resolver_prefix(s))
//! normalize_issn(s) = uppercase(remove_non_alnum(s))     (must be 8 chars)
//! ```
//!
//! Two records denote the same entity only when their normalized keys are
//! byte-equal. There is no fuzzy matching in the merge path; near-duplicate
//! detection lives in [`crate::merge::find_near_duplicates`] and only
//! reports candidates.

use regex_lite::Regex;
use std::sync::OnceLock;

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"))
}

fn doi_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:https?://(?:dx\.)?doi\.org/|doi:\s*)").expect("static DOI prefix pattern")
    })
}

/// Normalize a free-text key: trim, lowercase, collapse whitespace runs to one space.
///
/// ```rust
/// use snowball_graph::normalize::normalize_key;
///
/// assert_eq!(normalize_key("  Graph   Drawing\tBy Force "), "graph drawing by force");
/// ```
pub fn normalize_key(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    whitespace_regex().replace_all(&lowered, " ").into_owned()
}

/// Normalize a DOI, dropping resolver prefixes. Returns `None` for blank input.
///
/// ```rust
/// use snowball_graph::normalize::normalize_doi;
///
/// assert_eq!(normalize_doi("https://doi.org/10.1/ABC").as_deref(), Some("10.1/abc"));
/// assert_eq!(normalize_doi("   "), None);
/// ```
pub fn normalize_doi(doi: &str) -> Option<String> {
    let lowered = doi.trim().to_lowercase();
    let stripped = doi_prefix_regex().replace(&lowered, "");
    let key = normalize_key(&stripped);
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Normalize an ISSN to its 8 significant characters. Returns `None` if the
/// input does not contain exactly 8 digits (the last may be `X`).
pub fn normalize_issn(issn: &str) -> Option<String> {
    let compact: String = issn
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let valid = compact.len() == 8
        && compact[..7].chars().all(|c| c.is_ascii_digit())
        && compact[7..].chars().all(|c| c.is_ascii_digit() || c == 'X');
    if valid {
        Some(compact)
    } else {
        None
    }
}

/// Normalize an optional text value; blank becomes `None`.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Secondary article key: normalized title plus year.
///
/// Returns `None` for a blank title, so untitled partial records never
/// collapse into each other.
pub fn title_year_key(title: &str, year: Option<i32>) -> Option<String> {
    let title = normalize_key(title);
    if title.is_empty() {
        return None;
    }
    Some(match year {
        Some(y) => format!("{}|{}", title, y),
        None => format!("{}|", title),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Jane  DOE"), "jane doe");
        assert_eq!(normalize_key("\n"), "");
        assert_eq!(normalize_key("Élan Vital"), "élan vital");
    }

    #[test]
    fn test_normalize_doi_prefixes() {
        assert_eq!(normalize_doi("10.1/a").as_deref(), Some("10.1/a"));
        assert_eq!(normalize_doi("doi: 10.1/A").as_deref(), Some("10.1/a"));
        assert_eq!(normalize_doi("http://dx.doi.org/10.1/a").as_deref(), Some("10.1/a"));
        assert_eq!(normalize_doi("HTTPS://DOI.ORG/10.1/a").as_deref(), Some("10.1/a"));
        assert_eq!(normalize_doi(""), None);
    }

    #[test]
    fn test_normalize_issn() {
        assert_eq!(normalize_issn("0000-1111").as_deref(), Some("00001111"));
        assert_eq!(normalize_issn("1234-567x").as_deref(), Some("1234567X"));
        assert_eq!(normalize_issn("12-34"), None);
        assert_eq!(normalize_issn("abcd-efgh"), None);
    }

    #[test]
    fn test_title_year_key() {
        assert_eq!(title_year_key("  A Study ", Some(2020)).as_deref(), Some("a study|2020"));
        assert_eq!(title_year_key("A Study", None).as_deref(), Some("a study|"));
        assert_eq!(title_year_key(" ", Some(2020)), None);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  x ")), Some("x"));
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(None), None);
    }
}
