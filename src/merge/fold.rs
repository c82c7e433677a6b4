//! Field folding.
//!
//! ## Policy
//!
//! ```text
//! winner empty,  incoming set    → take incoming
//! winner set,    incoming empty  → keep winner
//! both set, same (normalized)    → keep winner
//! both set, different            → keep winner, note "[merge conflict] field: incoming"
//! ```
//!
//! Folding never loses data: every discarded value ends up in the winner's
//! notes. Conflict lines are appended at most once, so folding the same
//! record twice leaves the winner unchanged.

use std::fmt::Display;

use crate::normalize::{non_blank, normalize_doi, normalize_issn, normalize_key};
use crate::types::{Article, ArticleStatus, Author, Entity, Keyword, Periodical};

/// Prefix of a conflict line in an entity's notes.
pub const CONFLICT_MARKER: &str = "[merge conflict]";

/// Append a conflict line to notes unless already present.
///
/// Returns `true` if the line was added.
pub fn record_conflict(notes: &mut String, field: &str, value: &str) -> bool {
    let line = format!("{} {}: {}", CONFLICT_MARKER, field, value);
    if notes.lines().any(|l| l == line) {
        return false;
    }
    if !notes.is_empty() && !notes.ends_with('\n') {
        notes.push('\n');
    }
    notes.push_str(&line);
    true
}

/// Conflict lines found in notes.
pub fn conflicts_in(notes: &str) -> Vec<&str> {
    notes
        .lines()
        .filter(|l| l.starts_with(CONFLICT_MARKER))
        .collect()
}

fn same_text(a: &str, b: &str) -> bool {
    normalize_key(a) == normalize_key(b)
}

fn same_doi(a: &str, b: &str) -> bool {
    normalize_doi(a) == normalize_doi(b)
}

fn same_issn(a: &str, b: &str) -> bool {
    match (normalize_issn(a), normalize_issn(b)) {
        (Some(x), Some(y)) => x == y,
        _ => same_text(a, b),
    }
}

/// Collects conflicts while folding one record into another.
#[derive(Debug, Default)]
struct Folder {
    conflicts: Vec<(&'static str, String)>,
}

impl Folder {
    fn text(&mut self, field: &'static str, current: &mut String, incoming: &str) {
        let incoming = incoming.trim();
        if incoming.is_empty() {
            return;
        }
        if current.trim().is_empty() {
            *current = incoming.to_string();
        } else if !same_text(current, incoming) {
            self.conflicts.push((field, incoming.to_string()));
        }
    }

    fn optional(
        &mut self,
        field: &'static str,
        current: &mut Option<String>,
        incoming: Option<&str>,
        same: fn(&str, &str) -> bool,
    ) {
        let Some(incoming) = non_blank(incoming) else {
            return;
        };
        let existing = non_blank(current.as_deref()).map(str::to_string);
        match existing {
            None => *current = Some(incoming.to_string()),
            Some(existing) if !same(&existing, incoming) => {
                self.conflicts.push((field, incoming.to_string()));
            }
            Some(_) => {}
        }
    }

    fn value<T: PartialEq + Copy + Display>(
        &mut self,
        field: &'static str,
        current: &mut Option<T>,
        incoming: Option<T>,
    ) {
        let Some(incoming) = incoming else {
            return;
        };
        match *current {
            None => *current = Some(incoming),
            Some(existing) if existing != incoming => {
                self.conflicts.push((field, incoming.to_string()));
            }
            Some(_) => {}
        }
    }

    fn finish(self, notes: &mut String, incoming_notes: &str) -> Vec<String> {
        let incoming_notes = incoming_notes.trim();
        if !incoming_notes.is_empty() && !notes.contains(incoming_notes) {
            if !notes.is_empty() && !notes.ends_with('\n') {
                notes.push('\n');
            }
            notes.push_str(incoming_notes);
        }

        let mut recorded = Vec::new();
        for (field, value) in self.conflicts {
            if record_conflict(notes, field, &value) {
                recorded.push(format!("{}: {}", field, value));
            }
        }
        recorded
    }
}

/// Fold an incoming article into the winner. Returns newly recorded conflicts.
pub fn fold_article(winner: &mut Article, incoming: &Article) -> Vec<String> {
    let mut f = Folder::default();
    f.text("title", &mut winner.title, &incoming.title);
    f.value("year", &mut winner.year, incoming.year);
    f.value("month", &mut winner.month, incoming.month);
    f.optional("doi", &mut winner.doi, incoming.doi.as_deref(), same_doi);
    f.text("abstract", &mut winner.abstract_text, &incoming.abstract_text);
    f.text("volume", &mut winner.volume, &incoming.volume);
    f.text("issue", &mut winner.issue, &incoming.issue);
    f.text("pages", &mut winner.pages, &incoming.pages);

    if winner.status == ArticleStatus::Undecided {
        winner.status = incoming.status;
    } else if incoming.status != ArticleStatus::Undecided && incoming.status != winner.status {
        f.conflicts.push(("status", incoming.status.to_string()));
    }
    winner.start_set |= incoming.start_set;

    f.finish(&mut winner.notes, &incoming.notes)
}

/// Fold an incoming author into the winner.
pub fn fold_author(winner: &mut Author, incoming: &Author) -> Vec<String> {
    let mut f = Folder::default();
    f.text("name", &mut winner.name, &incoming.name);
    f.optional(
        "affiliation",
        &mut winner.affiliation,
        incoming.affiliation.as_deref(),
        same_text,
    );
    f.optional("orcid", &mut winner.orcid, incoming.orcid.as_deref(), same_text);
    f.finish(&mut winner.notes, &incoming.notes)
}

/// Fold an incoming periodical into the winner.
pub fn fold_periodical(winner: &mut Periodical, incoming: &Periodical) -> Vec<String> {
    let mut f = Folder::default();
    f.text("name", &mut winner.name, &incoming.name);
    f.optional("issn", &mut winner.issn, incoming.issn.as_deref(), same_issn);
    f.finish(&mut winner.notes, &incoming.notes)
}

/// Fold an incoming keyword into the winner.
pub fn fold_keyword(winner: &mut Keyword, incoming: &Keyword) -> Vec<String> {
    let mut f = Folder::default();
    f.text("label", &mut winner.label, &incoming.label);
    f.finish(&mut winner.notes, &incoming.notes)
}

/// Fold any entity into a winner of the same kind.
///
/// Returns `None` if the kinds differ.
pub fn fold_entity(winner: &mut Entity, incoming: &Entity) -> Option<Vec<String>> {
    match (winner, incoming) {
        (Entity::Article(w), Entity::Article(i)) => Some(fold_article(w, i)),
        (Entity::Author(w), Entity::Author(i)) => Some(fold_author(w, i)),
        (Entity::Periodical(w), Entity::Periodical(i)) => Some(fold_periodical(w, i)),
        (Entity::Keyword(w), Entity::Keyword(i)) => Some(fold_keyword(w, i)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_fills_empty_fields() {
        let mut winner = Article::new("Graph Drawing");
        let mut incoming = Article::new("graph  drawing");
        incoming.year = Some(1991);
        incoming.abstract_text = "Springs and charges.".into();

        let conflicts = fold_article(&mut winner, &incoming);

        assert!(conflicts.is_empty());
        assert_eq!(winner.title, "Graph Drawing");
        assert_eq!(winner.year, Some(1991));
        assert_eq!(winner.abstract_text, "Springs and charges.");
        assert!(winner.notes.is_empty());
    }

    #[test]
    fn test_fold_records_conflict_in_notes() {
        let mut winner = Author::new("Jane Doe");
        winner.affiliation = Some("MIT".into());
        let mut incoming = Author::new("Jane Doe");
        incoming.affiliation = Some("Stanford".into());

        let conflicts = fold_author(&mut winner, &incoming);

        assert_eq!(conflicts, vec!["affiliation: Stanford".to_string()]);
        assert_eq!(winner.affiliation.as_deref(), Some("MIT"));
        assert_eq!(winner.notes, "[merge conflict] affiliation: Stanford");
    }

    #[test]
    fn test_fold_is_idempotent() {
        let mut winner = Article::new("A");
        winner.year = Some(2001);
        let mut incoming = Article::new("A");
        incoming.year = Some(2002);
        incoming.notes = "from crossref".into();

        fold_article(&mut winner, &incoming);
        let once = winner.clone();
        let again = fold_article(&mut winner, &incoming);

        assert!(again.is_empty());
        assert_eq!(winner, once);
        assert_eq!(conflicts_in(&winner.notes), vec!["[merge conflict] year: 2002"]);
    }

    #[test]
    fn test_doi_compared_normalized() {
        let mut winner = Article::new("A");
        winner.doi = Some("10.1/ABC".into());
        let mut incoming = Article::new("A");
        incoming.doi = Some("https://doi.org/10.1/abc".into());

        assert!(fold_article(&mut winner, &incoming).is_empty());
        assert_eq!(winner.doi.as_deref(), Some("10.1/ABC"));
    }

    #[test]
    fn test_status_and_start_set() {
        let mut winner = Article::new("A");
        let mut incoming = Article::new("A");
        incoming.status = ArticleStatus::Included;
        incoming.start_set = true;

        fold_article(&mut winner, &incoming);
        assert_eq!(winner.status, ArticleStatus::Included);
        assert!(winner.start_set);

        incoming.status = ArticleStatus::Excluded;
        let conflicts = fold_article(&mut winner, &incoming);
        assert_eq!(conflicts, vec!["status: excluded".to_string()]);
        assert_eq!(winner.status, ArticleStatus::Included);
    }

    #[test]
    fn test_fold_entity_kind_mismatch() {
        let mut winner: Entity = Keyword::new("x").into();
        let incoming: Entity = Author::new("x").into();
        assert!(fold_entity(&mut winner, &incoming).is_none());
    }
}
