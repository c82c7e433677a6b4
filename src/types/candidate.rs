//! Candidate records submitted to the merge engine.
//!
//! A candidate is an already-parsed, possibly partial record from an import
//! source (CSV export, metadata API response, a reference list). Missing
//! values are represented as empty strings or `None`; partial candidates are
//! valid merge inputs.

use serde::{Deserialize, Serialize};

use super::entity::{Article, Author, Keyword, Periodical};
use super::handle::{EntityKind, Handle};

/// Reference to an article from another candidate's relationship list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleRef {
    /// An article already live in the graph.
    Handle(Handle),
    /// A record to be merged (or created) first.
    Record(Box<ArticleCandidate>),
}

impl From<Handle> for ArticleRef {
    fn from(h: Handle) -> Self {
        Self::Handle(h)
    }
}

impl From<ArticleCandidate> for ArticleRef {
    fn from(c: ArticleCandidate) -> Self {
        Self::Record(Box::new(c))
    }
}

/// Candidate article with declared relationships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleCandidate {
    /// Title.
    pub title: String,
    /// Publication year.
    pub year: Option<i32>,
    /// Publication month (1-12).
    pub month: Option<u8>,
    /// DOI or other persistent identifier.
    pub doi: Option<String>,
    /// Abstract text.
    pub abstract_text: String,
    /// Volume.
    pub volume: String,
    /// Issue.
    pub issue: String,
    /// Page range.
    pub pages: String,
    /// Mark the article as a seed of the review.
    pub start_set: bool,
    /// Notes carried by the source record.
    pub notes: String,
    /// Authors in credited order.
    pub authors: Vec<AuthorCandidate>,
    /// Periodical the article appeared in.
    pub periodical: Option<PeriodicalCandidate>,
    /// Keywords.
    pub keywords: Vec<KeywordCandidate>,
    /// Articles this article cites.
    pub cites: Vec<ArticleRef>,
    /// Articles citing this article.
    pub cited_by: Vec<ArticleRef>,
}

impl ArticleCandidate {
    /// Create a candidate with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the DOI.
    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }

    /// Set the publication year.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Set the abstract.
    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = text.into();
        self
    }

    /// Append an author.
    pub fn with_author(mut self, author: AuthorCandidate) -> Self {
        self.authors.push(author);
        self
    }

    /// Set the periodical.
    pub fn with_periodical(mut self, periodical: PeriodicalCandidate) -> Self {
        self.periodical = Some(periodical);
        self
    }

    /// Append a keyword.
    pub fn with_keyword(mut self, keyword: KeywordCandidate) -> Self {
        self.keywords.push(keyword);
        self
    }

    /// Declare a citation from this article.
    pub fn citing(mut self, target: impl Into<ArticleRef>) -> Self {
        self.cites.push(target.into());
        self
    }

    /// Declare a citation to this article.
    pub fn cited_by(mut self, source: impl Into<ArticleRef>) -> Self {
        self.cited_by.push(source.into());
        self
    }

    /// Mark as seed article.
    pub fn in_start_set(mut self) -> Self {
        self.start_set = true;
        self
    }

    /// Scalar fields of the candidate as an article record.
    pub fn record(&self) -> Article {
        Article {
            title: self.title.clone(),
            year: self.year,
            month: self.month,
            doi: self.doi.clone(),
            abstract_text: self.abstract_text.clone(),
            volume: self.volume.clone(),
            issue: self.issue.clone(),
            pages: self.pages.clone(),
            status: Default::default(),
            start_set: self.start_set,
            notes: self.notes.clone(),
        }
    }

    /// Short description for logs and error reports (DOI if known, else title).
    pub fn describe(&self) -> String {
        match self.doi.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(doi) => format!("doi:{}", doi),
            None => format!("\"{}\"", self.title),
        }
    }
}

/// Candidate author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorCandidate {
    /// Full name.
    pub name: String,
    /// Affiliation.
    pub affiliation: Option<String>,
    /// ORCID or similar identifier.
    pub orcid: Option<String>,
    /// Notes.
    pub notes: String,
}

impl AuthorCandidate {
    /// Create a candidate with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the affiliation.
    pub fn with_affiliation(mut self, affiliation: impl Into<String>) -> Self {
        self.affiliation = Some(affiliation.into());
        self
    }

    /// Set the ORCID.
    pub fn with_orcid(mut self, orcid: impl Into<String>) -> Self {
        self.orcid = Some(orcid.into());
        self
    }

    /// The candidate as an author record.
    pub fn record(&self) -> Author {
        Author {
            name: self.name.clone(),
            affiliation: self.affiliation.clone(),
            orcid: self.orcid.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Candidate periodical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodicalCandidate {
    /// Name.
    pub name: String,
    /// ISSN.
    pub issn: Option<String>,
    /// Notes.
    pub notes: String,
}

impl PeriodicalCandidate {
    /// Create a candidate with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the ISSN.
    pub fn with_issn(mut self, issn: impl Into<String>) -> Self {
        self.issn = Some(issn.into());
        self
    }

    /// The candidate as a periodical record.
    pub fn record(&self) -> Periodical {
        Periodical {
            name: self.name.clone(),
            issn: self.issn.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Candidate keyword.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordCandidate {
    /// Label.
    pub label: String,
    /// Notes.
    pub notes: String,
}

impl KeywordCandidate {
    /// Create a candidate with a label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// The candidate as a keyword record.
    pub fn record(&self) -> Keyword {
        Keyword {
            label: self.label.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Any candidate record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Candidate {
    /// Article candidate.
    Article(ArticleCandidate),
    /// Author candidate.
    Author(AuthorCandidate),
    /// Periodical candidate.
    Periodical(PeriodicalCandidate),
    /// Keyword candidate.
    Keyword(KeywordCandidate),
}

impl Candidate {
    /// Kind of entity this candidate describes.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Article(_) => EntityKind::Article,
            Self::Author(_) => EntityKind::Author,
            Self::Periodical(_) => EntityKind::Periodical,
            Self::Keyword(_) => EntityKind::Keyword,
        }
    }

    /// Short description for logs and error reports.
    pub fn describe(&self) -> String {
        match self {
            Self::Article(a) => a.describe(),
            Self::Author(a) => a.name.clone(),
            Self::Periodical(p) => p.name.clone(),
            Self::Keyword(k) => k.label.clone(),
        }
    }
}

impl From<ArticleCandidate> for Candidate {
    fn from(c: ArticleCandidate) -> Self {
        Self::Article(c)
    }
}

impl From<AuthorCandidate> for Candidate {
    fn from(c: AuthorCandidate) -> Self {
        Self::Author(c)
    }
}

impl From<PeriodicalCandidate> for Candidate {
    fn from(c: PeriodicalCandidate) -> Self {
        Self::Periodical(c)
    }
}

impl From<KeywordCandidate> for Candidate {
    fn from(c: KeywordCandidate) -> Self {
        Self::Keyword(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_declares_relationships() {
        let c = ArticleCandidate::new("B")
            .with_doi("10.1/b")
            .citing(ArticleCandidate::new("A").with_doi("10.1/a"))
            .with_author(AuthorCandidate::new("Jane Doe"));

        assert_eq!(c.cites.len(), 1);
        assert_eq!(c.authors[0].name, "Jane Doe");
        assert_eq!(c.describe(), "doi:10.1/b");
    }

    #[test]
    fn test_describe_falls_back_to_title() {
        let c = ArticleCandidate::new("Untitled draft").with_doi("  ");
        assert_eq!(c.describe(), "\"Untitled draft\"");
    }

    #[test]
    fn test_candidate_json_shape() {
        let json = r#"{
            "kind": "article",
            "title": "B",
            "doi": "10.1/b",
            "cites": [{"handle": 3}, {"record": {"title": "A"}}]
        }"#;
        let c: Candidate = serde_json::from_str(json).unwrap();
        match c {
            Candidate::Article(a) => {
                assert_eq!(a.cites[0], ArticleRef::Handle(Handle::from_raw(3)));
                assert!(matches!(&a.cites[1], ArticleRef::Record(r) if r.title == "A"));
            }
            other => panic!("unexpected candidate {:?}", other),
        }
    }
}
