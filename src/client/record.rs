//! Canonical, provider-agnostic book record and its identity key.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const TITLE_MAX_LEN: usize = 490;
pub const AUTHOR_MAX_LEN: usize = 490;
pub const DESCRIPTION_MAX_LEN: usize = 4000;
pub const COVER_URL_MAX_LEN: usize = 990;
pub const GENRE_MAX_LEN: usize = 190;
pub const PUBLISHER_MAX_LEN: usize = 490;
pub const LANGUAGE_MAX_LEN: usize = 10;

pub const UNKNOWN_AUTHOR: &str = "Unknown";
pub const DEFAULT_GENRE: &str = "General";
pub const DEFAULT_LANGUAGE: &str = "en";

/// Book metadata as stored in the local catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    /// Store-issued identifier, `None` until persisted
    pub id: Option<Uuid>,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub genre: String,
    pub published_date: Option<NaiveDate>,
    pub page_count: Option<u32>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<u32>,
    /// Set by the store on insert
    pub created_at: Option<DateTime<Utc>>,
}

impl BookRecord {
    /// Minimal record with the three required fields
    #[must_use]
    pub fn new(title: impl Into<String>, author: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            author: author.into(),
            isbn: None,
            description: None,
            cover_url: None,
            genre: genre.into(),
            published_date: None,
            page_count: None,
            publisher: None,
            language: None,
            average_rating: None,
            ratings_count: None,
            created_at: None,
        }
    }

    #[must_use]
    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    /// Identity key used for deduplication
    #[must_use]
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::for_record(self)
    }

    /// Name of the first missing required field, if any
    #[must_use]
    pub fn missing_required_field(&self) -> Option<&'static str> {
        if self.title.trim().is_empty() {
            Some("title")
        } else if self.author.trim().is_empty() {
            Some("author")
        } else if self.genre.trim().is_empty() {
            Some("genre")
        } else {
            None
        }
    }

    /// Fill the defaults applied at the persistence boundary
    pub fn apply_store_defaults(&mut self) {
        self.average_rating.get_or_insert(0.0);
        self.ratings_count.get_or_insert(0);
        if self.language.as_deref().map_or(true, |l| l.trim().is_empty()) {
            self.language = Some(DEFAULT_LANGUAGE.to_string());
        }
    }
}

/// Deterministic key deciding whether two records denote the same book.
///
/// ISBN is authoritative when present; otherwise the lower-cased,
/// alphanumeric-only title and author are joined with `|`. Letters and
/// digits of any script are kept, so non-Latin titles stay distinct;
/// punctuation, whitespace and combining marks are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityKey {
    Isbn(String),
    TitleAuthor(String),
}

impl IdentityKey {
    #[must_use]
    pub fn for_record(record: &BookRecord) -> Self {
        match record.isbn.as_deref().filter(|isbn| !isbn.trim().is_empty()) {
            Some(isbn) => Self::Isbn(isbn.to_string()),
            None => Self::title_author(&record.title, &record.author),
        }
    }

    #[must_use]
    pub fn title_author(title: &str, author: &str) -> Self {
        Self::TitleAuthor(format!(
            "{}|{}",
            normalize_component(title),
            normalize_component(author)
        ))
    }

    /// The `title|author` key regardless of ISBN
    #[must_use]
    pub fn title_author_of(record: &BookRecord) -> Self {
        Self::title_author(&record.title, &record.author)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Isbn(value) | Self::TitleAuthor(value) => value,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isbn(isbn) => write!(f, "isbn:{isbn}"),
            Self::TitleAuthor(pair) => write!(f, "title-author:{pair}"),
        }
    }
}

fn normalize_component(value: &str) -> String {
    value
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// One page of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    /// Zero-based page index
    pub page: usize,
    pub size: usize,
    /// Reported element count. For augmented pages this is the size of the
    /// combined in-memory set, not a store-wide count.
    pub total_elements: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn new(content: Vec<T>, page: usize, size: usize, total_elements: u64) -> Self {
        Self {
            content,
            page,
            size,
            total_elements,
        }
    }

    #[must_use]
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            0
        } else {
            self.total_elements.div_ceil(self.size as u64)
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_isbn_key_collapses_case_and_punctuation() {
        let a = BookRecord::new("The Hobbit", "J.R.R. Tolkien", DEFAULT_GENRE);
        let b = BookRecord::new("the hobbit!", "J.R.R. Tolkien", DEFAULT_GENRE);
        assert_eq!(a.identity_key(), b.identity_key());
        assert_eq!(a.identity_key().as_str(), "thehobbit|jrrtolkien");
    }

    #[test]
    fn test_non_latin_titles_keep_distinct_keys() {
        let war = BookRecord::new("Война и мир", "Лев Толстой", DEFAULT_GENRE);
        let anna = BookRecord::new("Анна Каренина", "Лев Толстой", DEFAULT_GENRE);
        assert_ne!(war.identity_key(), anna.identity_key());
        assert_eq!(war.identity_key().as_str(), "войнаимир|левтолстой");

        let shouted = BookRecord::new("ВОЙНА И МИР!", "лев толстой", DEFAULT_GENRE);
        assert_eq!(war.identity_key(), shouted.identity_key());

        let kokoro = BookRecord::new("こころ", "夏目漱石", DEFAULT_GENRE);
        assert_eq!(kokoro.identity_key().as_str(), "こころ|夏目漱石");
    }

    #[test]
    fn test_isbn_is_authoritative() {
        let a = BookRecord::new("Dune", "Frank Herbert", "Science Fiction").with_isbn("9780441172719");
        let b = BookRecord::new("Dune", "Frank Herbert", "Science Fiction").with_isbn("9780593099322");
        assert_ne!(a.identity_key(), b.identity_key());
        assert_eq!(a.identity_key(), IdentityKey::Isbn("9780441172719".to_string()));
    }

    #[test]
    fn test_blank_isbn_falls_back_to_title_author() {
        let record = BookRecord::new("Dune", "Frank Herbert", "Science Fiction").with_isbn(" ");
        assert!(matches!(record.identity_key(), IdentityKey::TitleAuthor(_)));
    }

    #[test]
    fn test_missing_required_field() {
        assert_eq!(BookRecord::new(" ", "a", "g").missing_required_field(), Some("title"));
        assert_eq!(BookRecord::new("t", "", "g").missing_required_field(), Some("author"));
        assert_eq!(BookRecord::new("t", "a", "").missing_required_field(), Some("genre"));
        assert_eq!(BookRecord::new("t", "a", "g").missing_required_field(), None);
    }

    #[test]
    fn test_store_defaults() {
        let mut record = BookRecord::new("t", "a", "g");
        record.ratings_count = Some(12);
        record.apply_store_defaults();
        assert_eq!(record.average_rating, Some(0.0));
        assert_eq!(record.ratings_count, Some(12));
        assert_eq!(record.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_total_pages() {
        let page: Page<u8> = Page::new(vec![1, 2], 0, 20, 41);
        assert_eq!(page.total_pages(), 3);
        assert_eq!(Page::<u8>::new(Vec::new(), 0, 0, 0).total_pages(), 0);
    }
}
