//! Conversion of raw provider payloads into [`BookRecord`]s.
//!
//! Normalization is pure: no I/O, no persistence. A payload without a title
//! yields `None`, which callers treat as a skip rather than an error.

use crate::client::providers::google_books::GoogleVolumeInfo;
use crate::client::providers::open_library::OpenLibraryDoc;
use crate::client::providers::RawPayload;
use crate::client::record::{
    BookRecord, AUTHOR_MAX_LEN, COVER_URL_MAX_LEN, DEFAULT_GENRE, DEFAULT_LANGUAGE,
    DESCRIPTION_MAX_LEN, GENRE_MAX_LEN, LANGUAGE_MAX_LEN, PUBLISHER_MAX_LEN, TITLE_MAX_LEN,
    UNKNOWN_AUTHOR,
};
use crate::config::CoverConfig;
use chrono::NaiveDate;
use tracing::debug;

const ELLIPSIS: &str = "...";

/// Hard character cap with an ellipsis suffix.
///
/// Strings longer than `max_len` characters come back exactly `max_len`
/// characters long, ending in `...`.
#[must_use]
pub fn truncate(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        return value.to_string();
    }
    let keep = max_len.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = value.chars().take(keep).collect();
    truncated.push_str(&ELLIPSIS[..max_len.min(ELLIPSIS.len())]);
    truncated
}

fn truncate_opt(value: Option<&str>, max_len: usize) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| truncate(v, max_len))
}

/// Parse a provider date with degrading precision.
///
/// `YYYY` becomes January 1st, `YYYY-MM` the first of the month, and
/// `YYYY-MM-DD` is taken as is. Anything else yields `None`.
#[must_use]
pub fn parse_published_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    // signed or short years are not dates
    if !value
        .get(..4)
        .is_some_and(|year| year.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    match value.len() {
        4 => value
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        7 => NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").ok(),
        _ => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
    }
}

/// ISBN kind as reported or inferred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IsbnKind {
    Isbn13,
    Isbn10,
}

/// First ISBN-13 wins outright; an ISBN-10 is only a placeholder until one shows up.
fn select_isbn<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = (IsbnKind, &'a str)>,
{
    let mut selected: Option<&str> = None;
    for (kind, value) in candidates {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match kind {
            IsbnKind::Isbn13 => return Some(value.to_string()),
            IsbnKind::Isbn10 if selected.is_none() => selected = Some(value),
            IsbnKind::Isbn10 => {}
        }
    }
    selected.map(str::to_string)
}

fn infer_isbn_kind(value: &str) -> Option<IsbnKind> {
    let compact: Vec<char> = value.chars().filter(|c| *c != '-' && *c != ' ').collect();
    match compact.len() {
        13 if compact.iter().all(char::is_ascii_digit) => Some(IsbnKind::Isbn13),
        10 if compact[..9].iter().all(char::is_ascii_digit)
            && (compact[9].is_ascii_digit() || compact[9] == 'X' || compact[9] == 'x') =>
        {
            Some(IsbnKind::Isbn10)
        }
        _ => None,
    }
}

/// Converts raw payloads into canonical records
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    cover_base_url: String,
    cover_size: String,
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::new(&CoverConfig::default())
    }
}

impl RecordNormalizer {
    #[must_use]
    pub fn new(covers: &CoverConfig) -> Self {
        Self {
            cover_base_url: covers.base_url.trim_end_matches('/').to_string(),
            cover_size: covers.size.clone(),
        }
    }

    /// Cover image URL on the image server, keyed by ISBN
    #[must_use]
    pub fn cover_url_by_isbn(&self, isbn: &str) -> String {
        format!(
            "{}/b/isbn/{}-{}.jpg",
            self.cover_base_url,
            urlencoding::encode(isbn),
            self.cover_size
        )
    }

    /// Cover image URL on the image server, keyed by numeric cover id
    #[must_use]
    pub fn cover_url_by_id(&self, cover_id: i64) -> String {
        format!("{}/b/id/{}-{}.jpg", self.cover_base_url, cover_id, self.cover_size)
    }

    /// Normalize one payload; `None` means the payload is skipped
    #[must_use]
    pub fn normalize(&self, payload: &RawPayload) -> Option<BookRecord> {
        let record = match payload {
            RawPayload::GoogleBooks(info) => self.from_google(info),
            RawPayload::OpenLibrary(doc) => self.from_open_library(doc),
        };
        if record.is_none() {
            debug!("Skipping untitled {} payload", payload.provider());
        }
        record
    }

    /// Normalize a batch, dropping skipped payloads
    #[must_use]
    pub fn normalize_all(&self, payloads: &[RawPayload]) -> Vec<BookRecord> {
        payloads.iter().filter_map(|p| self.normalize(p)).collect()
    }

    fn from_google(&self, info: &GoogleVolumeInfo) -> Option<BookRecord> {
        let title = truncate_opt(info.title.as_deref(), TITLE_MAX_LEN)?;

        let isbn = select_isbn(info.industry_identifiers.iter().filter_map(|id| {
            match id.kind.as_str() {
                "ISBN_13" => Some((IsbnKind::Isbn13, id.identifier.as_str())),
                "ISBN_10" => Some((IsbnKind::Isbn10, id.identifier.as_str())),
                _ => None,
            }
        }));

        let cover_url = info
            .image_links
            .as_ref()
            .and_then(|links| links.thumbnail.as_deref())
            .filter(|thumb| !thumb.trim().is_empty())
            .map(upgrade_thumbnail)
            .or_else(|| isbn.as_deref().map(|isbn| self.cover_url_by_isbn(isbn)));

        let mut record = BookRecord::new(title, join_authors(&info.authors), first_genre(&info.categories));
        record.isbn = isbn;
        record.description = truncate_opt(info.description.as_deref(), DESCRIPTION_MAX_LEN);
        record.cover_url = cover_url.map(|url| truncate(&url, COVER_URL_MAX_LEN));
        record.published_date = info.published_date.as_deref().and_then(parse_published_date);
        record.page_count = info.page_count;
        record.publisher = truncate_opt(info.publisher.as_deref(), PUBLISHER_MAX_LEN);
        record.language = Some(truncate(
            info.language
                .as_deref()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or(DEFAULT_LANGUAGE),
            LANGUAGE_MAX_LEN,
        ));
        record.average_rating = info.average_rating;
        record.ratings_count = info.ratings_count;
        Some(record)
    }

    fn from_open_library(&self, doc: &OpenLibraryDoc) -> Option<BookRecord> {
        let title = truncate_opt(doc.title.as_deref(), TITLE_MAX_LEN)?;

        let isbn = select_isbn(
            doc.isbn
                .iter()
                .filter_map(|value| infer_isbn_kind(value).map(|kind| (kind, value.as_str()))),
        );

        // No provider thumbnail here: ISBN first, then the numeric cover id
        let cover_url = isbn
            .as_deref()
            .map(|isbn| self.cover_url_by_isbn(isbn))
            .or_else(|| doc.cover_id.map(|id| self.cover_url_by_id(id)));

        let mut record = BookRecord::new(title, join_authors(&doc.author_name), first_genre(&doc.subject));
        record.isbn = isbn;
        record.cover_url = cover_url.map(|url| truncate(&url, COVER_URL_MAX_LEN));
        record.published_date = doc
            .first_publish_year
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1));
        record.page_count = doc.number_of_pages_median;
        record.publisher = truncate_opt(doc.publisher.first().map(String::as_str), PUBLISHER_MAX_LEN);
        record.language = Some(DEFAULT_LANGUAGE.to_string());
        record.average_rating = doc.ratings_average;
        record.ratings_count = doc.ratings_count;
        Some(record)
    }
}

/// Force https and request the larger zoom level
fn upgrade_thumbnail(url: &str) -> String {
    url.trim()
        .replace("http://", "https://")
        .replace("zoom=1", "zoom=2")
}

fn join_authors(authors: &[String]) -> String {
    let joined = authors
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        UNKNOWN_AUTHOR.to_string()
    } else {
        truncate(&joined, AUTHOR_MAX_LEN)
    }
}

fn first_genre(tags: &[String]) -> String {
    tags.iter()
        .map(|t| t.trim())
        .find(|t| !t.is_empty())
        .map_or_else(|| DEFAULT_GENRE.to_string(), |t| truncate(t, GENRE_MAX_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::providers::google_books::{ImageLinks, IndustryIdentifier};

    fn identifier(kind: &str, value: &str) -> IndustryIdentifier {
        IndustryIdentifier {
            kind: kind.to_string(),
            identifier: value.to_string(),
        }
    }

    #[test]
    fn test_truncate_long_description() {
        let long = "a".repeat(5000);
        let truncated = truncate(&long, DESCRIPTION_MAX_LEN);
        assert_eq!(truncated.chars().count(), 4000);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_truncate_short_unchanged() {
        assert_eq!(truncate("ten chars!", DESCRIPTION_MAX_LEN), "ten chars!");
        assert_eq!(truncate("exactly", 7), "exactly");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let value = "é".repeat(20);
        let truncated = truncate(&value, 10);
        assert_eq!(truncated.chars().count(), 10);
        assert!(truncated.starts_with("ééééééé"));
    }

    #[test]
    fn test_date_precision_degradation() {
        assert_eq!(parse_published_date("1965"), NaiveDate::from_ymd_opt(1965, 1, 1));
        assert_eq!(parse_published_date("2012-06"), NaiveDate::from_ymd_opt(2012, 6, 1));
        assert_eq!(parse_published_date("2012-06-05"), NaiveDate::from_ymd_opt(2012, 6, 5));
        assert_eq!(parse_published_date("unknown"), None);
        assert_eq!(parse_published_date("2012-13"), None);
        assert_eq!(parse_published_date(""), None);
    }

    #[test]
    fn test_year_must_be_four_digits() {
        assert_eq!(parse_published_date("+123"), None);
        assert_eq!(parse_published_date("-999"), None);
        assert_eq!(parse_published_date("19 5"), None);
        assert_eq!(parse_published_date("+123-06"), None);
        assert_eq!(parse_published_date("+1234-06-05"), None);
        assert_eq!(parse_published_date(" 0042 "), NaiveDate::from_ymd_opt(42, 1, 1));
    }

    #[test]
    fn test_isbn13_wins_over_earlier_isbn10() {
        let info = GoogleVolumeInfo {
            title: Some("The Hobbit".to_string()),
            industry_identifiers: vec![
                identifier("ISBN_10", "0618002219"),
                identifier("OTHER", "UOM:39015"),
                identifier("ISBN_13", "9780618002214"),
            ],
            ..GoogleVolumeInfo::default()
        };
        let record = RecordNormalizer::default()
            .normalize(&RawPayload::GoogleBooks(info))
            .unwrap();
        assert_eq!(record.isbn.as_deref(), Some("9780618002214"));
    }

    #[test]
    fn test_isbn10_kept_without_isbn13() {
        let info = GoogleVolumeInfo {
            title: Some("The Hobbit".to_string()),
            industry_identifiers: vec![identifier("ISBN_10", "0618002219")],
            ..GoogleVolumeInfo::default()
        };
        let record = RecordNormalizer::default()
            .normalize(&RawPayload::GoogleBooks(info))
            .unwrap();
        assert_eq!(record.isbn.as_deref(), Some("0618002219"));
    }

    #[test]
    fn test_google_defaults_and_thumbnail_upgrade() {
        let info = GoogleVolumeInfo {
            title: Some("Dune".to_string()),
            authors: vec!["Frank Herbert".to_string(), "Brian Herbert".to_string()],
            image_links: Some(ImageLinks {
                small_thumbnail: None,
                thumbnail: Some("http://books.google.com/books/content?id=B1hSG&zoom=1&source=gbs_api".to_string()),
            }),
            published_date: Some("1965".to_string()),
            ..GoogleVolumeInfo::default()
        };
        let record = RecordNormalizer::default()
            .normalize(&RawPayload::GoogleBooks(info))
            .unwrap();
        assert_eq!(record.author, "Frank Herbert, Brian Herbert");
        assert_eq!(record.genre, "General");
        assert_eq!(record.language.as_deref(), Some("en"));
        assert_eq!(
            record.cover_url.as_deref(),
            Some("https://books.google.com/books/content?id=B1hSG&zoom=2&source=gbs_api")
        );
        assert_eq!(record.published_date, NaiveDate::from_ymd_opt(1965, 1, 1));
    }

    #[test]
    fn test_google_cover_falls_back_to_isbn() {
        let info = GoogleVolumeInfo {
            title: Some("Dune".to_string()),
            industry_identifiers: vec![identifier("ISBN_13", "9780441172719")],
            categories: vec!["Fiction / Science Fiction".to_string()],
            ..GoogleVolumeInfo::default()
        };
        let record = RecordNormalizer::default()
            .normalize(&RawPayload::GoogleBooks(info))
            .unwrap();
        assert_eq!(
            record.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/isbn/9780441172719-L.jpg")
        );
        assert_eq!(record.author, "Unknown");
        assert_eq!(record.genre, "Fiction / Science Fiction");
    }

    #[test]
    fn test_untitled_payload_is_skipped() {
        let normalizer = RecordNormalizer::default();
        assert!(normalizer
            .normalize(&RawPayload::GoogleBooks(GoogleVolumeInfo::default()))
            .is_none());
        let blank = OpenLibraryDoc {
            title: Some("   ".to_string()),
            ..OpenLibraryDoc::default()
        };
        assert!(normalizer.normalize(&RawPayload::OpenLibrary(blank)).is_none());
    }

    #[test]
    fn test_open_library_cover_by_id_without_isbn() {
        let doc = OpenLibraryDoc {
            title: Some("Percy Jackson".to_string()),
            author_name: vec!["Rick Riordan".to_string()],
            cover_id: Some(7_311_061),
            first_publish_year: Some(2005),
            ..OpenLibraryDoc::default()
        };
        let record = RecordNormalizer::default()
            .normalize(&RawPayload::OpenLibrary(doc))
            .unwrap();
        assert_eq!(
            record.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/7311061-L.jpg")
        );
        assert_eq!(record.published_date, NaiveDate::from_ymd_opt(2005, 1, 1));
        assert!(record.isbn.is_none());
    }

    #[test]
    fn test_open_library_prefers_isbn13_from_mixed_list() {
        let doc = OpenLibraryDoc {
            title: Some("The Fellowship of the Ring".to_string()),
            isbn: vec![
                "not-an-isbn".to_string(),
                "0261103571".to_string(),
                "9780261103573".to_string(),
            ],
            cover_id: Some(1),
            subject: vec!["Fantasy".to_string()],
            publisher: vec!["HarperCollins".to_string()],
            ..OpenLibraryDoc::default()
        };
        let record = RecordNormalizer::default()
            .normalize(&RawPayload::OpenLibrary(doc))
            .unwrap();
        assert_eq!(record.isbn.as_deref(), Some("9780261103573"));
        assert_eq!(
            record.cover_url.as_deref(),
            Some("https://covers.openlibrary.org/b/isbn/9780261103573-L.jpg")
        );
        assert_eq!(record.genre, "Fantasy");
        assert_eq!(record.publisher.as_deref(), Some("HarperCollins"));
    }

    #[test]
    fn test_long_fields_are_capped() {
        let info = GoogleVolumeInfo {
            title: Some("t".repeat(600)),
            categories: vec!["g".repeat(300)],
            language: Some("en-GB-oxendict".to_string()),
            ..GoogleVolumeInfo::default()
        };
        let record = RecordNormalizer::default()
            .normalize(&RawPayload::GoogleBooks(info))
            .unwrap();
        assert_eq!(record.title.chars().count(), TITLE_MAX_LEN);
        assert_eq!(record.genre.chars().count(), GENRE_MAX_LEN);
        assert_eq!(record.language.as_deref().map(str::len), Some(LANGUAGE_MAX_LEN));
    }
}
