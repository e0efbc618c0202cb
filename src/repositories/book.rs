//! # Book Catalog Store
//!
//! The store collaborator used by the ingest pipeline, and an in-memory
//! implementation of it.

use super::{Repository, RepositoryError, RepositoryResult, RepositoryStats};
use crate::client::{BookRecord, IdentityKey, Page};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Persistence contract for the local book catalog
#[async_trait]
pub trait CatalogStore: Repository {
    /// Whether a record with this ISBN is stored
    async fn exists_by_isbn(&self, isbn: &str) -> RepositoryResult<bool>;

    /// Whether a record with this title and author is stored. Comparison uses
    /// the normalized title/author identity key.
    async fn exists_by_title_author(&self, title: &str, author: &str) -> RepositoryResult<bool>;

    /// Insert `record` if its identity is absent and return the persisted copy.
    ///
    /// The existence check and the insert are one atomic step; a collision
    /// returns [`RepositoryError::ConstraintViolation`].
    async fn save(&self, record: &BookRecord) -> RepositoryResult<BookRecord>;

    /// Case-insensitive substring search over title, author and genre
    async fn search_local(
        &self,
        query: &str,
        page: usize,
        size: usize,
    ) -> RepositoryResult<Page<BookRecord>>;

    async fn count(&self) -> RepositoryResult<u64>;

    async fn find_by_isbn(&self, isbn: &str) -> RepositoryResult<Option<BookRecord>>;

    /// Make completed writes durable
    async fn flush(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

/// Validate `record` and fill the fields owned by the store
pub(crate) fn prepare_for_insert(record: &BookRecord) -> RepositoryResult<BookRecord> {
    if let Some(field) = record.missing_required_field() {
        return Err(RepositoryError::Validation {
            field: field.to_string(),
            message: format!("{field} cannot be empty"),
        });
    }

    let mut stored = record.clone();
    stored.isbn = stored
        .isbn
        .take()
        .map(|isbn| isbn.trim().to_string())
        .filter(|isbn| !isbn.is_empty());
    stored.apply_store_defaults();
    stored.id = Some(Uuid::new_v4());
    stored.created_at = Some(Utc::now());
    Ok(stored)
}

pub(crate) fn matches_query(record: &BookRecord, needle: &str) -> bool {
    needle.is_empty()
        || record.title.to_lowercase().contains(needle)
        || record.author.to_lowercase().contains(needle)
        || record.genre.to_lowercase().contains(needle)
}

/// Slice one page out of an ordered match list
pub(crate) fn paginate(matches: Vec<BookRecord>, page: usize, size: usize) -> Page<BookRecord> {
    let total = matches.len() as u64;
    let content = matches
        .into_iter()
        .skip(page.saturating_mul(size))
        .take(size)
        .collect();
    Page::new(content, page, size, total)
}

#[derive(Debug, Default)]
struct CatalogState {
    /// Records in insertion order
    books: Vec<BookRecord>,
    by_isbn: HashMap<String, usize>,
    title_authors: HashSet<IdentityKey>,
}

impl CatalogState {
    fn collision(&self, record: &BookRecord) -> Option<String> {
        match &record.isbn {
            Some(isbn) if self.by_isbn.contains_key(isbn) => Some(format!("isbn {isbn} already stored")),
            Some(_) => None,
            None => {
                let key = IdentityKey::title_author_of(record);
                self.title_authors
                    .contains(&key)
                    .then(|| format!("{key} already stored"))
            }
        }
    }
}

/// In-memory implementation of [`CatalogStore`]
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    state: Arc<RwLock<CatalogState>>,
    stats: Arc<RwLock<RepositoryStats>>,
}

impl InMemoryCatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn record_operation(&self, start_time: Instant, success: bool) {
        #[allow(clippy::cast_precision_loss)]
        let duration_ms = start_time.elapsed().as_micros() as f64 / 1000.0;
        let mut stats = self.stats.write().await;
        if success {
            stats.record_success(duration_ms);
        } else {
            stats.record_failure(duration_ms);
        }
    }
}

#[async_trait]
impl Repository for InMemoryCatalogStore {
    fn name(&self) -> &'static str {
        "InMemoryCatalogStore"
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(true)
    }

    async fn clear(&self) -> RepositoryResult<()> {
        *self.state.write().await = CatalogState::default();
        *self.stats.write().await = RepositoryStats::new();
        info!("Cleared all books from in-memory catalog");
        Ok(())
    }

    async fn stats(&self) -> RepositoryResult<RepositoryStats> {
        let mut stats = self.stats.read().await.clone();
        stats.total_entities = self.state.read().await.books.len() as u64;
        Ok(stats)
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn exists_by_isbn(&self, isbn: &str) -> RepositoryResult<bool> {
        Ok(self.state.read().await.by_isbn.contains_key(isbn.trim()))
    }

    async fn exists_by_title_author(&self, title: &str, author: &str) -> RepositoryResult<bool> {
        let key = IdentityKey::title_author(title, author);
        Ok(self.state.read().await.title_authors.contains(&key))
    }

    async fn save(&self, record: &BookRecord) -> RepositoryResult<BookRecord> {
        let start_time = Instant::now();

        let stored = match prepare_for_insert(record) {
            Ok(stored) => stored,
            Err(e) => {
                self.record_operation(start_time, false).await;
                return Err(e);
            }
        };

        {
            let mut state = self.state.write().await;
            if let Some(message) = state.collision(&stored) {
                drop(state);
                self.stats.write().await.record_duplicate();
                debug!("Rejected insert of '{}': {}", stored.title, message);
                return Err(RepositoryError::ConstraintViolation { message });
            }

            let index = state.books.len();
            if let Some(isbn) = &stored.isbn {
                state.by_isbn.insert(isbn.clone(), index);
            }
            state.title_authors.insert(IdentityKey::title_author_of(&stored));
            state.books.push(stored.clone());
        }

        self.record_operation(start_time, true).await;
        debug!("Stored book '{}' by {}", stored.title, stored.author);
        Ok(stored)
    }

    async fn search_local(
        &self,
        query: &str,
        page: usize,
        size: usize,
    ) -> RepositoryResult<Page<BookRecord>> {
        let needle = query.trim().to_lowercase();
        let matches: Vec<BookRecord> = self
            .state
            .read()
            .await
            .books
            .iter()
            .filter(|book| matches_query(book, &needle))
            .cloned()
            .collect();

        let page = paginate(matches, page, size);
        debug!(
            "Local search for '{}' matched {} books",
            query, page.total_elements
        );
        Ok(page)
    }

    async fn count(&self) -> RepositoryResult<u64> {
        Ok(self.state.read().await.books.len() as u64)
    }

    async fn find_by_isbn(&self, isbn: &str) -> RepositoryResult<Option<BookRecord>> {
        let state = self.state.read().await;
        Ok(state
            .by_isbn
            .get(isbn.trim())
            .and_then(|&index| state.books.get(index))
            .cloned())
    }
}
