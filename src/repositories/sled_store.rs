//! Embedded on-disk catalog backed by sled.
//!
//! Layout: `books` maps a monotonic big-endian id to a bincode record;
//! `isbn_index` and `title_author_index` map identity keys to that id. An
//! insert touches all three trees in one transaction.
//!
//! sled calls block, so every tree access runs on the blocking pool against a
//! cloned handle.

use super::book::{matches_query, paginate, prepare_for_insert, CatalogStore};
use super::{Repository, RepositoryError, RepositoryResult, RepositoryStats};
use crate::client::{BookRecord, IdentityKey, Page};
use async_trait::async_trait;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

fn storage_error(err: sled::Error) -> RepositoryError {
    RepositoryError::Storage {
        message: err.to_string(),
    }
}

fn join_error(err: tokio::task::JoinError) -> RepositoryError {
    RepositoryError::Storage {
        message: format!("blocking store task failed: {err}"),
    }
}

fn decode(bytes: &[u8]) -> RepositoryResult<BookRecord> {
    bincode::deserialize(bytes).map_err(|e| RepositoryError::Serialization {
        message: e.to_string(),
    })
}

/// sled implementation of [`CatalogStore`]
#[derive(Debug, Clone)]
pub struct SledCatalogStore {
    db: sled::Db,
    books: sled::Tree,
    isbn_index: sled::Tree,
    title_author_index: sled::Tree,
    stats: Arc<RwLock<RepositoryStats>>,
}

impl SledCatalogStore {
    /// Open (or create) a catalog at `path`
    pub fn open(path: impl AsRef<Path>) -> RepositoryResult<Self> {
        let path = path.as_ref();
        info!("Opening catalog store at {}", path.display());
        let db = sled::open(path).map_err(storage_error)?;
        Self::from_db(db)
    }

    /// Catalog removed when the last handle is dropped
    pub fn temporary() -> RepositoryResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(storage_error)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> RepositoryResult<Self> {
        Ok(Self {
            books: db.open_tree("books").map_err(storage_error)?,
            isbn_index: db.open_tree("isbn_index").map_err(storage_error)?,
            title_author_index: db.open_tree("title_author_index").map_err(storage_error)?,
            db,
            stats: Arc::new(RwLock::new(RepositoryStats::new())),
        })
    }

    /// Run `op` on the blocking pool against a clone of this handle
    async fn blocking<T, F>(&self, op: F) -> RepositoryResult<T>
    where
        F: FnOnce(Self) -> RepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(store))
            .await
            .map_err(join_error)?
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

    fn insert_transaction(
        &self,
        key: &[u8],
        value: &[u8],
        record: &BookRecord,
    ) -> RepositoryResult<()> {
        let title_author = IdentityKey::title_author_of(record);

        let result = (&self.books, &self.isbn_index, &self.title_author_index).transaction(
            |(books, isbn_index, title_author_index)| {
                match &record.isbn {
                    Some(isbn) => {
                        if isbn_index.get(isbn.as_bytes())?.is_some() {
                            return Err(ConflictableTransactionError::Abort(format!(
                                "isbn {isbn} already stored"
                            )));
                        }
                        isbn_index.insert(isbn.as_bytes(), key)?;
                    }
                    None => {
                        if title_author_index
                            .get(title_author.as_str().as_bytes())?
                            .is_some()
                        {
                            return Err(ConflictableTransactionError::Abort(format!(
                                "{title_author} already stored"
                            )));
                        }
                    }
                }
                title_author_index.insert(title_author.as_str().as_bytes(), key)?;
                books.insert(key, value)?;
                Ok(())
            },
        );

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(message)) => {
                Err(RepositoryError::ConstraintViolation { message })
            }
            Err(TransactionError::Storage(e)) => Err(storage_error(e)),
        }
    }
}

#[async_trait]
impl Repository for SledCatalogStore {
    fn name(&self) -> &'static str {
        "SledCatalogStore"
    }

    async fn health_check(&self) -> RepositoryResult<bool> {
        self.blocking(|store| Ok(store.books.first().is_ok())).await
    }

    async fn clear(&self) -> RepositoryResult<()> {
        self.blocking(|store| {
            store.books.clear().map_err(storage_error)?;
            store.isbn_index.clear().map_err(storage_error)?;
            store.title_author_index.clear().map_err(storage_error)
        })
        .await?;
        *self.stats.write().await = RepositoryStats::new();
        info!("Cleared all books from sled catalog");
        Ok(())
    }

    async fn stats(&self) -> RepositoryResult<RepositoryStats> {
        let (total, size) = self
            .blocking(|store| Ok((store.books.len() as u64, store.db.size_on_disk().ok())))
            .await?;
        let mut stats = self.stats.read().await.clone();
        stats.total_entities = total;
        stats.storage_size_bytes = size;
        Ok(stats)
    }
}

#[async_trait]
impl CatalogStore for SledCatalogStore {
    async fn exists_by_isbn(&self, isbn: &str) -> RepositoryResult<bool> {
        let isbn = isbn.trim().to_string();
        self.blocking(move |store| {
            store
                .isbn_index
                .contains_key(isbn.as_bytes())
                .map_err(storage_error)
        })
        .await
    }

    async fn exists_by_title_author(&self, title: &str, author: &str) -> RepositoryResult<bool> {
        let key = IdentityKey::title_author(title, author);
        self.blocking(move |store| {
            store
                .title_author_index
                .contains_key(key.as_str().as_bytes())
                .map_err(storage_error)
        })
        .await
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

        let value = bincode::serialize(&stored).map_err(|e| RepositoryError::Serialization {
            message: e.to_string(),
        })?;

        let record = stored.clone();
        let inserted = self
            .blocking(move |store| {
                let key = store.db.generate_id().map_err(storage_error)?.to_be_bytes();
                store.insert_transaction(&key, &value, &record)
            })
            .await;

        match inserted {
            Ok(()) => {
                self.record_operation(start_time, true).await;
                debug!("Stored book '{}' by {}", stored.title, stored.author);
                Ok(stored)
            }
            Err(e @ RepositoryError::ConstraintViolation { .. }) => {
                self.stats.write().await.record_duplicate();
                debug!("Rejected insert of '{}': {}", stored.title, e);
                Err(e)
            }
            Err(e) => {
                self.record_operation(start_time, false).await;
                error!("Failed to store '{}': {}", stored.title, e);
                Err(e)
            }
        }
    }

    async fn search_local(
        &self,
        query: &str,
        page: usize,
        size: usize,
    ) -> RepositoryResult<Page<BookRecord>> {
        let needle = query.trim().to_lowercase();
        let matches = self
            .blocking(move |store| {
                let mut matches = Vec::new();
                for entry in store.books.iter() {
                    let (_, value) = entry.map_err(storage_error)?;
                    let book = decode(&value)?;
                    if matches_query(&book, &needle) {
                        matches.push(book);
                    }
                }
                Ok(matches)
            })
            .await?;

        Ok(paginate(matches, page, size))
    }

    async fn count(&self) -> RepositoryResult<u64> {
        self.blocking(|store| Ok(store.books.len() as u64)).await
    }

    async fn find_by_isbn(&self, isbn: &str) -> RepositoryResult<Option<BookRecord>> {
        let isbn = isbn.trim().to_string();
        self.blocking(move |store| {
            let Some(key) = store
                .isbn_index
                .get(isbn.as_bytes())
                .map_err(storage_error)?
            else {
                return Ok(None);
            };

            store
                .books
                .get(key)
                .map_err(storage_error)?
                .map(|value| decode(&value))
                .transpose()
        })
        .await
    }

    async fn flush(&self) -> RepositoryResult<()> {
        self.db.flush_async().await.map_err(storage_error)?;
        Ok(())
    }
}
