//! Identity resolution and deduplication.

use crate::client::{BookRecord, IdentityKey};
use crate::repositories::{CatalogStore, RepositoryError, RepositoryResult};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, error};

/// Outcome of running a candidate record through the deduplicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdmitDecision {
    /// New book: the only case in which the caller persists
    Accepted,
    /// Same identity key already accepted in this run
    DuplicateInBatch,
    /// Same identity already in the catalog store
    DuplicateInStore,
}

/// Result of [`IdentityResolver::admit_and_save`]
#[derive(Debug, Clone)]
pub enum SaveOutcome {
    Saved(BookRecord),
    Skipped(AdmitDecision),
    /// The store rejected the write for a reason other than a duplicate
    StoreFailed(String),
}

/// Batch-local deduplicator backed by the catalog store's existence checks.
///
/// A record with an ISBN is checked against the store by ISBN only; a record
/// without one is checked by its normalized title and author.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    accepted: HashSet<IdentityKey>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver whose batch already contains `records`
    #[must_use]
    pub fn seeded<'a>(records: impl IntoIterator<Item = &'a BookRecord>) -> Self {
        Self {
            accepted: records.into_iter().map(BookRecord::identity_key).collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.accepted.contains(key)
    }

    /// Number of identity keys accepted so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Decide whether `record` is new. Does not mark it accepted.
    pub async fn admit(
        &self,
        record: &BookRecord,
        store: &dyn CatalogStore,
    ) -> RepositoryResult<AdmitDecision> {
        let key = record.identity_key();
        if self.accepted.contains(&key) {
            return Ok(AdmitDecision::DuplicateInBatch);
        }

        let exists = match &key {
            IdentityKey::Isbn(isbn) => store.exists_by_isbn(isbn).await?,
            IdentityKey::TitleAuthor(_) => {
                store
                    .exists_by_title_author(&record.title, &record.author)
                    .await?
            }
        };

        Ok(if exists {
            AdmitDecision::DuplicateInStore
        } else {
            AdmitDecision::Accepted
        })
    }

    /// Mark `record` as accepted in this batch
    pub fn confirm(&mut self, record: &BookRecord) {
        self.accepted.insert(record.identity_key());
    }

    /// Admit, then persist accepted records.
    ///
    /// An insert that loses a race to a concurrent writer comes back from the
    /// store as a constraint violation and is reported as `DuplicateInStore`.
    pub async fn admit_and_save(
        &mut self,
        record: &BookRecord,
        store: &dyn CatalogStore,
    ) -> SaveOutcome {
        match self.admit(record, store).await {
            Ok(AdmitDecision::Accepted) => {}
            Ok(decision) => {
                debug!("{:?}: '{}' ({})", decision, record.title, record.identity_key());
                return SaveOutcome::Skipped(decision);
            }
            Err(e) => {
                error!("Existence check failed for '{}': {}", record.title, e);
                return SaveOutcome::StoreFailed(e.to_string());
            }
        }

        match store.save(record).await {
            Ok(saved) => {
                self.confirm(&saved);
                debug!("Accepted '{}' ({})", saved.title, saved.identity_key());
                SaveOutcome::Saved(saved)
            }
            Err(RepositoryError::ConstraintViolation { message }) => {
                debug!("Lost insert race for '{}': {}", record.title, message);
                self.confirm(record);
                SaveOutcome::Skipped(AdmitDecision::DuplicateInStore)
            }
            Err(e) => {
                error!("Failed to save '{}': {}", record.title, e);
                SaveOutcome::StoreFailed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Page;
    use crate::repositories::{InMemoryCatalogStore, Repository, RepositoryStats};
    use async_trait::async_trait;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_admit_decisions() {
        let store = InMemoryCatalogStore::new();
        let mut resolver = IdentityResolver::new();

        let hobbit = BookRecord::new("The Hobbit", "J.R.R. Tolkien", "Fantasy");
        assert_eq!(
            resolver.admit(&hobbit, &store).await.unwrap(),
            AdmitDecision::Accepted
        );

        resolver.confirm(&hobbit);
        let shouty = BookRecord::new("the hobbit!", "J.R.R. Tolkien", "Fantasy");
        assert_eq!(
            resolver.admit(&shouty, &store).await.unwrap(),
            AdmitDecision::DuplicateInBatch
        );

        store.save(&hobbit).await.unwrap();
        let fresh = IdentityResolver::new();
        assert_eq!(
            fresh.admit(&shouty, &store).await.unwrap(),
            AdmitDecision::DuplicateInStore
        );
    }

    #[tokio::test]
    async fn test_isbn_record_ignores_title_author_in_store() {
        let store = InMemoryCatalogStore::new();
        store
            .save(&BookRecord::new("Dune", "Frank Herbert", "Science Fiction"))
            .await
            .unwrap();

        let resolver = IdentityResolver::new();
        let with_isbn =
            BookRecord::new("Dune", "Frank Herbert", "Science Fiction").with_isbn("9780441172719");
        assert_eq!(
            resolver.admit(&with_isbn, &store).await.unwrap(),
            AdmitDecision::Accepted
        );
    }

    #[tokio::test]
    async fn test_admit_and_save_skips_stored_identity() {
        let store = InMemoryCatalogStore::new();
        let record = BookRecord::new("Emma", "Jane Austen", "Romance").with_isbn("9780141439587");

        let mut first = IdentityResolver::new();
        assert!(matches!(
            first.admit_and_save(&record, &store).await,
            SaveOutcome::Saved(_)
        ));
        assert!(matches!(
            first.admit_and_save(&record, &store).await,
            SaveOutcome::Skipped(AdmitDecision::DuplicateInBatch)
        ));

        let mut second = IdentityResolver::new();
        assert!(matches!(
            second.admit_and_save(&record, &store).await,
            SaveOutcome::Skipped(AdmitDecision::DuplicateInStore)
        ));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    /// Store whose existence checks miss a row another writer already holds
    #[derive(Debug, Default)]
    struct StaleReadStore {
        inner: InMemoryCatalogStore,
    }

    #[async_trait]
    impl Repository for StaleReadStore {
        fn name(&self) -> &'static str {
            "StaleReadStore"
        }

        async fn health_check(&self) -> RepositoryResult<bool> {
            Ok(true)
        }

        async fn clear(&self) -> RepositoryResult<()> {
            self.inner.clear().await
        }

        async fn stats(&self) -> RepositoryResult<RepositoryStats> {
            self.inner.stats().await
        }
    }

    #[async_trait]
    impl CatalogStore for StaleReadStore {
        async fn exists_by_isbn(&self, _isbn: &str) -> RepositoryResult<bool> {
            Ok(false)
        }

        async fn exists_by_title_author(&self, _title: &str, _author: &str) -> RepositoryResult<bool> {
            Ok(false)
        }

        async fn save(&self, record: &BookRecord) -> RepositoryResult<BookRecord> {
            self.inner.save(record).await
        }

        async fn search_local(
            &self,
            query: &str,
            page: usize,
            size: usize,
        ) -> RepositoryResult<Page<BookRecord>> {
            self.inner.search_local(query, page, size).await
        }

        async fn count(&self) -> RepositoryResult<u64> {
            self.inner.count().await
        }

        async fn find_by_isbn(&self, isbn: &str) -> RepositoryResult<Option<BookRecord>> {
            self.inner.find_by_isbn(isbn).await
        }
    }

    #[tokio::test]
    async fn test_insert_losing_race_is_store_duplicate() {
        let store = StaleReadStore::default();
        let record = BookRecord::new("Emma", "Jane Austen", "Romance").with_isbn("9780141439587");
        store.inner.save(&record).await.unwrap();

        let mut resolver = IdentityResolver::new();
        assert_eq!(
            resolver.admit(&record, &store).await.unwrap(),
            AdmitDecision::Accepted
        );
        assert!(matches!(
            resolver.admit_and_save(&record, &store).await,
            SaveOutcome::Skipped(AdmitDecision::DuplicateInStore)
        ));
        // the loser still remembers the identity for the rest of its batch
        assert!(resolver.contains(&record.identity_key()));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolvers_store_one_copy() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let record = BookRecord::new("Persuasion", "Jane Austen", "Romance");

        let mut left = IdentityResolver::new();
        let mut right = IdentityResolver::new();
        let (a, b) = tokio::join!(
            left.admit_and_save(&record, store.as_ref()),
            right.admit_and_save(&record, store.as_ref())
        );

        let saved = [&a, &b]
            .iter()
            .filter(|outcome| matches!(outcome, SaveOutcome::Saved(_)))
            .count();
        assert_eq!(saved, 1);
        assert!([&a, &b]
            .iter()
            .any(|outcome| matches!(outcome, SaveOutcome::Skipped(AdmitDecision::DuplicateInStore))));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[test]
    fn test_seeded_resolver() {
        let local = vec![BookRecord::new("Dune", "Frank Herbert", "Science Fiction")];
        let resolver = IdentityResolver::seeded(&local);
        assert_eq!(resolver.len(), 1);
        assert!(resolver.contains(&IdentityKey::title_author("dune", "frank herbert")));
    }
}
