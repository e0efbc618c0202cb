//! # Catalog Store
//!
//! Data access for the local book catalog. The ingest pipeline only talks to
//! the [`CatalogStore`] trait; two backends implement it:
//!
//! - [`InMemoryCatalogStore`]: process-local, used by tests and `--in-memory` runs
//! - [`SledCatalogStore`]: embedded on-disk store
//!
//! Both make `save` an atomic insert-if-absent. A collision on ISBN, or on
//! the normalized title/author pair for a record without ISBN, is reported
//! as [`RepositoryError::ConstraintViolation`].
//!
//! ```no_run
//! use shelve_catalog_ingest::client::BookRecord;
//! use shelve_catalog_ingest::repositories::{CatalogStore, InMemoryCatalogStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryCatalogStore::new();
//! let book = BookRecord::new("Dune", "Frank Herbert", "Science Fiction").with_isbn("9780441172719");
//! store.save(&book).await?;
//! assert!(store.exists_by_isbn("9780441172719").await?);
//! # Ok(())
//! # }
//! ```

pub mod book;
pub mod sled_store;

pub use book::{CatalogStore, InMemoryCatalogStore};
pub use sled_store::SledCatalogStore;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;

/// Common repository error types
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Insert collided with an existing identity
    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },
}

/// Repository result type
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Base trait for all repositories
#[async_trait]
pub trait Repository: Send + Sync + Debug {
    /// Returns the name of the repository for logging and debugging
    fn name(&self) -> &'static str;

    /// Performs health check on the repository
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Clears all data from the repository (primarily for testing)
    async fn clear(&self) -> RepositoryResult<()>;

    /// Returns statistics about the repository
    async fn stats(&self) -> RepositoryResult<RepositoryStats>;
}

/// Statistics about repository usage
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepositoryStats {
    /// Total number of records stored
    pub total_entities: u64,
    pub successful_operations: u64,
    pub failed_operations: u64,
    /// Inserts rejected as duplicates
    pub rejected_duplicates: u64,
    /// Average operation time in milliseconds
    pub avg_operation_time_ms: f64,
    /// Storage size on disk in bytes (for persistent stores)
    pub storage_size_bytes: Option<u64>,
}

impl RepositoryStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful operation with timing
    pub fn record_success(&mut self, duration_ms: f64) {
        self.successful_operations += 1;
        self.update_avg_time(duration_ms);
    }

    /// Record a failed operation with timing
    pub fn record_failure(&mut self, duration_ms: f64) {
        self.failed_operations += 1;
        self.update_avg_time(duration_ms);
    }

    pub fn record_duplicate(&mut self) {
        self.rejected_duplicates += 1;
    }

    /// Exponential moving average with alpha = 0.1
    fn update_avg_time(&mut self, new_time_ms: f64) {
        let total_ops = self.successful_operations + self.failed_operations;
        if total_ops == 1 {
            self.avg_operation_time_ms = new_time_ms;
        } else {
            let alpha: f64 = 0.1;
            self.avg_operation_time_ms =
                alpha.mul_add(new_time_ms, (1.0 - alpha) * self.avg_operation_time_ms);
        }
    }
}
