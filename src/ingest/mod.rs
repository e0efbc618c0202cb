//! # Catalog Ingest
//!
//! Turns external book data into unique catalog records. [`CatalogIngestService`]
//! is the entry point; it wires the provider client, the catalog store, the
//! bulk [`AggregationOrchestrator`] and the [`SearchAugmenter`].
//!
//! Only malformed input and a store that rejects every write surface as
//! errors. Provider outages, rate limits and untitled payloads are logged and
//! skipped.

pub mod augment;
pub mod fallback;
pub mod identity;
pub mod import;

pub use augment::SearchAugmenter;
pub use fallback::{fallback_records, FallbackBook, FALLBACK_BOOKS};
pub use identity::{AdmitDecision, IdentityResolver, SaveOutcome};
pub use import::{AggregationOrchestrator, ImportJob, ImportOutcome, ImportReport, JobState};

use crate::client::providers::{ProviderId, SearchQuery};
use crate::client::{BookRecord, Isbn, MetaSearchClient, Page, RecordNormalizer};
use crate::repositories::{CatalogStore, Repository, RepositoryStats};
use crate::{Config, Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// Upper bound for `limit` on provider searches
pub const MAX_SEARCH_LIMIT: u64 = 100;
/// Upper bound for per-subject import counts
pub const MAX_SUBJECT_COUNT: u64 = 40;
/// Upper bound for augmented search page size
pub const MAX_PAGE_SIZE: u64 = 100;

pub(crate) fn validate_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput {
            field: field.to_string(),
            reason: format!("{field} cannot be empty"),
        });
    }
    Ok(())
}

pub(crate) fn validate_count(field: &str, value: u64, max: u64) -> Result<()> {
    if value == 0 || value > max {
        return Err(Error::InvalidInput {
            field: field.to_string(),
            reason: format!("must be between 1 and {max}, got {value}"),
        });
    }
    Ok(())
}

/// Provider and store health
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub providers: BTreeMap<String, bool>,
    pub store: String,
    pub store_healthy: bool,
    pub store_stats: RepositoryStats,
}

/// Inbound operations of the ingest pipeline
pub struct CatalogIngestService {
    config: Config,
    client: Arc<MetaSearchClient>,
    store: Arc<dyn CatalogStore>,
    orchestrator: AggregationOrchestrator,
    augmenter: SearchAugmenter,
}

impl CatalogIngestService {
    /// Validate `config` and build the provider client from it
    pub fn new(config: Config, store: Arc<dyn CatalogStore>) -> Result<Self> {
        config.validate()?;
        let client = MetaSearchClient::new(&config)?;
        Ok(Self::with_client(config, Arc::new(client), store))
    }

    /// Build over an existing client
    #[must_use]
    pub fn with_client(
        config: Config,
        client: Arc<MetaSearchClient>,
        store: Arc<dyn CatalogStore>,
    ) -> Self {
        let orchestrator = AggregationOrchestrator::new(
            Arc::clone(&client),
            Arc::clone(&store),
            RecordNormalizer::new(&config.covers),
            config.import.clone(),
        );
        let augmenter =
            SearchAugmenter::new(Arc::clone(&client), Arc::clone(&store), config.augment.clone());

        Self {
            config,
            client,
            store,
            orchestrator,
            augmenter,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    #[must_use]
    pub fn orchestrator(&self) -> &AggregationOrchestrator {
        &self.orchestrator
    }

    /// Search one provider; a provider failure yields an empty list
    #[instrument(skip(self))]
    pub async fn search_provider(
        &self,
        provider: ProviderId,
        query: &str,
        limit: u32,
    ) -> Result<Vec<BookRecord>> {
        validate_text("query", query)?;
        validate_count("limit", u64::from(limit), MAX_SEARCH_LIMIT)?;
        self.client.search_provider(provider, query.trim(), limit).await
    }

    /// Search every provider without persisting. The first provider's record
    /// wins per identity key.
    #[instrument(skip(self))]
    pub async fn search_external(&self, query: &str, limit: u32) -> Result<Vec<BookRecord>> {
        validate_text("query", query)?;
        validate_count("limit", u64::from(limit), MAX_SEARCH_LIMIT)?;
        let result = self
            .client
            .search(&SearchQuery::keywords(query.trim(), limit))
            .await;
        Ok(result.records)
    }

    /// Look up one book by ISBN without persisting it
    #[instrument(skip(self))]
    pub async fn fetch_by_isbn(&self, isbn: &str) -> Result<Option<BookRecord>> {
        let isbn = Isbn::new(isbn)?;
        Ok(self.client.fetch_by_isbn(isbn.as_str()).await)
    }

    /// Returns the number of records imported
    pub async fn import_by_subject(&self, subject: &str, count: u32) -> Result<usize> {
        Ok(self
            .orchestrator
            .import_by_subject(subject, count)
            .await?
            .imported)
    }

    pub async fn import_popular_books(&self) -> Result<usize> {
        self.orchestrator.import_popular_books().await
    }

    pub async fn import_bulk(&self, subjects: &[String], count_per_subject: u32) -> Result<usize> {
        self.orchestrator.import_bulk(subjects, count_per_subject).await
    }

    /// Populate an empty catalog. Returns `None` when the store already holds books.
    #[instrument(skip(self))]
    pub async fn seed_catalog(&self) -> Result<Option<ImportReport>> {
        let existing = self.store.count().await?;
        if existing > 0 {
            info!("Catalog already holds {} books, skipping seed", existing);
            return Ok(None);
        }

        let report = if self.config.import.use_api {
            info!("Seeding catalog from external providers");
            let mut job = self.orchestrator.seed_job();
            self.orchestrator.run(&mut job).await?
        } else {
            info!("Provider import disabled, seeding from fallback dataset");
            self.orchestrator.run_fallback_only().await?
        };

        Ok(Some(report))
    }

    /// Local search, augmented from providers on a short first page
    pub async fn augmented_search(
        &self,
        query: &str,
        page: usize,
        size: usize,
    ) -> Result<Page<BookRecord>> {
        self.augmenter.augmented_search(query, page, size).await
    }

    pub async fn health_check(&self) -> Result<HealthReport> {
        let providers = self
            .client
            .health_check()
            .await
            .into_iter()
            .map(|(id, healthy)| (id.to_string(), healthy))
            .collect();

        Ok(HealthReport {
            providers,
            store: self.store.name().to_string(),
            store_healthy: self.store.health_check().await?,
            store_stats: self.store.stats().await?,
        })
    }
}
