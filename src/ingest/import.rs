//! # Bulk Import
//!
//! Drives seed queries across both catalogs one at a time, persisting every
//! record the [`IdentityResolver`] accepts. When live import admits fewer
//! records than `import.min_imported`, the curated fallback dataset is loaded
//! through the same dedup check.

use super::fallback::fallback_records;
use super::identity::{AdmitDecision, IdentityResolver, SaveOutcome};
use super::{validate_count, validate_text, MAX_SUBJECT_COUNT};
use crate::client::providers::{ProviderId, SearchQuery};
use crate::client::{BookRecord, MetaSearchClient, RecordNormalizer};
use crate::config::ImportConfig;
use crate::repositories::CatalogStore;
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Terminal outcome of an import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportOutcome {
    /// Threshold met, every query answered
    Success,
    /// Threshold met, some queries failed
    PartialSuccess,
    /// Live import under-delivered and the fallback dataset was loaded
    FallbackTriggered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Idle,
    Importing,
    Finished(ImportOutcome),
}

/// One seed query bound to the provider it is sent to
#[derive(Debug, Clone)]
pub struct PlannedQuery {
    pub provider: ProviderId,
    pub query: SearchQuery,
}

/// Ordered seed queries plus the running imported count
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub queries: Vec<PlannedQuery>,
    pub imported: usize,
    state: JobState,
}

impl ImportJob {
    #[must_use]
    pub const fn new(queries: Vec<PlannedQuery>) -> Self {
        Self {
            queries,
            imported: 0,
            state: JobState::Idle,
        }
    }

    /// Seed plan: richer-metadata queries first, then franchise queries.
    /// Providers not in `available` are left out.
    #[must_use]
    pub fn seed(config: &ImportConfig, available: &[ProviderId]) -> Self {
        let mut queries = Vec::new();

        if available.contains(&ProviderId::GoogleBooks) {
            queries.extend(config.google_queries.iter().map(|q| PlannedQuery {
                provider: ProviderId::GoogleBooks,
                query: SearchQuery::keywords(q.clone(), config.google_per_query),
            }));
        }

        if available.contains(&ProviderId::OpenLibrary) {
            queries.extend(config.open_library_queries.iter().map(|q| PlannedQuery {
                provider: ProviderId::OpenLibrary,
                query: SearchQuery::keywords(q.clone(), config.open_library_per_query),
            }));
        }

        Self::new(queries)
    }

    #[must_use]
    pub const fn state(&self) -> JobState {
        self.state
    }

    fn start(&mut self) -> Result<()> {
        if self.state != JobState::Idle {
            return Err(Error::Service(format!(
                "import job cannot start from state {:?}",
                self.state
            )));
        }
        self.state = JobState::Importing;
        Ok(())
    }

    fn finish(&mut self, outcome: ImportOutcome) {
        self.state = JobState::Finished(outcome);
    }
}

/// Counters for one import run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub outcome: Option<ImportOutcome>,
    /// Records admitted from live provider queries
    pub imported: usize,
    /// Records admitted from the fallback dataset
    pub fallback_imported: usize,
    pub duplicates_in_batch: usize,
    pub duplicates_in_store: usize,
    pub store_errors: usize,
    pub queries_run: usize,
    /// `provider: query (error)` for each skipped query
    pub failed_queries: Vec<String>,
    pub elapsed_ms: u64,
}

impl ImportReport {
    #[must_use]
    pub const fn total_imported(&self) -> usize {
        self.imported + self.fallback_imported
    }

    /// Count one save outcome; true when the record was stored
    fn record(&mut self, outcome: &SaveOutcome) -> bool {
        match outcome {
            SaveOutcome::Saved(_) => return true,
            SaveOutcome::Skipped(AdmitDecision::DuplicateInBatch) => self.duplicates_in_batch += 1,
            SaveOutcome::Skipped(_) => self.duplicates_in_store += 1,
            SaveOutcome::StoreFailed(_) => self.store_errors += 1,
        }
        false
    }

    fn absorb(&mut self, other: Self) {
        self.imported += other.imported;
        self.fallback_imported += other.fallback_imported;
        self.duplicates_in_batch += other.duplicates_in_batch;
        self.duplicates_in_store += other.duplicates_in_store;
        self.store_errors += other.store_errors;
        self.queries_run += other.queries_run;
        self.failed_queries.extend(other.failed_queries);
        self.elapsed_ms += other.elapsed_ms;
    }

    fn check_store(&self) -> Result<()> {
        if self.store_errors > 0 && self.total_imported() == 0 {
            return Err(Error::StoreUnavailable {
                reason: format!("all {} attempted writes failed", self.store_errors),
            });
        }
        Ok(())
    }
}

/// Bulk import driver
pub struct AggregationOrchestrator {
    client: Arc<MetaSearchClient>,
    store: Arc<dyn CatalogStore>,
    normalizer: RecordNormalizer,
    config: ImportConfig,
}

impl AggregationOrchestrator {
    #[must_use]
    pub fn new(
        client: Arc<MetaSearchClient>,
        store: Arc<dyn CatalogStore>,
        normalizer: RecordNormalizer,
        config: ImportConfig,
    ) -> Self {
        Self {
            client,
            store,
            normalizer,
            config,
        }
    }

    /// Seed plan over the configured providers
    #[must_use]
    pub fn seed_job(&self) -> ImportJob {
        ImportJob::seed(&self.config, &self.client.providers())
    }

    async fn ingest(
        &self,
        records: Vec<BookRecord>,
        resolver: &mut IdentityResolver,
        report: &mut ImportReport,
    ) -> usize {
        let mut accepted = 0;
        for record in records {
            let outcome = resolver.admit_and_save(&record, self.store.as_ref()).await;
            if report.record(&outcome) {
                accepted += 1;
            }
        }
        accepted
    }

    async fn flush(&self) {
        if let Err(e) = self.store.flush().await {
            error!("Failed to flush catalog store: {}", e);
        }
    }

    /// Run `job` to completion. Query failures are logged and skipped.
    #[instrument(skip(self, job), fields(queries = job.queries.len()))]
    pub async fn run(&self, job: &mut ImportJob) -> Result<ImportReport> {
        let start_time = Instant::now();
        job.start()?;

        let mut resolver = IdentityResolver::new();
        let mut report = ImportReport::default();

        for planned in &job.queries {
            report.queries_run += 1;

            match self
                .client
                .query_provider(planned.provider, &planned.query)
                .await
            {
                Ok(records) if records.is_empty() => {
                    warn!(
                        "No usable results from {} for '{}'",
                        planned.provider, planned.query.query
                    );
                }
                Ok(records) => {
                    let accepted = self.ingest(records, &mut resolver, &mut report).await;
                    job.imported += accepted;
                    info!(
                        "Imported {} books from {} for '{}'",
                        accepted, planned.provider, planned.query.query
                    );
                }
                Err(e) => {
                    warn!(
                        "Skipping {} query '{}': {}",
                        planned.provider, planned.query.query, e
                    );
                    report
                        .failed_queries
                        .push(format!("{}: {} ({e})", planned.provider, planned.query.query));
                }
            }
        }

        report.imported = job.imported;

        let outcome = if job.imported < self.config.min_imported {
            warn!(
                "Live import admitted {} books (minimum {}), loading fallback dataset",
                job.imported, self.config.min_imported
            );
            self.load_fallback(&mut resolver, &mut report).await;
            ImportOutcome::FallbackTriggered
        } else if report.failed_queries.is_empty() {
            ImportOutcome::Success
        } else {
            ImportOutcome::PartialSuccess
        };

        job.finish(outcome);
        report.outcome = Some(outcome);
        report.elapsed_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.flush().await;

        info!(
            "Import finished: {:?}, {} live + {} fallback books, {} failed queries",
            outcome,
            report.imported,
            report.fallback_imported,
            report.failed_queries.len()
        );

        report.check_store()?;
        Ok(report)
    }

    /// Load only the curated dataset
    pub async fn run_fallback_only(&self) -> Result<ImportReport> {
        let start_time = Instant::now();
        let mut resolver = IdentityResolver::new();
        let mut report = ImportReport::default();

        self.load_fallback(&mut resolver, &mut report).await;
        report.outcome = Some(ImportOutcome::FallbackTriggered);
        report.elapsed_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.flush().await;

        report.check_store()?;
        Ok(report)
    }

    async fn load_fallback(&self, resolver: &mut IdentityResolver, report: &mut ImportReport) {
        let records = fallback_records(&self.normalizer);
        let total = records.len();
        let accepted = self.ingest(records, resolver, report).await;
        report.fallback_imported = accepted;
        info!(
            "Loaded {} of {} fallback books",
            report.fallback_imported, total
        );
    }

    /// One `subject:` query against the richer-metadata provider (or the
    /// other one when it is disabled)
    #[instrument(skip(self))]
    pub async fn import_by_subject(&self, subject: &str, count: u32) -> Result<ImportReport> {
        validate_text("subject", subject)?;
        validate_count("count", u64::from(count), MAX_SUBJECT_COUNT)?;

        let report = self.subject_report(subject, count).await?;
        self.flush().await;
        info!("Imported {} new books for subject: {}", report.imported, subject);

        report.check_store()?;
        Ok(report)
    }

    fn subject_provider(&self) -> Result<ProviderId> {
        let providers = self.client.providers();
        if providers.contains(&ProviderId::GoogleBooks) {
            return Ok(ProviderId::GoogleBooks);
        }
        providers.first().copied().ok_or_else(|| Error::InvalidInput {
            field: "providers".to_string(),
            reason: "no provider is enabled".to_string(),
        })
    }

    /// Query and store one subject without judging the store outcome
    async fn subject_report(&self, subject: &str, count: u32) -> Result<ImportReport> {
        let provider = self.subject_provider()?;
        let start_time = Instant::now();
        let mut resolver = IdentityResolver::new();
        let mut report = ImportReport {
            queries_run: 1,
            ..ImportReport::default()
        };

        match self
            .client
            .query_provider(provider, &SearchQuery::subject(subject.trim(), count))
            .await
        {
            Ok(records) => {
                let accepted = self.ingest(records, &mut resolver, &mut report).await;
                report.imported = accepted;
            }
            Err(e) => {
                warn!("Subject import from {} failed for '{}': {}", provider, subject, e);
                report
                    .failed_queries
                    .push(format!("{provider}: subject:{subject} ({e})"));
            }
        }

        report.elapsed_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(report)
    }

    /// Every subject is attempted; the store is judged on the combined counts
    pub async fn import_bulk(&self, subjects: &[String], count: u32) -> Result<usize> {
        if subjects.is_empty() {
            return Err(Error::InvalidInput {
                field: "subjects".to_string(),
                reason: "at least one subject is required".to_string(),
            });
        }
        for subject in subjects {
            validate_text("subject", subject)?;
        }
        validate_count("count", u64::from(count), MAX_SUBJECT_COUNT)?;

        let mut combined = ImportReport::default();
        for subject in subjects {
            let report = self.subject_report(subject, count).await?;
            if report.store_errors > 0 {
                warn!(
                    "{} writes failed for subject '{}'",
                    report.store_errors, subject
                );
            }
            combined.absorb(report);
        }
        self.flush().await;

        info!(
            "Bulk import over {} subjects imported {} books ({} store errors)",
            subjects.len(),
            combined.imported,
            combined.store_errors
        );
        combined.check_store()?;
        Ok(combined.imported)
    }

    /// Bulk import over the configured popular topics
    pub async fn import_popular_books(&self) -> Result<usize> {
        info!(
            "Importing popular books over {} subjects",
            self.config.popular_subjects.len()
        );
        self.import_bulk(&self.config.popular_subjects, self.config.popular_per_subject)
            .await
    }
}
