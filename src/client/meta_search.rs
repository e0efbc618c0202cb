use crate::client::providers::{
    GoogleBooksProvider, OpenLibraryProvider, ProviderError, ProviderId, SearchContext,
    SearchQuery, SourceProvider,
};
use crate::client::{BookRecord, HttpClientConfig, IdentityKey, PacingLimiter, RecordNormalizer};
use crate::resilience::ProviderTimeoutExt;
use crate::Config;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for meta-search behavior
#[derive(Debug, Clone)]
pub struct MetaSearchConfig {
    /// Timeout for each provider call
    pub provider_timeout: Duration,
}

impl Default for MetaSearchConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for MetaSearchConfig {
    fn from(config: &Config) -> Self {
        Self {
            provider_timeout: Duration::from_secs(config.http.timeout_secs),
        }
    }
}

/// Result from a search across every configured provider
#[derive(Debug, Clone, Default)]
pub struct MetaSearchResult {
    /// Unique records, higher-priority provider first
    pub records: Vec<BookRecord>,
    /// Normalized record count per provider, before merging
    pub by_source: HashMap<ProviderId, usize>,
    /// Number of providers that succeeded
    pub successful_providers: usize,
    /// Number of providers that failed
    pub failed_providers: usize,
    /// Errors from failed providers
    pub provider_errors: HashMap<ProviderId, String>,
    /// Records discarded because an earlier provider produced the same identity key
    pub duplicates_merged: usize,
    /// Total search time
    pub total_search_time: Duration,
}

/// Client that queries the book catalogs one at a time.
///
/// Providers are kept in priority order; the first one queried wins whenever
/// two providers produce the same identity key.
pub struct MetaSearchClient {
    providers: Vec<Arc<dyn SourceProvider>>,
    normalizer: RecordNormalizer,
    pacing: Arc<PacingLimiter>,
    config: MetaSearchConfig,
    context: SearchContext,
}

impl MetaSearchClient {
    /// Create a client with every provider enabled in `app_config`
    pub fn new(app_config: &Config) -> Result<Self, ProviderError> {
        let http = HttpClientConfig::from(&app_config.http);
        let mut providers: Vec<Arc<dyn SourceProvider>> = Vec::new();

        if app_config.providers.google_books.enabled {
            providers.push(Arc::new(GoogleBooksProvider::new(
                &app_config.providers.google_books,
                &http,
            )?));
        }

        if app_config.providers.open_library.enabled {
            providers.push(Arc::new(OpenLibraryProvider::new(
                &app_config.providers.open_library,
                &http,
            )?));
        }

        let client = Self::with_providers(
            providers,
            RecordNormalizer::new(&app_config.covers),
            MetaSearchConfig::from(app_config),
        );

        info!(
            "Initialized meta-search client with {} providers",
            client.providers.len()
        );

        Ok(client)
    }

    /// Create a client over an explicit provider set
    #[must_use]
    pub fn with_providers(
        mut providers: Vec<Arc<dyn SourceProvider>>,
        normalizer: RecordNormalizer,
        config: MetaSearchConfig,
    ) -> Self {
        // Stable sort keeps insertion order between equal priorities
        providers.sort_by_key(|p| std::cmp::Reverse(p.priority()));

        let pacing = PacingLimiter::new(providers.iter().map(|p| (p.id(), p.base_delay())));
        let context = SearchContext {
            timeout: config.provider_timeout,
        };

        Self {
            providers,
            normalizer,
            pacing: Arc::new(pacing),
            config,
            context,
        }
    }

    /// Configured providers in query order
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    #[must_use]
    pub fn has_provider(&self, id: ProviderId) -> bool {
        self.provider(id).is_some()
    }

    fn provider(&self, id: ProviderId) -> Option<&Arc<dyn SourceProvider>> {
        self.providers.iter().find(|p| p.id() == id)
    }

    /// Run one paced, time-bounded query against one provider and normalize
    /// the payloads. Untitled payloads are dropped.
    pub async fn query_provider(
        &self,
        id: ProviderId,
        query: &SearchQuery,
    ) -> Result<Vec<BookRecord>, ProviderError> {
        let provider = self
            .provider(id)
            .ok_or_else(|| ProviderError::Other(format!("provider {id} is not configured")))?;

        self.pacing.acquire(id).await;

        let result = provider
            .search(query, &self.context)
            .within(self.config.provider_timeout)
            .await?;

        let records = self.normalizer.normalize_all(&result.payloads);
        debug!(
            "{} returned {} payloads, {} normalized in {:?}",
            id,
            result.payloads.len(),
            records.len(),
            result.search_time
        );

        Ok(records)
    }

    /// Search one provider. Provider failures are logged and yield an empty list.
    pub async fn search_provider(
        &self,
        id: ProviderId,
        query: &str,
        limit: u32,
    ) -> crate::Result<Vec<BookRecord>> {
        if !self.has_provider(id) {
            return Err(crate::Error::InvalidInput {
                field: "provider".to_string(),
                reason: format!("provider {id} is not enabled"),
            });
        }

        match self
            .query_provider(id, &SearchQuery::keywords(query, limit))
            .await
        {
            Ok(mut records) => {
                records.truncate(limit as usize);
                Ok(records)
            }
            Err(e) => {
                warn!("Provider {} failed for '{}': {}", id, query, e);
                Ok(Vec::new())
            }
        }
    }

    /// Query every provider in order and merge by identity key.
    ///
    /// Never fails: a provider error is recorded in the result and the next
    /// provider is queried.
    pub async fn search(&self, query: &SearchQuery) -> MetaSearchResult {
        let start_time = Instant::now();
        info!(
            "Starting meta-search for: {} (type: {:?})",
            query.query, query.search_type
        );

        let mut result = MetaSearchResult::default();
        let mut seen: HashSet<IdentityKey> = HashSet::new();

        for provider in &self.providers {
            let id = provider.id();
            match self.query_provider(id, query).await {
                Ok(records) => {
                    result.successful_providers += 1;
                    result.by_source.insert(id, records.len());

                    for record in records {
                        if seen.insert(record.identity_key()) {
                            result.records.push(record);
                        } else {
                            result.duplicates_merged += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", id, e);
                    result.failed_providers += 1;
                    result.provider_errors.insert(id, e.to_string());
                }
            }
        }

        result.records.truncate(query.max_results as usize);
        result.total_search_time = start_time.elapsed();

        info!(
            "Meta-search completed: {} records from {} providers ({} merged) in {:?}",
            result.records.len(),
            result.successful_providers,
            result.duplicates_merged,
            result.total_search_time
        );

        result
    }

    /// Look up a book by ISBN, trying providers in priority order
    pub async fn fetch_by_isbn(&self, isbn: &str) -> Option<BookRecord> {
        info!("Searching for ISBN: {}", isbn);

        for provider in &self.providers {
            let id = provider.id();
            self.pacing.acquire(id).await;

            match provider
                .fetch_by_identifier(isbn, &self.context)
                .within(self.config.provider_timeout)
                .await
            {
                Ok(Some(payload)) => {
                    if let Some(record) = self.normalizer.normalize(&payload) {
                        info!("Found ISBN {} in {}", isbn, id);
                        return Some(record);
                    }
                }
                Ok(None) => debug!("ISBN {} not found in {}", isbn, id),
                Err(e) => warn!("Error searching {} for ISBN {}: {}", id, isbn, e),
            }
        }

        info!("ISBN {} not found in any provider", isbn);
        None
    }

    /// Perform health checks on all providers
    pub async fn health_check(&self) -> HashMap<ProviderId, bool> {
        let mut results = HashMap::new();

        for provider in &self.providers {
            let id = provider.id();
            self.pacing.acquire(id).await;
            let healthy = provider
                .health_check(&self.context)
                .within(self.config.provider_timeout)
                .await
                .unwrap_or(false);

            if healthy {
                info!("Provider {} is healthy", id);
            } else {
                warn!("Provider {} is unhealthy", id);
            }
            results.insert(id, healthy);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::providers::{ProviderResult, RawPayload};
    use crate::client::providers::open_library::OpenLibraryDoc;
    use async_trait::async_trait;

    struct StubProvider {
        id: ProviderId,
        priority: u8,
        docs: Vec<OpenLibraryDoc>,
        fail: bool,
    }

    #[async_trait]
    impl SourceProvider for StubProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn base_delay(&self) -> Duration {
            Duration::ZERO
        }

        async fn search(
            &self,
            _query: &SearchQuery,
            _context: &SearchContext,
        ) -> Result<ProviderResult, ProviderError> {
            if self.fail {
                return Err(ProviderError::ServiceUnavailable("down".to_string()));
            }
            Ok(ProviderResult {
                payloads: self.docs.iter().cloned().map(RawPayload::OpenLibrary).collect(),
                source: self.id,
                total_available: None,
                search_time: Duration::ZERO,
            })
        }
    }

    fn doc(title: &str, isbn: Option<&str>) -> OpenLibraryDoc {
        OpenLibraryDoc {
            title: Some(title.to_string()),
            author_name: vec!["J.R.R. Tolkien".to_string()],
            isbn: isbn.map(|i| vec![i.to_string()]).unwrap_or_default(),
            ..OpenLibraryDoc::default()
        }
    }

    fn client(providers: Vec<StubProvider>) -> MetaSearchClient {
        MetaSearchClient::with_providers(
            providers
                .into_iter()
                .map(|p| Arc::new(p) as Arc<dyn SourceProvider>)
                .collect(),
            RecordNormalizer::default(),
            MetaSearchConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_higher_priority_provider_wins_merge() {
        let client = client(vec![
            StubProvider {
                id: ProviderId::OpenLibrary,
                priority: 60,
                docs: vec![doc("the hobbit", Some("9780618002214"))],
                fail: false,
            },
            StubProvider {
                id: ProviderId::GoogleBooks,
                priority: 80,
                docs: vec![doc("The Hobbit", Some("9780618002214"))],
                fail: false,
            },
        ]);

        assert_eq!(
            client.providers(),
            vec![ProviderId::GoogleBooks, ProviderId::OpenLibrary]
        );

        let result = client.search(&SearchQuery::keywords("hobbit", 10)).await;
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].title, "The Hobbit");
        assert_eq!(result.duplicates_merged, 1);
        assert_eq!(result.successful_providers, 2);
    }

    #[tokio::test]
    async fn test_failed_provider_is_recorded_not_fatal() {
        let client = client(vec![
            StubProvider {
                id: ProviderId::GoogleBooks,
                priority: 80,
                docs: Vec::new(),
                fail: true,
            },
            StubProvider {
                id: ProviderId::OpenLibrary,
                priority: 60,
                docs: vec![doc("Dune", None), doc("Emma", None)],
                fail: false,
            },
        ]);

        let result = client.search(&SearchQuery::keywords("x", 1)).await;
        assert_eq!(result.failed_providers, 1);
        assert!(result.provider_errors.contains_key(&ProviderId::GoogleBooks));
        assert_eq!(result.records.len(), 1);
    }

    #[tokio::test]
    async fn test_search_provider_swallows_failure() {
        let client = client(vec![StubProvider {
            id: ProviderId::GoogleBooks,
            priority: 80,
            docs: Vec::new(),
            fail: true,
        }]);

        let records = client
            .search_provider(ProviderId::GoogleBooks, "anything", 5)
            .await
            .unwrap();
        assert!(records.is_empty());

        let err = client
            .search_provider(ProviderId::OpenLibrary, "anything", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_fetch_by_isbn_falls_through_providers() {
        let client = client(vec![
            StubProvider {
                id: ProviderId::GoogleBooks,
                priority: 80,
                docs: Vec::new(),
                fail: false,
            },
            StubProvider {
                id: ProviderId::OpenLibrary,
                priority: 60,
                docs: vec![doc("The Hobbit", Some("9780618002214"))],
                fail: false,
            },
        ]);

        let record = client.fetch_by_isbn("9780618002214").await.unwrap();
        assert_eq!(record.isbn.as_deref(), Some("9780618002214"));
    }
}
