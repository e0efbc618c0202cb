use super::traits::{
    ProviderError, ProviderId, ProviderResult, RawPayload, SearchContext, SearchQuery,
    SourceProvider,
};
use crate::client::HttpClientConfig;
use crate::config::OpenLibraryConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

/// Open Library `search.json` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenLibrarySearchResponse {
    #[serde(default)]
    docs: Vec<OpenLibraryDoc>,
    num_found: Option<u32>,
}

/// One search document from Open Library
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenLibraryDoc {
    pub title: Option<String>,
    #[serde(default)]
    pub author_name: Vec<String>,
    pub first_publish_year: Option<i32>,
    #[serde(default)]
    pub isbn: Vec<String>,
    #[serde(rename = "cover_i")]
    pub cover_id: Option<i64>,
    #[serde(default)]
    pub subject: Vec<String>,
    pub number_of_pages_median: Option<u32>,
    #[serde(default)]
    pub publisher: Vec<String>,
    pub ratings_average: Option<f64>,
    pub ratings_count: Option<u32>,
}

/// Open Library provider
pub struct OpenLibraryProvider {
    client: Client,
    base_url: String,
    pacing: Duration,
    max_results_cap: u32,
}

impl OpenLibraryProvider {
    /// Create a new Open Library provider
    pub fn new(config: &OpenLibraryConfig, http: &HttpClientConfig) -> Result<Self, ProviderError> {
        let client = http.build_client()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            pacing: Duration::from_millis(config.pacing_ms),
            max_results_cap: config.max_results_cap.max(1),
        })
    }

    fn build_search_url(&self, query: &SearchQuery) -> Result<String, ProviderError> {
        let mut url = Url::parse(&format!("{}/search.json", self.base_url))
            .map_err(|e| ProviderError::Other(format!("Invalid base URL: {e}")))?;

        let limit = query.max_results.clamp(1, self.max_results_cap);
        url.query_pairs_mut()
            .append_pair("q", &query.to_query_string())
            .append_pair("limit", &limit.to_string());

        Ok(url.to_string())
    }

    fn parse_response(body: &str) -> Result<(Vec<RawPayload>, Option<u32>), ProviderError> {
        let response: OpenLibrarySearchResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::Parse(format!("Failed to parse JSON: {e}")))?;

        let payloads = response
            .docs
            .into_iter()
            .map(RawPayload::OpenLibrary)
            .collect::<Vec<_>>();

        debug!("Parsed {} docs from Open Library response", payloads.len());
        Ok((payloads, response.num_found))
    }
}

#[async_trait]
impl SourceProvider for OpenLibraryProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenLibrary
    }

    fn description(&self) -> &str {
        "Open Library - broad coverage of well-known series with numeric cover ids"
    }

    fn priority(&self) -> u8 {
        60
    }

    fn base_delay(&self) -> Duration {
        self.pacing
    }

    async fn search(
        &self,
        query: &SearchQuery,
        context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError> {
        let start_time = Instant::now();

        if query.query.trim().is_empty() {
            return Err(ProviderError::InvalidQuery("query cannot be empty".to_string()));
        }

        info!("Searching Open Library for: {}", query.to_query_string());

        let url = self.build_search_url(query)?;
        debug!("Open Library search URL: {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(context.timeout)
            .send()
            .await
            .map_err(|e| {
                error!("Open Library request failed: {}", e);
                ProviderError::from_transport(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Open Library returned HTTP {}", status);
            return Err(ProviderError::from_status(status, error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(format!("Failed to read response: {e}")))?;

        let (mut payloads, total_available) = Self::parse_response(&body)?;
        // limit is advisory upstream; never hand back more than asked for
        payloads.truncate(query.max_results.max(1) as usize);
        let search_time = start_time.elapsed();

        if payloads.is_empty() {
            warn!("No results from Open Library for: {}", query.query);
        }

        info!(
            "Open Library search completed: {} docs in {:?}",
            payloads.len(),
            search_time
        );

        Ok(ProviderResult {
            payloads,
            source: ProviderId::OpenLibrary,
            total_available,
            search_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(base_url: &str) -> OpenLibraryProvider {
        let config = OpenLibraryConfig {
            base_url: base_url.to_string(),
            ..OpenLibraryConfig::default()
        };
        OpenLibraryProvider::new(&config, &HttpClientConfig::default()).unwrap()
    }

    #[test]
    fn test_search_url_building() {
        let url = provider("https://openlibrary.org/")
            .build_search_url(&SearchQuery::keywords("lord of the rings", 10))
            .unwrap();
        assert_eq!(
            url,
            "https://openlibrary.org/search.json?q=lord+of+the+rings&limit=10"
        );
    }

    #[test]
    fn test_isbn_lookup_url() {
        let url = provider("https://openlibrary.org")
            .build_search_url(&SearchQuery::isbn("0261103571"))
            .unwrap();
        assert!(url.contains("q=isbn%3A0261103571"));
        assert!(url.contains("limit=1"));
    }

    #[test]
    fn test_parse_docs() {
        let body = r#"{
            "numFound": 1,
            "start": 0,
            "docs": [{
                "key": "/works/OL27448W",
                "title": "The Lord of the Rings",
                "author_name": ["J.R.R. Tolkien"],
                "first_publish_year": 1954,
                "isbn": ["0261103571", "9780261103573"],
                "cover_i": 14625765,
                "subject": ["Fantasy", "Middle Earth"],
                "number_of_pages_median": 1193,
                "edition_count": 120
            }]
        }"#;

        let (payloads, total) = OpenLibraryProvider::parse_response(body).unwrap();
        assert_eq!(total, Some(1));
        match &payloads[0] {
            RawPayload::OpenLibrary(doc) => {
                assert_eq!(doc.cover_id, Some(14_625_765));
                assert_eq!(doc.isbn.len(), 2);
                assert_eq!(doc.first_publish_year, Some(1954));
                assert!(doc.publisher.is_empty());
            }
            RawPayload::GoogleBooks(_) => panic!("wrong payload variant"),
        }
    }
}
