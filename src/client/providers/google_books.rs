use super::traits::{
    ProviderError, ProviderId, ProviderResult, RawPayload, SearchContext, SearchQuery,
    SourceProvider,
};
use crate::client::HttpClientConfig;
use crate::config::GoogleBooksConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

/// Google Books volumes response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleBooksResponse {
    #[serde(default)]
    items: Vec<GoogleBooksItem>,
    total_items: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleBooksItem {
    #[allow(dead_code)]
    id: Option<String>,
    volume_info: Option<GoogleVolumeInfo>,
}

/// Bibliographic block of a Google Books volume
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleVolumeInfo {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub industry_identifiers: Vec<IndustryIdentifier>,
    pub page_count: Option<u32>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<u32>,
    pub image_links: Option<ImageLinks>,
    pub language: Option<String>,
}

/// Typed identifier such as `ISBN_13` or `ISBN_10`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndustryIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    pub small_thumbnail: Option<String>,
    pub thumbnail: Option<String>,
}

/// Google Books provider
pub struct GoogleBooksProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    pacing: Duration,
    max_results_cap: u32,
}

impl GoogleBooksProvider {
    /// Create a new Google Books provider
    pub fn new(config: &GoogleBooksConfig, http: &HttpClientConfig) -> Result<Self, ProviderError> {
        let client = http.build_client()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            pacing: Duration::from_millis(config.pacing_ms),
            max_results_cap: config.max_results_cap.max(1),
        })
    }

    /// Build the volumes search URL
    fn build_search_url(&self, query: &SearchQuery) -> Result<String, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::Other(format!("Invalid base URL: {e}")))?;

        // The API rejects maxResults outside 1..=40
        let max_results = query.max_results.clamp(1, self.max_results_cap);

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", &query.to_query_string())
                .append_pair("maxResults", &max_results.to_string());
            if let Some(key) = &self.api_key {
                pairs.append_pair("key", key);
            }
        }

        Ok(url.to_string())
    }

    /// Parse a volumes response body
    fn parse_response(body: &str) -> Result<(Vec<RawPayload>, Option<u32>), ProviderError> {
        let response: GoogleBooksResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::Parse(format!("Failed to parse JSON: {e}")))?;

        let payloads = response
            .items
            .into_iter()
            .filter_map(|item| item.volume_info)
            .map(RawPayload::GoogleBooks)
            .collect::<Vec<_>>();

        debug!("Parsed {} volumes from Google Books response", payloads.len());
        Ok((payloads, response.total_items))
    }
}

#[async_trait]
impl SourceProvider for GoogleBooksProvider {
    fn id(&self) -> ProviderId {
        ProviderId::GoogleBooks
    }

    fn description(&self) -> &str {
        "Google Books - rich bibliographic metadata with cover thumbnails"
    }

    fn priority(&self) -> u8 {
        80
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

        info!("Searching Google Books for: {}", query.to_query_string());

        let url = self.build_search_url(query)?;
        debug!("Google Books search URL: {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(context.timeout)
            .send()
            .await
            .map_err(|e| {
                error!("Google Books request failed: {}", e);
                ProviderError::from_transport(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Google Books returned HTTP {}", status);
            return Err(ProviderError::from_status(status, error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(format!("Failed to read response: {e}")))?;

        let (payloads, total_available) = Self::parse_response(&body)?;
        let search_time = start_time.elapsed();

        if payloads.is_empty() {
            warn!("No results from Google Books for: {}", query.query);
        }

        info!(
            "Google Books search completed: {} volumes in {:?}",
            payloads.len(),
            search_time
        );

        Ok(ProviderResult {
            payloads,
            source: ProviderId::GoogleBooks,
            total_available,
            search_time,
        })
    }
}
