use super::google_books::GoogleVolumeInfo;
use super::open_library::OpenLibraryDoc;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Identifier of a configured external catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderId {
    /// Google Books volumes API (richer bibliographic metadata, thumbnails)
    GoogleBooks,
    /// Open Library search API (franchise coverage, numeric cover ids)
    OpenLibrary,
}

impl ProviderId {
    /// Stable short name used in logs, config and the CLI
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GoogleBooks => "google",
            Self::OpenLibrary => "openlibrary",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "google_books" | "googlebooks" => Ok(Self::GoogleBooks),
            "openlibrary" | "open_library" | "ol" => Ok(Self::OpenLibrary),
            other => Err(crate::Error::InvalidInput {
                field: "provider".to_string(),
                reason: format!("unknown provider '{other}' (expected 'google' or 'openlibrary')"),
            }),
        }
    }
}

/// Search query parameters for a provider
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Query string without any field prefix
    pub query: String,
    /// Search type hint
    pub search_type: SearchType,
    /// Maximum results to return. Advisory: providers may return fewer.
    pub max_results: u32,
}

/// Type of search being performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    /// Free keyword search
    Keywords,
    /// Identifier lookup by ISBN
    Isbn,
    /// Search by subject/category
    Subject,
}

impl SearchQuery {
    #[must_use]
    pub fn keywords(query: impl Into<String>, max_results: u32) -> Self {
        Self {
            query: query.into(),
            search_type: SearchType::Keywords,
            max_results,
        }
    }

    #[must_use]
    pub fn isbn(isbn: impl Into<String>) -> Self {
        Self {
            query: isbn.into(),
            search_type: SearchType::Isbn,
            max_results: 1,
        }
    }

    #[must_use]
    pub fn subject(subject: impl Into<String>, max_results: u32) -> Self {
        Self {
            query: subject.into(),
            search_type: SearchType::Subject,
            max_results,
        }
    }

    /// Render the `q` parameter. Both catalogs accept `field:value` prefixes.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        match self.search_type {
            SearchType::Keywords => self.query.clone(),
            SearchType::Isbn => format!("isbn:{}", self.query),
            SearchType::Subject => format!("subject:{}", self.query),
        }
    }
}

/// Context for search operations
#[derive(Debug, Clone)]
pub struct SearchContext {
    /// Timeout for the search operation
    pub timeout: Duration,
}

impl Default for SearchContext {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// One provider-shaped item, before normalization
#[derive(Debug, Clone)]
pub enum RawPayload {
    GoogleBooks(GoogleVolumeInfo),
    OpenLibrary(OpenLibraryDoc),
}

impl RawPayload {
    /// Provider that produced this payload
    #[must_use]
    pub const fn provider(&self) -> ProviderId {
        match self {
            Self::GoogleBooks(_) => ProviderId::GoogleBooks,
            Self::OpenLibrary(_) => ProviderId::OpenLibrary,
        }
    }
}

/// Result from a source provider
#[derive(Debug, Clone)]
pub struct ProviderResult {
    /// Raw items returned by the provider
    pub payloads: Vec<RawPayload>,
    /// Provider that produced the results
    pub source: ProviderId,
    /// Total number of results available (if the provider reports it)
    pub total_available: Option<u32>,
    /// Time taken to execute the search
    pub search_time: Duration,
}


/// Errors that can occur during provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("HTTP status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Map a reqwest transport failure onto the provider taxonomy
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Network(format!("Connection failed: {err}"))
        } else {
            Self::Network(format!("Request failed: {err}"))
        }
    }

    /// Map a non-success HTTP status onto the provider taxonomy
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            429 => Self::RateLimit,
            503 => Self::ServiceUnavailable(format!("HTTP 503: {body}")),
            code => Self::Http {
                status: code,
                message: body,
            },
        }
    }
}

/// Trait for external book catalog providers
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Unique identifier for this provider
    fn id(&self) -> ProviderId;

    /// Human-readable description of the provider
    fn description(&self) -> &str;

    /// Search the provider and return raw payloads
    async fn search(
        &self,
        query: &SearchQuery,
        context: &SearchContext,
    ) -> Result<ProviderResult, ProviderError>;

    /// Look up a single item by ISBN.
    ///
    /// Neither catalog exposes a dedicated identifier endpoint with the same
    /// payload shape, so this is a one-result `isbn:` search.
    async fn fetch_by_identifier(
        &self,
        isbn: &str,
        context: &SearchContext,
    ) -> Result<Option<RawPayload>, ProviderError> {
        let result = self.search(&SearchQuery::isbn(isbn), context).await?;
        Ok(result.payloads.into_iter().next())
    }

    /// Health check for the provider
    async fn health_check(&self, context: &SearchContext) -> Result<bool, ProviderError> {
        match self.search(&SearchQuery::keywords("tolkien", 1), context).await {
            Ok(_) | Err(ProviderError::RateLimit) => Ok(true), // Rate limit means service is up
            Err(_) => Ok(false),
        }
    }

    /// Pause between consecutive requests to this provider
    fn base_delay(&self) -> Duration {
        Duration::from_millis(200)
    }

    /// Priority of this provider (higher is queried first and wins merges)
    fn priority(&self) -> u8 {
        50
    }
}
