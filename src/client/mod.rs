pub mod meta_search;
pub mod normalize;
pub mod providers;
pub mod rate_limiter;
pub mod record;

pub use meta_search::{MetaSearchClient, MetaSearchConfig, MetaSearchResult};
pub use normalize::{parse_published_date, truncate, RecordNormalizer};
pub use rate_limiter::{PacingLimiter, RateLimiter};
pub use record::{BookRecord, IdentityKey, Page};

use crate::client::providers::ProviderError;
use crate::Result;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// HTTP client configuration shared by provider adapters
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout duration
    pub timeout: Duration,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("shelve-catalog-ingest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl From<&crate::config::HttpConfig> for HttpClientConfig {
    fn from(config: &crate::config::HttpConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            user_agent: config.user_agent.clone(),
        }
    }
}

impl HttpClientConfig {
    /// Build a reqwest client from this configuration
    pub fn build_client(&self) -> std::result::Result<reqwest::Client, ProviderError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| ProviderError::Other(format!("Failed to create HTTP client: {e}")))
    }
}

fn isbn_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?:\d{13}|\d{9}[\dX])$").expect("valid ISBN regex"))
}

/// ISBN wrapper for type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Isbn(String);

impl Isbn {
    /// Create a new ISBN from a string, validating the format.
    ///
    /// Hyphens, spaces and an `isbn:` prefix are stripped; a trailing `x`
    /// check digit is upper-cased.
    pub fn new(isbn: &str) -> Result<Self> {
        let trimmed = isbn.trim();
        let without_prefix = trimmed
            .strip_prefix("isbn:")
            .or_else(|| trimmed.strip_prefix("ISBN:"))
            .unwrap_or(trimmed);
        let cleaned: String = without_prefix
            .chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if cleaned.is_empty() {
            return Err(crate::Error::InvalidInput {
                field: "isbn".to_string(),
                reason: "ISBN cannot be empty".to_string(),
            });
        }

        if !isbn_pattern().is_match(&cleaned) {
            return Err(crate::Error::InvalidInput {
                field: "isbn".to_string(),
                reason: format!("'{isbn}' is not a 10 or 13 character ISBN"),
            });
        }

        Ok(Self(cleaned))
    }

    /// Get the ISBN string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Isbn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Isbn {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
