use crate::client::providers::ProviderError;
use crate::repositories::RepositoryError;
use std::time::Duration;
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (permanent failures)
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Rate limit exceeded: retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },

    // Client errors (permanent)
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Service temporarily unavailable: {service} - {reason}")]
    ServiceUnavailable { service: String, reason: String },

    #[error("Timeout error: operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    // Store errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Every attempted write in a batch failed
    #[error("Catalog store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("Service error: {0}")]
    Service(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

/// Error categorization for callers deciding whether to try again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Permanent errors - should not retry
    Permanent,
    /// Transient errors - safe to retry
    Transient,
    /// Rate limited - retry after a pause
    RateLimited,
}

impl Error {
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_)
            | Self::InvalidInput { .. }
            | Self::Parse { .. } => ErrorCategory::Permanent,

            Self::RateLimitExceeded { .. } => ErrorCategory::RateLimited,

            Self::Repository(RepositoryError::Validation { .. })
            | Self::Repository(RepositoryError::ConstraintViolation { .. }) => {
                ErrorCategory::Permanent
            }

            Self::ServiceUnavailable { .. }
            | Self::Timeout { .. }
            | Self::Repository(_)
            | Self::StoreUnavailable { .. }
            | Self::Service(_)
            | Self::Provider(_) => ErrorCategory::Transient,
        }
    }

    /// Check if error is retryable
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::RateLimited
        )
    }

    /// Suggested pause for rate limited errors
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Network(msg) => Self::Provider(format!("Network error: {msg}")),
            ProviderError::Parse(msg) => Self::Parse {
                context: "provider".to_string(),
                message: msg,
            },
            ProviderError::RateLimit => Self::RateLimitExceeded {
                retry_after: Duration::from_secs(60),
            },
            ProviderError::Http { status, message } => {
                Self::Provider(format!("HTTP {status}: {message}"))
            }
            ProviderError::InvalidQuery(msg) => Self::InvalidInput {
                field: "query".to_string(),
                reason: msg,
            },
            ProviderError::ServiceUnavailable(msg) => Self::ServiceUnavailable {
                service: "provider".to_string(),
                reason: msg,
            },
            ProviderError::Timeout => Self::Timeout {
                timeout: Duration::from_secs(30),
            },
            ProviderError::Other(msg) => Self::Provider(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let invalid = Error::InvalidInput {
            field: "isbn".to_string(),
            reason: "bad".to_string(),
        };
        assert_eq!(invalid.category(), ErrorCategory::Permanent);
        assert!(!invalid.is_retryable());

        let unavailable = Error::StoreUnavailable {
            reason: "disk".to_string(),
        };
        assert!(unavailable.is_retryable());

        let collision = Error::Repository(RepositoryError::ConstraintViolation {
            message: "isbn".to_string(),
        });
        assert_eq!(collision.category(), ErrorCategory::Permanent);
    }

    #[test]
    fn test_provider_error_conversion() {
        let err: Error = ProviderError::RateLimit.into();
        assert_eq!(err.category(), ErrorCategory::RateLimited);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));

        let err: Error = ProviderError::Timeout.into();
        assert!(matches!(err, Error::Timeout { .. }));

        let err: Error = ProviderError::Http {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert!(err.is_retryable());
    }
}
