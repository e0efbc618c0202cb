use crate::client::providers::ProviderError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Bounded wait for provider calls.
///
/// An elapsed deadline becomes [`ProviderError::Timeout`], so callers handle
/// it exactly like any other provider failure.
#[allow(async_fn_in_trait)]
pub trait ProviderTimeoutExt<T> {
    async fn within(self, duration: Duration) -> Result<T, ProviderError>;
}

impl<F, T> ProviderTimeoutExt<T> for F
where
    F: Future<Output = Result<T, ProviderError>>,
{
    async fn within(self, duration: Duration) -> Result<T, ProviderError> {
        if let Ok(result) = timeout(duration, self).await {
            result
        } else {
            warn!("Provider call timed out after {:?}", duration);
            Err(ProviderError::Timeout)
        }
    }
}
