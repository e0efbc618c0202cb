use super::identity::{IdentityResolver, SaveOutcome};
use super::{validate_count, validate_text, MAX_PAGE_SIZE};
use crate::client::providers::SearchQuery;
use crate::client::{BookRecord, MetaSearchClient, Page};
use crate::config::AugmentConfig;
use crate::repositories::CatalogStore;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Supplements a short first page of local results with live provider results.
///
/// New records are persisted before they are appended. The returned page's
/// `total_elements` is the size of the combined in-memory set, not a
/// store-wide count.
pub struct SearchAugmenter {
    client: Arc<MetaSearchClient>,
    store: Arc<dyn CatalogStore>,
    config: AugmentConfig,
}

impl SearchAugmenter {
    #[must_use]
    pub fn new(
        client: Arc<MetaSearchClient>,
        store: Arc<dyn CatalogStore>,
        config: AugmentConfig,
    ) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    /// Whether a local result page qualifies for live augmentation
    #[must_use]
    pub fn should_augment(&self, local: &Page<BookRecord>) -> bool {
        self.config.enabled && local.page == 0 && local.total_elements < local.size as u64
    }

    #[instrument(skip(self))]
    pub async fn augmented_search(
        &self,
        query: &str,
        page: usize,
        size: usize,
    ) -> Result<Page<BookRecord>> {
        validate_text("query", query)?;
        validate_count("size", size as u64, MAX_PAGE_SIZE)?;

        let local = self.store.search_local(query.trim(), page, size).await?;
        if !self.should_augment(&local) {
            return Ok(local);
        }

        info!(
            "Local search returned {} results, querying providers for: {}",
            local.total_elements, query
        );

        let fetch = u32::try_from(size)
            .unwrap_or(u32::MAX)
            .saturating_mul(self.config.fetch_multiplier);
        let external = self
            .client
            .search(&SearchQuery::keywords(query.trim(), fetch))
            .await;

        if external.successful_providers == 0 {
            warn!(
                "Provider search failed for '{}', returning local results",
                query
            );
            return Ok(local);
        }

        let mut resolver = IdentityResolver::seeded(&local.content);
        let mut combined = local.content;

        for record in external.records {
            if combined.len() >= size {
                break;
            }
            match resolver.admit_and_save(&record, self.store.as_ref()).await {
                SaveOutcome::Saved(saved) => combined.push(saved),
                SaveOutcome::Skipped(decision) => {
                    debug!("Augmentation skipped '{}': {:?}", record.title, decision);
                }
                SaveOutcome::StoreFailed(reason) => {
                    warn!("Augmentation could not store '{}': {}", record.title, reason);
                }
            }
        }

        if let Err(e) = self.store.flush().await {
            warn!("Failed to flush catalog store: {}", e);
        }

        let total = combined.len() as u64;
        combined.truncate(size);
        info!("Augmented search for '{}' returned {} books", query, combined.len());

        Ok(Page::new(combined, 0, size, total))
    }
}
