pub mod client;
pub mod config;
pub mod error;
pub mod ingest;
pub mod repositories;
pub mod resilience;

pub use client::{BookRecord, IdentityKey, Isbn, MetaSearchClient, Page, RecordNormalizer};
pub use crate::config::{Config, ConfigOverrides};
pub use error::{Error, ErrorCategory, Result};
pub use ingest::{
    AdmitDecision, AggregationOrchestrator, CatalogIngestService, IdentityResolver, ImportJob,
    ImportOutcome, ImportReport, SearchAugmenter,
};
pub use repositories::{CatalogStore, InMemoryCatalogStore, SledCatalogStore};
pub use resilience::ProviderTimeoutExt;
