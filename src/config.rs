//! # Configuration
//!
//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `SHELVE__SECTION__KEY` environment variables. [`ConfigOverrides`] patches
//! individual fields afterwards (flat `SHELVE_*` variables and CLI flags).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment prefix for layered keys (`SHELVE__IMPORT__MIN_IMPORTED`)
pub const ENV_PREFIX: &str = "SHELVE";
/// Environment prefix for flat overrides (`SHELVE_LOG_LEVEL`)
pub const OVERRIDE_ENV_PREFIX: &str = "SHELVE_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub providers: ProvidersConfig,
    pub covers: CoverConfig,
    pub import: ImportConfig,
    pub augment: AugmentConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Upper bound for one provider round trip
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("shelve-catalog-ingest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub google_books: GoogleBooksConfig,
    pub open_library: OpenLibraryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleBooksConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Pause between consecutive calls, in milliseconds
    pub pacing_ms: u64,
    pub max_results_cap: u32,
}

impl Default for GoogleBooksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://www.googleapis.com/books/v1/volumes".to_string(),
            api_key: None,
            pacing_ms: 200,
            max_results_cap: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenLibraryConfig {
    pub enabled: bool,
    pub base_url: String,
    pub pacing_ms: u64,
    pub max_results_cap: u32,
}

impl Default for OpenLibraryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://openlibrary.org".to_string(),
            pacing_ms: 200,
            max_results_cap: 100,
        }
    }
}

/// Cover image server used to synthesize cover URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    pub base_url: String,
    /// `S`, `M` or `L`
    pub size: String,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            base_url: "https://covers.openlibrary.org".to_string(),
            size: "L".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Seed queries for the richer-metadata provider, run first
    pub google_queries: Vec<String>,
    /// Seed queries for the franchise-coverage provider
    pub open_library_queries: Vec<String>,
    pub google_per_query: u32,
    pub open_library_per_query: u32,
    /// Below this many admitted records the fallback dataset is loaded
    pub min_imported: usize,
    pub popular_subjects: Vec<String>,
    pub popular_per_subject: u32,
    /// When false, seeding loads the fallback dataset without touching providers
    pub use_api: bool,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            google_queries: strings(&[
                "bestseller fiction 2024",
                "bestseller fiction 2023",
                "classic literature must read",
                "science fiction award winning",
                "fantasy epic series",
                "mystery thriller bestseller",
                "romance popular novels",
                "historical fiction acclaimed",
                "biography inspiring",
                "self improvement bestseller",
                "popular science books",
                "young adult fiction",
                "horror stephen king",
                "poetry classics",
                "philosophy introduction",
                "psychology popular",
                "business leadership",
                "travel adventure",
                "cooking chef",
            ]),
            open_library_queries: strings(&[
                "harry potter",
                "lord of the rings",
                "game of thrones",
                "percy jackson",
                "hunger games",
                "divergent",
                "twilight",
                "maze runner",
                "narnia",
                "sherlock holmes",
            ]),
            google_per_query: 15,
            open_library_per_query: 10,
            min_imported: 30,
            popular_subjects: strings(&[
                "fiction bestsellers",
                "science fiction classics",
                "fantasy novels",
                "mystery thriller",
                "romance novels",
                "historical fiction",
                "biography",
                "self-help",
                "science",
                "philosophy",
            ]),
            popular_per_subject: 20,
            use_api: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    pub enabled: bool,
    /// Live queries ask each provider for `size * fetch_multiplier` items
    pub fetch_multiplier: u32,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fetch_multiplier: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub in_memory: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("shelve-catalog-ingest")
                .join("catalog"),
            in_memory: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Field-level overrides applied after loading
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub json_logs: Option<bool>,
    pub google_api_key: Option<String>,
    pub store_path: Option<PathBuf>,
    pub in_memory: Option<bool>,
    pub min_imported: Option<usize>,
}

impl ConfigOverrides {
    /// Read flat `SHELVE_*` variables
    pub fn from_env() -> Result<Self> {
        envy::prefixed(OVERRIDE_ENV_PREFIX)
            .from_env::<Self>()
            .map_err(|e| Error::InvalidInput {
                field: "environment".to_string(),
                reason: e.to_string(),
            })
    }

    /// Combine two override sets; values in `other` win
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            log_level: other.log_level.or(self.log_level),
            json_logs: other.json_logs.or(self.json_logs),
            google_api_key: other.google_api_key.or(self.google_api_key),
            store_path: other.store_path.or(self.store_path),
            in_memory: other.in_memory.or(self.in_memory),
            min_imported: other.min_imported.or(self.min_imported),
        }
    }
}

impl Config {
    /// Load defaults, then `path` (if given), then `SHELVE__*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!("Loading configuration file {}", path.display());
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Apply field-level overrides
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(level) = &overrides.log_level {
            self.logging.level.clone_from(level);
        }
        if let Some(json) = overrides.json_logs {
            self.logging.format = if json { LogFormat::Json } else { LogFormat::Pretty };
        }
        if let Some(key) = &overrides.google_api_key {
            self.providers.google_books.api_key = Some(key.clone());
        }
        if let Some(path) = &overrides.store_path {
            self.store.path.clone_from(path);
        }
        if let Some(in_memory) = overrides.in_memory {
            self.store.in_memory = in_memory;
        }
        if let Some(min) = overrides.min_imported {
            self.import.min_imported = min;
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        fn invalid(field: &str, reason: &str) -> Error {
            Error::InvalidInput {
                field: field.to_string(),
                reason: reason.to_string(),
            }
        }

        if self.http.timeout_secs == 0 {
            return Err(invalid("http.timeout_secs", "must be greater than zero"));
        }
        if self.http.connect_timeout_secs == 0 {
            return Err(invalid("http.connect_timeout_secs", "must be greater than zero"));
        }

        let google = &self.providers.google_books;
        let open_library = &self.providers.open_library;
        if !google.enabled && !open_library.enabled {
            return Err(invalid("providers", "at least one provider must be enabled"));
        }
        if google.enabled {
            url::Url::parse(&google.base_url)
                .map_err(|e| invalid("providers.google_books.base_url", &e.to_string()))?;
            if !(1..=40).contains(&google.max_results_cap) {
                return Err(invalid(
                    "providers.google_books.max_results_cap",
                    "must be between 1 and 40",
                ));
            }
        }
        if open_library.enabled {
            url::Url::parse(&open_library.base_url)
                .map_err(|e| invalid("providers.open_library.base_url", &e.to_string()))?;
            if open_library.max_results_cap == 0 {
                return Err(invalid(
                    "providers.open_library.max_results_cap",
                    "must be greater than zero",
                ));
            }
        }

        url::Url::parse(&self.covers.base_url)
            .map_err(|e| invalid("covers.base_url", &e.to_string()))?;
        if !matches!(self.covers.size.as_str(), "S" | "M" | "L") {
            return Err(invalid("covers.size", "must be one of S, M, L"));
        }

        if self.import.google_per_query == 0 || self.import.open_library_per_query == 0 {
            return Err(invalid("import", "per-query counts must be greater than zero"));
        }
        if self.import.popular_per_subject == 0 {
            return Err(invalid("import.popular_per_subject", "must be greater than zero"));
        }
        if self.augment.fetch_multiplier == 0 {
            return Err(invalid("augment.fetch_multiplier", "must be at least 1"));
        }
        if !self.store.in_memory && self.store.path.as_os_str().is_empty() {
            return Err(invalid("store.path", "must be set unless store.in_memory is true"));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Parse {
            context: "config".to_string(),
            message: e.to_string(),
        })
    }
}
