use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use shelve_catalog_ingest::client::providers::ProviderId;
use shelve_catalog_ingest::config::{LogFormat, LoggingConfig};
use shelve_catalog_ingest::repositories::Repository;
use shelve_catalog_ingest::{
    CatalogIngestService, CatalogStore, Config, ConfigOverrides, InMemoryCatalogStore,
    SledCatalogStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Aggregate book metadata from external catalogs into a deduplicated local catalog
#[derive(Parser, Debug)]
#[command(name = "shelve-catalog-ingest", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Catalog store directory
    #[arg(long, global = true, conflicts_with = "in_memory")]
    store: Option<PathBuf>,

    /// Use a throwaway in-memory catalog
    #[arg(long, global = true)]
    in_memory: bool,

    /// Log filter directive, e.g. `debug` or `shelve_catalog_ingest=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Search one provider (`google` or `openlibrary`)
    SearchProvider {
        provider: String,
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Search every provider without persisting
    SearchExternal {
        query: String,
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Look up one book by ISBN
    FetchIsbn { isbn: String },
    /// Import books for one subject
    ImportSubject {
        subject: String,
        #[arg(short, long, default_value_t = 20)]
        count: u32,
    },
    /// Import books for the configured popular subjects
    ImportPopular,
    /// Import books for each given subject
    ImportBulk {
        #[arg(required = true)]
        subjects: Vec<String>,
        #[arg(short, long, default_value_t = 20)]
        count: u32,
    },
    /// Populate an empty catalog from seed queries (or the fallback dataset)
    Seed,
    /// Search the local catalog, augmenting a short first page from providers
    Search {
        query: String,
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        size: usize,
    },
    /// Check provider and store health
    Health,
    /// Print the effective configuration as TOML
    Config,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            log_level: self.log_level.clone(),
            json_logs: self.json_logs.then_some(true),
            store_path: self.store.clone(),
            in_memory: self.in_memory.then_some(true),
            ..ConfigOverrides::default()
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output
    match logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn CatalogStore>> {
    if config.store.in_memory {
        return Ok(Arc::new(InMemoryCatalogStore::new()));
    }

    std::fs::create_dir_all(&config.store.path).with_context(|| {
        format!(
            "Failed to create store directory {}",
            config.store.path.display()
        )
    })?;
    let store = SledCatalogStore::open(&config.store.path).context("Failed to open catalog store")?;
    Ok(Arc::new(store))
}

async fn execute(service: &CatalogIngestService, command: Commands) -> Result<serde_json::Value> {
    let output = match command {
        Commands::SearchProvider {
            provider,
            query,
            limit,
        } => {
            let provider: ProviderId = provider.parse()?;
            let records = service.search_provider(provider, &query, limit).await?;
            json!({ "provider": provider.as_str(), "count": records.len(), "books": records })
        }
        Commands::SearchExternal { query, limit } => {
            let records = service.search_external(&query, limit).await?;
            json!({ "count": records.len(), "books": records })
        }
        Commands::FetchIsbn { isbn } => {
            json!({ "book": service.fetch_by_isbn(&isbn).await? })
        }
        Commands::ImportSubject { subject, count } => {
            let imported = service.import_by_subject(&subject, count).await?;
            json!({ "subject": subject, "imported": imported })
        }
        Commands::ImportPopular => {
            json!({ "imported": service.import_popular_books().await? })
        }
        Commands::ImportBulk { subjects, count } => {
            let imported = service.import_bulk(&subjects, count).await?;
            json!({ "subjects": subjects, "imported": imported })
        }
        Commands::Seed => match service.seed_catalog().await? {
            Some(report) => serde_json::to_value(report)?,
            None => json!({ "skipped": true, "reason": "catalog is not empty" }),
        },
        Commands::Search { query, page, size } => {
            serde_json::to_value(service.augmented_search(&query, page, size).await?)?
        }
        Commands::Health => serde_json::to_value(service.health_check().await?)?,
        Commands::Config => serde_json::to_value(service.config())?,
    };

    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let overrides = ConfigOverrides::from_env()?.merge(cli.overrides());
    config.apply_overrides(&overrides);

    init_tracing(&config.logging);
    config.validate().context("Invalid configuration")?;

    if matches!(cli.command, Commands::Config) {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let store = open_store(&config)?;
    info!("Using catalog store {}", store.name());

    let service = CatalogIngestService::new(config, store)?;
    let output = execute(&service, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
