use shelve_catalog_ingest::repositories::{Repository, RepositoryError};
use shelve_catalog_ingest::{BookRecord, CatalogIngestService, CatalogStore, Config, SledCatalogStore};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::assert_ok;

fn hobbit() -> BookRecord {
    BookRecord::new("The Hobbit", "J.R.R. Tolkien", "Fantasy").with_isbn("9780618002214")
}

#[tokio::test]
async fn test_catalog_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("catalog");

    {
        let store = SledCatalogStore::open(&path).unwrap();
        assert_ok!(store.save(&hobbit()).await);
        assert_ok!(
            store
                .save(&BookRecord::new("Untitled Notes", "Anon", "General"))
                .await
        );
        assert_ok!(store.flush().await);
    }

    let store = SledCatalogStore::open(&path).unwrap();
    assert_eq!(store.count().await.unwrap(), 2);
    assert!(store.exists_by_isbn("9780618002214").await.unwrap());
    assert!(store
        .exists_by_title_author("untitled notes", "ANON")
        .await
        .unwrap());

    let err = store.save(&hobbit()).await.unwrap_err();
    assert!(matches!(err, RepositoryError::ConstraintViolation { .. }));

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_entities, 2);
    assert_eq!(stats.rejected_duplicates, 1);
}

#[tokio::test]
async fn test_isbn_record_does_not_collide_on_title() {
    let temp_dir = TempDir::new().unwrap();
    let store = SledCatalogStore::open(temp_dir.path()).unwrap();

    assert_ok!(store.save(&hobbit()).await);
    // another edition of the same work
    assert_ok!(
        store
            .save(&hobbit().with_isbn("9780547928227"))
            .await
    );
    // no ISBN: title/author is the identity, and it is taken
    let err = store
        .save(&BookRecord::new("the hobbit", "J.R.R. Tolkien", "Fantasy"))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::ConstraintViolation { .. }));
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_offline_seed_into_sled_store() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.import.use_api = false;
    config.store.path = temp_dir.path().join("catalog");

    let store: Arc<dyn CatalogStore> = Arc::new(SledCatalogStore::open(&config.store.path).unwrap());
    let service = CatalogIngestService::new(config, Arc::clone(&store)).unwrap();

    let report = service.seed_catalog().await.unwrap().unwrap();
    assert_eq!(report.fallback_imported, report.total_imported());
    assert_eq!(store.count().await.unwrap(), report.total_imported() as u64);

    let page = service.augmented_search("tolkien", 0, 1).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page.content[0].isbn.as_deref(), Some("9780618002214"));
}
