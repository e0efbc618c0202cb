use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shelve_catalog_ingest::client::providers::google_books::{GoogleVolumeInfo, IndustryIdentifier};
use shelve_catalog_ingest::client::providers::open_library::OpenLibraryDoc;
use shelve_catalog_ingest::client::providers::RawPayload;
use shelve_catalog_ingest::client::{truncate, RecordNormalizer};
use shelve_catalog_ingest::BookRecord;

fn payloads() -> Vec<RawPayload> {
    (0..40)
        .flat_map(|i| {
            let google = GoogleVolumeInfo {
                title: Some(format!("Volume {i}")),
                authors: vec!["Frank Herbert".to_string()],
                published_date: Some("1965-08".to_string()),
                description: Some("d".repeat(5000)),
                industry_identifiers: vec![
                    IndustryIdentifier {
                        kind: "ISBN_10".to_string(),
                        identifier: format!("04411727{i:02}"),
                    },
                    IndustryIdentifier {
                        kind: "ISBN_13".to_string(),
                        identifier: format!("97804411727{i:02}"),
                    },
                ],
                categories: vec!["Science Fiction".to_string()],
                ..GoogleVolumeInfo::default()
            };
            let open_library = OpenLibraryDoc {
                title: Some(format!("Doc {i}")),
                author_name: vec!["J.R.R. Tolkien".to_string()],
                first_publish_year: Some(1954),
                cover_id: Some(14_625_765),
                subject: vec!["Fantasy".to_string()],
                ..OpenLibraryDoc::default()
            };
            [RawPayload::GoogleBooks(google), RawPayload::OpenLibrary(open_library)]
        })
        .collect()
}

fn benchmark_normalize(c: &mut Criterion) {
    let normalizer = RecordNormalizer::default();
    let batch = payloads();

    c.bench_function("normalize_batch_80", |b| {
        b.iter(|| normalizer.normalize_all(black_box(&batch)));
    });

    let long = "x".repeat(10_000);
    c.bench_function("truncate_description", |b| {
        b.iter(|| truncate(black_box(&long), 4000));
    });

    let record = BookRecord::new("The Hobbit, or There and Back Again", "J.R.R. Tolkien", "Fantasy");
    c.bench_function("identity_key_title_author", |b| {
        b.iter(|| black_box(&record).identity_key());
    });
}

criterion_group!(benches, benchmark_normalize);
criterion_main!(benches);
