pub mod google_books;
pub mod open_library;
pub mod traits;

pub use google_books::GoogleBooksProvider;
pub use open_library::OpenLibraryProvider;
pub use traits::{
    ProviderError, ProviderId, ProviderResult, RawPayload, SearchContext, SearchQuery, SearchType,
    SourceProvider,
};
