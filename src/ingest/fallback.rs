//! Hand-curated catalog loaded when live import under-delivers.

use crate::client::record::DEFAULT_LANGUAGE;
use crate::client::{parse_published_date, BookRecord, RecordNormalizer};

/// One curated entry
#[derive(Debug, Clone, Copy)]
pub struct FallbackBook {
    pub title: &'static str,
    pub author: &'static str,
    pub isbn: &'static str,
    pub genre: &'static str,
    pub published: &'static str,
    pub page_count: u32,
    pub publisher: &'static str,
    pub average_rating: f64,
    pub ratings_count: u32,
    pub description: &'static str,
}

macro_rules! book {
    ($title:expr, $author:expr, $isbn:expr, $genre:expr, $published:expr, $pages:expr,
     $publisher:expr, $rating:expr, $count:expr, $description:expr) => {
        FallbackBook {
            title: $title,
            author: $author,
            isbn: $isbn,
            genre: $genre,
            published: $published,
            page_count: $pages,
            publisher: $publisher,
            average_rating: $rating,
            ratings_count: $count,
            description: $description,
        }
    };
}

pub const FALLBACK_BOOKS: &[FallbackBook] = &[
    book!("To Kill a Mockingbird", "Harper Lee", "9780061120084", "Fiction", "1960-07-11", 281,
        "J. B. Lippincott & Co.", 4.5, 1250,
        "A classic of modern American literature about racial injustice in the Deep South."),
    book!("The Great Gatsby", "F. Scott Fitzgerald", "9780743273565", "Fiction", "1925-04-10", 180,
        "Charles Scribner's Sons", 4.3, 890,
        "A tragic love story set in the Jazz Age exploring the American Dream."),
    book!("1984", "George Orwell", "9780452284234", "Science Fiction", "1949-06-08", 328,
        "Secker & Warburg", 4.4, 980,
        "A dystopian masterpiece about totalitarianism and the manipulation of truth."),
    book!("Dune", "Frank Herbert", "9780441172719", "Science Fiction", "1965-08-01", 688,
        "Chilton Books", 4.7, 1500,
        "An epic science fiction saga set on the desert planet Arrakis."),
    book!("The Hunger Games", "Suzanne Collins", "9780439023481", "Science Fiction", "2008-09-14", 374,
        "Scholastic Press", 4.5, 1800,
        "A dystopian novel about a televised fight to the death."),
    book!("The Hobbit", "J.R.R. Tolkien", "9780618002214", "Fantasy", "1937-09-21", 310,
        "George Allen & Unwin", 4.8, 2000,
        "A fantasy adventure following Bilbo Baggins on an unexpected journey."),
    book!("Harry Potter and the Sorcerer's Stone", "J.K. Rowling", "9780590353403", "Fantasy",
        "1997-06-26", 309, "Bloomsbury", 4.9, 3500,
        "A young wizard discovers his magical heritage at Hogwarts School."),
    book!("A Game of Thrones", "George R.R. Martin", "9780553103540", "Fantasy", "1996-08-01", 694,
        "Bantam Spectra", 4.6, 1800,
        "Epic fantasy of noble houses fighting for the Iron Throne."),
    book!("Gone Girl", "Gillian Flynn", "9780307588364", "Thriller", "2012-06-05", 415,
        "Crown Publishing", 4.2, 1100,
        "A psychological thriller about a husband suspected of his wife's disappearance."),
    book!("The Girl with the Dragon Tattoo", "Stieg Larsson", "9780307269751", "Mystery",
        "2005-08-01", 465, "Norstedts Förlag", 4.3, 950,
        "A journalist and hacker investigate a decades-old disappearance."),
    book!("Pride and Prejudice", "Jane Austen", "9780141439518", "Romance", "1813-01-28", 432,
        "T. Egerton", 4.6, 1100,
        "A romantic novel following Elizabeth Bennet and Mr. Darcy."),
    book!("Outlander", "Diana Gabaldon", "9780440212560", "Romance", "1991-06-01", 850,
        "Delacorte Press", 4.5, 1300,
        "A WWII nurse travels back in time to 18th-century Scotland."),
    book!("Atomic Habits", "James Clear", "9780735211292", "Self-Help", "2018-10-16", 320,
        "Avery", 4.8, 2200,
        "A practical guide to building good habits and breaking bad ones."),
    book!("Sapiens: A Brief History of Humankind", "Yuval Noah Harari", "9780062316097",
        "Non-Fiction", "2011-01-01", 443, "Harper", 4.6, 1700,
        "An exploration of how Homo sapiens came to dominate the world."),
    book!("Thinking, Fast and Slow", "Daniel Kahneman", "9780374275631", "Psychology",
        "2011-10-25", 499, "Farrar, Straus and Giroux", 4.5, 1400,
        "A groundbreaking look at the two systems that drive how we think."),
    book!("Steve Jobs", "Walter Isaacson", "9781451648539", "Biography", "2011-10-24", 656,
        "Simon & Schuster", 4.4, 1300,
        "The definitive biography of Apple co-founder Steve Jobs."),
    book!("Becoming", "Michelle Obama", "9781524763138", "Biography", "2018-11-13", 448,
        "Crown Publishing", 4.7, 1600,
        "The memoir of former First Lady Michelle Obama."),
    book!("Where the Crawdads Sing", "Delia Owens", "9780735219090", "Fiction", "2018-08-14", 368,
        "G.P. Putnam's Sons", 4.6, 1550,
        "A coming-of-age mystery set in the marshes of North Carolina."),
    book!("Project Hail Mary", "Andy Weir", "9780593135204", "Science Fiction", "2021-05-04", 496,
        "Ballantine Books", 4.9, 1900,
        "An astronaut wakes up alone on a spacecraft with no memory."),
];

impl FallbackBook {
    #[must_use]
    pub fn to_record(&self, normalizer: &RecordNormalizer) -> BookRecord {
        let mut record = BookRecord::new(self.title, self.author, self.genre).with_isbn(self.isbn);
        record.description = Some(self.description.to_string());
        record.cover_url = Some(normalizer.cover_url_by_isbn(self.isbn));
        record.published_date = parse_published_date(self.published);
        record.page_count = Some(self.page_count);
        record.publisher = Some(self.publisher.to_string());
        record.language = Some(DEFAULT_LANGUAGE.to_string());
        record.average_rating = Some(self.average_rating);
        record.ratings_count = Some(self.ratings_count);
        record
    }
}

/// The curated dataset as records, covers pointing at the configured image server
#[must_use]
pub fn fallback_records(normalizer: &RecordNormalizer) -> Vec<BookRecord> {
    FALLBACK_BOOKS.iter().map(|book| book.to_record(normalizer)).collect()
}
