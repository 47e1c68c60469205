pub mod browser;
pub mod error;
pub mod factory;
pub mod imdb;
pub mod listing;
pub mod progress;
pub mod scraper;
pub mod tmdb;
pub mod traits;

pub use browser::{BrowserOptions, BrowserSession};
pub use error::SourceError;
pub use listing::BrowserListingScraper;
pub use progress::ProgressTracker;
pub use scraper::{ListingPage, ListingScraper, LookupScraper, PageFetcher, TitleQuery};
pub use traits::{AddRequest, BatchAddOutcome, BatchDeleteOutcome, RemoteAnchors, RemoteListAdapter, ReorderMove};
