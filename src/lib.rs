pub mod cache;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod identity;
pub mod models;
pub mod proxy;
pub mod scraper;
pub mod storage;

pub use cache::TtlCache;
pub use config::ScraperConfig;
pub use error::{FetchError, ScrapeError};
pub use models::{AttributeMap, ProductDetails, ScrapedProduct};
pub use scraper::ScrapeCoordinator;
