pub mod scraper_config;

pub use scraper_config::{NaverSection, ProxySection, ScraperConfig, ScrapingSection};
