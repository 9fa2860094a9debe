use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use tracing::info;

use store_scraper::cache::TtlCache;
use store_scraper::config::ScraperConfig;
use store_scraper::fetcher::{FetchOrchestrator, HttpPageFetcher};
use store_scraper::identity::{RandomSource, ThreadRngSource};
use store_scraper::proxy::ProxyPool;
use store_scraper::scraper::{ScrapeCoordinator, StoreStrategyFactory, naver_strategy};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let mut args = env::args().skip(1);
    let product_url = args
        .next()
        .context("usage: store-scraper <product-url> [store] [config.toml]")?;
    let store_name = args.next().unwrap_or_else(|| "naver".to_string());

    let mut config = match args.next() {
        Some(path) => ScraperConfig::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {path}"))?,
        None => ScraperConfig::default(),
    };
    config.apply_env_overrides();

    info!("Scraping {} (store: {})", product_url, store_name);

    let rng: Arc<dyn RandomSource> = Arc::new(ThreadRngSource);
    let proxies = Arc::new(ProxyPool::from_config(&config.proxy));
    let fetcher = Arc::new(HttpPageFetcher::new().context("Failed to build HTTP client")?);
    let orchestrator = Arc::new(FetchOrchestrator::new(
        fetcher,
        proxies,
        rng,
        &config.scraping,
    ));

    let strategies = StoreStrategyFactory::new()
        .with_strategy("naver", naver_strategy(orchestrator, &config.naver));
    let coordinator = ScrapeCoordinator::new(
        Arc::new(TtlCache::new()),
        Arc::new(strategies),
        config.scraping.cache_ttl_seconds,
    );

    let product = coordinator.scrape(&store_name, &product_url).await?;
    println!("{}", serde_json::to_string_pretty(&product)?);

    Ok(())
}
