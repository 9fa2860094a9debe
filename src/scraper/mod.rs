pub mod naver;
pub mod strategy;

pub use naver::naver_strategy;
pub use strategy::{
    BenefitsScraper, ChannelResolver, DetailScraper, StoreStrategy, StoreStrategyFactory,
};

use regex::Regex;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use tracing::{error, info, warn};

use crate::cache::TtlCache;
use crate::error::ScrapeError;
use crate::models::ScrapedProduct;
use crate::storage;

/// Admission check: the supported product-URL family. Everything else is
/// rejected before any network activity.
static PRODUCT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(?:smartstore|brand|m\.smartstore)\.naver\.com/[^/]+/products/\d+")
        .unwrap()
});

static PRODUCT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/products/(\d+)").unwrap());

/// Top-level use case: cache check, channel resolution, parallel
/// detail/benefits scrape, assembly, cache write, best-effort persist.
pub struct ScrapeCoordinator {
    cache: Arc<TtlCache<ScrapedProduct>>,
    strategies: Arc<StoreStrategyFactory>,
    cache_ttl_seconds: u64,
    data_dir: PathBuf,
}

impl ScrapeCoordinator {
    pub fn new(
        cache: Arc<TtlCache<ScrapedProduct>>,
        strategies: Arc<StoreStrategyFactory>,
        cache_ttl_seconds: u64,
    ) -> Self {
        ScrapeCoordinator {
            cache,
            strategies,
            cache_ttl_seconds,
            data_dir: PathBuf::from(storage::DATA_DIR),
        }
    }

    /// Redirect the persisted side artifacts, mainly for tests.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub async fn scrape(
        &self,
        store_name: &str,
        product_url: &str,
    ) -> Result<ScrapedProduct, ScrapeError> {
        if !PRODUCT_URL.is_match(product_url) {
            return Err(ScrapeError::InvalidUrl(format!(
                "productUrl must be a valid Naver SmartStore URL \
                 (https://smartstore.naver.com/{{store}}/products/{{id}}), got {product_url}"
            )));
        }

        let cache_key = format!("{store_name}:{product_url}");
        if let Some(cached) = self.cache.get(&cache_key) {
            info!("Cache hit for {}", product_url);
            return Ok(cached);
        }

        match self.scrape_fresh(store_name, product_url, &cache_key).await {
            Ok(product) => Ok(product),
            Err(cause) => {
                error!("Failed to scrape {}: {}", product_url, cause);
                Err(ScrapeError::ScrapingFailed(format!(
                    "Failed to scrape {product_url}: {cause}"
                )))
            }
        }
    }

    async fn scrape_fresh(
        &self,
        store_name: &str,
        product_url: &str,
        cache_key: &str,
    ) -> anyhow::Result<ScrapedProduct> {
        let product_id = extract_product_id(product_url);
        let strategy = self
            .strategies
            .get(store_name)
            .ok_or_else(|| anyhow::anyhow!("no scraping strategy registered for store {store_name}"))?;

        let channel_uid = strategy
            .channel_resolver
            .resolve_channel_uid(product_url)
            .await?;

        // Both must succeed; the first failure fails the whole call.
        let (details, benefits) = tokio::try_join!(
            strategy
                .detail_scraper
                .scrape_product_detail(&channel_uid, &product_id, product_url),
            strategy
                .benefits_scraper
                .scrape_benefits(&channel_uid, &product_id),
        )?;

        let product = ScrapedProduct {
            product_id,
            channel_uid,
            details,
            benefits,
            scraped_at: chrono::Utc::now(),
        };

        self.cache
            .set(cache_key, product.clone(), self.cache_ttl_seconds);

        // Detached so persistence latency and failures never reach the caller.
        let persisted = product.clone();
        let data_dir = self.data_dir.clone();
        tokio::spawn(async move {
            if let Err(err) = storage::save_scraped_result_to(
                &data_dir,
                &persisted.channel_uid,
                &persisted.product_id,
                &persisted,
            )
            .await
            {
                warn!("Failed to save result to file: {}", err);
            }
        });

        Ok(product)
    }
}

/// The numeric URL segment, or the literal `"unknown"` when the pattern
/// does not match. Proceeding with a placeholder id is intentional.
fn extract_product_id(product_url: &str) -> String {
    PRODUCT_ID
        .captures(product_url)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttributeMap, ProductDetails};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const VALID_URL: &str = "https://smartstore.naver.com/rainbows9030/products/11102379008";
    const CHANNEL_UID: &str = "2v1EJ3Fas87nW0bkfGZ7m";

    fn fixture_details() -> ProductDetails {
        let mut details = ProductDetails::new(VALID_URL, "generic-naver-html");
        details.title = Some("Test Product".to_string());
        details.description = Some("A great product description".to_string());
        details.image = Some("https://example.com/img1.jpg".to_string());
        details
    }

    fn fixture_benefits() -> AttributeMap {
        serde_json::json!({
            "coupons": [{
                "couponNo": "COUP001",
                "couponName": "10% Discount",
                "discountAmount": 2990,
                "discountType": "PERCENT",
            }]
        })
        .as_object()
        .unwrap()
        .clone()
    }

    struct MockResolver;

    #[async_trait]
    impl ChannelResolver for MockResolver {
        async fn resolve_channel_uid(&self, _product_url: &str) -> Result<String> {
            Ok(CHANNEL_UID.to_string())
        }
    }

    struct MockDetailScraper {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl DetailScraper for MockDetailScraper {
        async fn scrape_product_detail(
            &self,
            _channel_uid: &str,
            _product_id: &str,
            _product_url: &str,
        ) -> Result<ProductDetails> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("Network error"));
            }
            Ok(fixture_details())
        }
    }

    struct MockBenefitsScraper;

    #[async_trait]
    impl BenefitsScraper for MockBenefitsScraper {
        async fn scrape_benefits(
            &self,
            _channel_uid: &str,
            _product_id: &str,
        ) -> Result<AttributeMap> {
            Ok(fixture_benefits())
        }
    }

    fn coordinator(fail_detail: bool) -> (ScrapeCoordinator, Arc<AtomicUsize>, tempfile::TempDir) {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategy = StoreStrategy {
            channel_resolver: Arc::new(MockResolver),
            detail_scraper: Arc::new(MockDetailScraper {
                calls: calls.clone(),
                fail: fail_detail,
            }),
            benefits_scraper: Arc::new(MockBenefitsScraper),
        };
        let factory = StoreStrategyFactory::new().with_strategy("naver", strategy);
        let data_dir = tempfile::tempdir().unwrap();
        let coordinator = ScrapeCoordinator::new(
            Arc::new(TtlCache::new()),
            Arc::new(factory),
            600,
        )
        .with_data_dir(data_dir.path());
        (coordinator, calls, data_dir)
    }

    #[tokio::test]
    async fn test_invalid_url_fails_before_any_scraping() {
        let (coordinator, calls, _dir) = coordinator(false);

        let error = coordinator
            .scrape("naver", "https://google.com/invalid")
            .await
            .unwrap_err();
        assert!(matches!(error, ScrapeError::InvalidUrl(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scrape_assembles_product_and_caches() {
        let (coordinator, calls, _dir) = coordinator(false);

        let product = coordinator.scrape("naver", VALID_URL).await.unwrap();
        assert_eq!(product.product_id, "11102379008");
        assert_eq!(product.channel_uid, CHANNEL_UID);
        assert_eq!(product.details, fixture_details());
        assert_eq!(product.benefits, fixture_benefits());

        // Second call is a cache hit: identical result, zero new fetches.
        let again = coordinator.scrape("naver", VALID_URL).await.unwrap();
        assert_eq!(again, product);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scraper_failure_is_wrapped_with_cause() {
        let (coordinator, _calls, _dir) = coordinator(true);

        let error = coordinator.scrape("naver", VALID_URL).await.unwrap_err();
        match error {
            ScrapeError::ScrapingFailed(message) => {
                assert!(message.contains(VALID_URL));
                assert!(message.contains("Network error"));
            }
            other => panic!("expected ScrapingFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_store_is_scraping_failed() {
        let (coordinator, _calls, _dir) = coordinator(false);

        let error = coordinator.scrape("unsupported", VALID_URL).await.unwrap_err();
        assert!(matches!(error, ScrapeError::ScrapingFailed(_)));
    }

    #[tokio::test]
    async fn test_sibling_domain_is_accepted() {
        let (coordinator, _calls, _dir) = coordinator(false);

        let product = coordinator
            .scrape("naver", "https://brand.naver.com/somebrand/products/123")
            .await
            .unwrap();
        assert_eq!(product.product_id, "123");
    }

    #[test]
    fn test_product_id_fallback_to_unknown() {
        assert_eq!(extract_product_id(VALID_URL), "11102379008");
        assert_eq!(
            extract_product_id("https://smartstore.naver.com/shop/products/abc"),
            "unknown"
        );
    }
}
