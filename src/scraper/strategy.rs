use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{AttributeMap, ProductDetails};

/// Resolves the platform-internal storefront identifier from a public
/// product URL.
#[async_trait]
pub trait ChannelResolver: Send + Sync {
    async fn resolve_channel_uid(&self, product_url: &str) -> Result<String>;
}

#[async_trait]
pub trait DetailScraper: Send + Sync {
    async fn scrape_product_detail(
        &self,
        channel_uid: &str,
        product_id: &str,
        product_url: &str,
    ) -> Result<ProductDetails>;
}

#[async_trait]
pub trait BenefitsScraper: Send + Sync {
    async fn scrape_benefits(&self, channel_uid: &str, product_id: &str) -> Result<AttributeMap>;
}

/// The bundle of scraping ports for one store.
#[derive(Clone)]
pub struct StoreStrategy {
    pub channel_resolver: Arc<dyn ChannelResolver>,
    pub detail_scraper: Arc<dyn DetailScraper>,
    pub benefits_scraper: Arc<dyn BenefitsScraper>,
}

/// Store-name → strategy lookup. Strategies are registered at wiring time;
/// there is no ambient registry.
#[derive(Default)]
pub struct StoreStrategyFactory {
    strategies: HashMap<String, StoreStrategy>,
}

impl StoreStrategyFactory {
    pub fn new() -> Self {
        StoreStrategyFactory {
            strategies: HashMap::new(),
        }
    }

    pub fn with_strategy(mut self, store_name: &str, strategy: StoreStrategy) -> Self {
        self.strategies.insert(store_name.to_string(), strategy);
        self
    }

    pub fn get(&self, store_name: &str) -> Option<&StoreStrategy> {
        self.strategies.get(store_name)
    }

    pub fn supported_stores(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }
}
