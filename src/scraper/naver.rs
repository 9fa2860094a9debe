use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::NaverSection;
use crate::extractor;
use crate::fetcher::FetchOrchestrator;
use crate::models::{AttributeMap, ProductDetails};
use crate::scraper::strategy::{
    BenefitsScraper, ChannelResolver, DetailScraper, StoreStrategy,
};

const CHANNEL_UID_KEYS: [&str; 2] = ["channelUid", "channelNo"];

/// Resolves the channel uid by scraping the product page and digging it out
/// of the SSR payload. Unlike the best-effort detail fields, a missing uid
/// is an error: every downstream request is keyed by it.
pub struct NaverChannelResolver {
    orchestrator: Arc<FetchOrchestrator>,
}

#[async_trait]
impl ChannelResolver for NaverChannelResolver {
    async fn resolve_channel_uid(&self, product_url: &str) -> Result<String> {
        let details = self.orchestrator.fetch(product_url).await?;
        let Some(next_data) = &details.next_data else {
            bail!("no SSR payload on {product_url}, cannot resolve channel uid");
        };

        match extractor::find_deep_value(next_data, &CHANNEL_UID_KEYS) {
            Some(channel_uid) => {
                debug!("Resolved channel uid {} for {}", channel_uid, product_url);
                Ok(channel_uid)
            }
            None => bail!("channel uid not found in SSR payload of {product_url}"),
        }
    }
}

/// Scrapes the product page itself; the orchestrator runs the raw HTML
/// through the extraction engine.
pub struct NaverDetailScraper {
    orchestrator: Arc<FetchOrchestrator>,
}

#[async_trait]
impl DetailScraper for NaverDetailScraper {
    async fn scrape_product_detail(
        &self,
        channel_uid: &str,
        product_id: &str,
        product_url: &str,
    ) -> Result<ProductDetails> {
        debug!("Scraping detail for {}/{}", channel_uid, product_id);
        let details = self.orchestrator.fetch(product_url).await?;
        Ok(details)
    }
}

/// Fetches the channel benefits API (coupons, point rates) as JSON.
pub struct NaverBenefitsScraper {
    orchestrator: Arc<FetchOrchestrator>,
    api_base_url: String,
    benefits_path: String,
}

#[async_trait]
impl BenefitsScraper for NaverBenefitsScraper {
    async fn scrape_benefits(&self, channel_uid: &str, product_id: &str) -> Result<AttributeMap> {
        let url = format!(
            "{}/channels/{}/products/{}{}",
            self.api_base_url, channel_uid, product_id, self.benefits_path
        );
        let payload = self
            .orchestrator
            .fetch_json(&url)
            .await
            .with_context(|| format!("benefits fetch failed for {channel_uid}/{product_id}"))?;

        // A non-object body is still worth keeping, just namespaced.
        Ok(match payload {
            serde_json::Value::Object(map) => map,
            other => {
                let mut map = AttributeMap::new();
                map.insert("raw".to_string(), other);
                map
            }
        })
    }
}

/// Wires the three Naver ports around one shared orchestrator.
pub fn naver_strategy(
    orchestrator: Arc<FetchOrchestrator>,
    config: &NaverSection,
) -> StoreStrategy {
    StoreStrategy {
        channel_resolver: Arc::new(NaverChannelResolver {
            orchestrator: orchestrator.clone(),
        }),
        detail_scraper: Arc::new(NaverDetailScraper {
            orchestrator: orchestrator.clone(),
        }),
        benefits_scraper: Arc::new(NaverBenefitsScraper {
            orchestrator,
            api_base_url: config.api_base_url.clone(),
            benefits_path: config.benefits_path.clone(),
        }),
    }
}
