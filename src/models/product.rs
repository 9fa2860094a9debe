use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Open mapping of best-effort attributes (benefits payload, raw blobs).
pub type AttributeMap = serde_json::Map<String, Value>;

/// Final assembly of one scrape run. Built once by the coordinator and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedProduct {
    pub product_id: String,
    pub channel_uid: String,
    pub details: ProductDetails,
    pub benefits: AttributeMap,
    pub scraped_at: DateTime<Utc>,
}

/// Union of everything the extraction engine pulled out of one page.
/// The normalized fields are best-effort; the raw blobs (`og_tags`,
/// `meta_tags`, `next_data`, `json_ld`) are kept so downstream consumers
/// can recover anything the fallback search missed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub url: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub og_tags: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_tags: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_ld: Option<Vec<Value>>,
}

impl ProductDetails {
    pub fn new(url: &str, source: &str) -> Self {
        ProductDetails {
            url: url.to_string(),
            source: source.to_string(),
            ..Default::default()
        }
    }
}
