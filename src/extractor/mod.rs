//! Structured extraction from heterogeneous product-page HTML.
//!
//! Layered source precedence, each layer only filling fields not already set
//! by a higher layer: Open-Graph tags, then document `<title>` / meta
//! description, then the embedded SSR JSON payload, then JSON-LD blocks.
//! Raw intermediate blobs are kept alongside the normalized fields.
//!
//! Pure function of its input: no network, no randomness, and every pass
//! runs a fresh matcher so concurrent calls cannot interfere.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::ProductDetails;

pub const SOURCE: &str = "generic-naver-html";

/// Attribute order in the source markup is not guaranteed, so every meta
/// scan runs a forward (`property` before `content`) and a reverse pattern.
static OG_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?(?:property|name)=["']og:(\w+)["'][^>]*?content=["']([^"']*)["'][^>]*>"#).unwrap()
});
static OG_TAG_REVERSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?content=["']([^"']*)["'][^>]*?(?:property|name)=["']og:(\w+)["'][^>]*>"#).unwrap()
});
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static META_DESC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?name=["']description["'][^>]*?content=["']([^"']*)["'][^>]*>"#)
        .unwrap()
});
static META_DESC_REVERSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?content=["']([^"']*)["'][^>]*?name=["']description["'][^>]*>"#)
        .unwrap()
});
static META_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?(?:name|property)=["']([^"']+)["'][^>]*?content=["']([^"']*)["'][^>]*>"#).unwrap()
});
static META_TAG_REVERSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?content=["']([^"']*)["'][^>]*?(?:name|property)=["']([^"']+)["'][^>]*>"#).unwrap()
});
static NEXT_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*id=["']__NEXT_DATA__["'][^>]*>(.*?)</script>"#).unwrap()
});
static JSON_LD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type=["']application/ld\+json["'][^>]*>(.*?)</script>"#).unwrap()
});

/// Recursion bound for the SSR payload search.
const MAX_SEARCH_DEPTH: usize = 5;

const TITLE_KEYS: [&str; 4] = ["title", "name", "productName", "fundingTitle"];
const DESCRIPTION_KEYS: [&str; 3] = ["description", "summary", "content"];
const IMAGE_KEYS: [&str; 5] = ["image", "imageUrl", "thumbnailUrl", "thumbnail", "mainImage"];
const PRICE_KEYS: [&str; 4] = ["price", "salePrice", "currentAmount", "amount"];

/// Turn raw HTML into a structured attribute bag. Deterministic and pure.
pub fn extract(html: &str, source_url: &str) -> ProductDetails {
    let mut details = ProductDetails::new(source_url, SOURCE);

    let og_tags = extract_og_tags(html);
    details.title = og_tags.get("title").cloned().or_else(|| extract_title(html));
    details.description = og_tags
        .get("description")
        .cloned()
        .or_else(|| extract_meta_description(html));
    details.image = og_tags.get("image").cloned();
    if !og_tags.is_empty() {
        details.og_tags = Some(og_tags);
    }

    let meta_tags = extract_meta_tags(html);
    if !meta_tags.is_empty() {
        details.meta_tags = Some(meta_tags);
    }

    if let Some(raw) = NEXT_DATA.captures(html).and_then(|caps| caps.get(1)) {
        match serde_json::from_str::<Value>(raw.as_str().trim()) {
            Ok(next_data) => {
                enrich_from_next_data(&mut details, &next_data);
                details.next_data = Some(next_data);
            }
            Err(_) => debug!("Could not parse __NEXT_DATA__ payload"),
        }
    }

    let mut json_ld = Vec::new();
    for caps in JSON_LD.captures_iter(html) {
        match serde_json::from_str::<Value>(caps[1].trim()) {
            Ok(block) => json_ld.push(block),
            Err(_) => debug!("Skipping malformed JSON-LD block"),
        }
    }
    if !json_ld.is_empty() {
        enrich_from_json_ld(&mut details, &json_ld);
        details.json_ld = Some(json_ld);
    }

    details
}

fn extract_og_tags(html: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();

    for caps in OG_TAG.captures_iter(html) {
        tags.entry(caps[1].to_string())
            .or_insert_with(|| decode_html_entities(&caps[2]));
    }
    for caps in OG_TAG_REVERSE.captures_iter(html) {
        tags.entry(caps[2].to_string())
            .or_insert_with(|| decode_html_entities(&caps[1]));
    }

    tags
}

fn extract_title(html: &str) -> Option<String> {
    let title = TITLE.captures(html)?[1].trim().to_string();
    if title.is_empty() {
        None
    } else {
        Some(decode_html_entities(&title))
    }
}

fn extract_meta_description(html: &str) -> Option<String> {
    META_DESC
        .captures(html)
        .or_else(|| META_DESC_REVERSE.captures(html))
        .map(|caps| decode_html_entities(&caps[1]))
}

/// Every non-`og:` meta tag, kept as an auxiliary map for downstream use.
fn extract_meta_tags(html: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();

    for caps in META_TAG.captures_iter(html) {
        let key = &caps[1];
        if !key.starts_with("og:") {
            tags.entry(key.to_string())
                .or_insert_with(|| decode_html_entities(&caps[2]));
        }
    }
    for caps in META_TAG_REVERSE.captures_iter(html) {
        let key = &caps[2];
        if !key.starts_with("og:") {
            tags.entry(key.to_string())
                .or_insert_with(|| decode_html_entities(&caps[1]));
        }
    }

    tags
}

fn enrich_from_next_data(details: &mut ProductDetails, next_data: &Value) {
    let Some(page_props) = next_data.get("props").and_then(|props| props.get("pageProps")) else {
        return;
    };

    if details.title.is_none() {
        details.title = find_deep_value(page_props, &TITLE_KEYS);
    }
    if details.description.is_none() {
        details.description = find_deep_value(page_props, &DESCRIPTION_KEYS);
    }
    if details.image.is_none() {
        details.image = find_deep_value(page_props, &IMAGE_KEYS);
    }
    if details.price.is_none() {
        details.price = find_deep_value(page_props, &PRICE_KEYS);
    }
}

fn enrich_from_json_ld(details: &mut ProductDetails, blocks: &[Value]) {
    for block in blocks {
        let Some(object) = block.as_object() else {
            continue;
        };

        if details.title.is_none() {
            details.title = object.get("name").and_then(scalar_to_string);
        }
        if details.description.is_none() {
            details.description = object.get("description").and_then(scalar_to_string);
        }
        if details.image.is_none() {
            details.image = object.get("image").and_then(normalize_json_ld_image);
        }
    }
}

/// JSON-LD `image` can be a string, a list of strings/objects, or an object
/// carrying a `url` property.
fn normalize_json_ld_image(image: &Value) -> Option<String> {
    match image {
        Value::String(url) => Some(url.clone()),
        Value::Array(items) => match items.first()? {
            Value::String(url) => Some(url.clone()),
            Value::Object(object) => object.get("url").and_then(scalar_to_string),
            _ => None,
        },
        Value::Object(object) => object.get("url").and_then(scalar_to_string),
        _ => None,
    }
}

/// Tries each candidate key with a full bounded-depth search before moving
/// to the next candidate: breadth across names before depth.
pub fn find_deep_value(value: &Value, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find_map(|key| deep_get(value, key, 0).and_then(scalar_to_string))
}

fn deep_get<'a>(value: &'a Value, key: &str, depth: usize) -> Option<&'a Value> {
    if depth > MAX_SEARCH_DEPTH {
        return None;
    }
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key) {
                if !found.is_null() {
                    return Some(found);
                }
            }
            map.values()
                .filter(|child| child.is_object() || child.is_array())
                .find_map(|child| deep_get(child, key, depth + 1))
        }
        Value::Array(items) => items
            .iter()
            .filter(|child| child.is_object() || child.is_array())
            .find_map(|child| deep_get(child, key, depth + 1)),
        _ => None,
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Applied to text pulled from tag attributes or bodies, never to values a
/// JSON parser already decoded.
fn decode_html_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}
