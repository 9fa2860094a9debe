use anyhow::Result;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::models::ScrapedProduct;

/// Process-relative root for persisted scrape results.
pub const DATA_DIR: &str = "data";

/// Persist one scrape result as `{data_dir}/{channel_uid}/{product_id}.json`.
/// This is a best-effort side channel; callers log failures and move on.
pub async fn save_scraped_result_to(
    data_dir: &Path,
    channel_uid: &str,
    product_id: &str,
    product: &ScrapedProduct,
) -> Result<()> {
    let channel_dir = data_dir.join(channel_uid);
    fs::create_dir_all(&channel_dir).await?;

    let path = channel_dir.join(format!("{product_id}.json"));
    let json = serde_json::to_string_pretty(product)?;
    fs::write(&path, json).await?;

    debug!("Saved scrape result to {}", path.display());
    Ok(())
}

pub async fn save_scraped_result(
    channel_uid: &str,
    product_id: &str,
    product: &ScrapedProduct,
) -> Result<()> {
    save_scraped_result_to(Path::new(DATA_DIR), channel_uid, product_id, product).await
}
