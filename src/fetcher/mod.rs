pub mod orchestrator;

pub use orchestrator::FetchOrchestrator;

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use wreq::{Client, Proxy};
use wreq_util::Emulation;

use crate::error::FetchError;

/// Options for one low-level page fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: Vec<(String, String)>,
    pub proxy: Option<String>,
    pub timeout_ms: u64,
}

/// Raw outcome of one fetch attempt. HTTP statuses are reported here and
/// classified by the orchestrator; only transport-level failures are errors.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
    pub content_type: String,
}

/// The low-level page-fetching mechanism. Whether this is a plain HTTP
/// client or a full browser engine is an implementation detail behind this
/// contract; the orchestrator only sees status + body.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str, options: &FetchOptions)
    -> Result<FetchedPage, FetchError>;
}

/// Production fetcher on a TLS-emulating HTTP client. Proxied attempts get
/// a dedicated client because proxy routing is a client-level setting.
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder().emulation(Emulation::Firefox136).build()?;
        Ok(HttpPageFetcher { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchedPage, FetchError> {
        let client = match &options.proxy {
            Some(proxy_url) => Client::builder()
                .emulation(Emulation::Firefox136)
                .proxy(Proxy::all(proxy_url.as_str())?)
                .build()?,
            None => self.client.clone(),
        };

        debug!(
            "GET {} {}",
            url,
            if options.proxy.is_some() { "via proxy" } else { "direct" }
        );

        let mut request = client.get(url);
        if options.timeout_ms > 0 {
            request = request.timeout(Duration::from_millis(options.timeout_ms));
        }
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await?;

        Ok(FetchedPage {
            status,
            body,
            content_type,
        })
    }
}
