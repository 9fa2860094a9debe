use thiserror::Error;

/// Failures inside the fetch layer. `RateLimited` and `UnexpectedStatus`
/// are per-attempt outcomes consumed by the retry loop; only `FetchFailed`
/// leaves the orchestrator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rate limited by server ({status})")]
    RateLimited { status: u16 },

    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("network error: {0}")]
    Network(#[from] wreq::Error),

    #[error("malformed response body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("fetch failed after {attempts} attempts: {last}")]
    FetchFailed { attempts: usize, last: String },
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }
}

/// Failures crossing the scrape coordinator boundary. Everything that is not
/// a malformed input is flattened into `ScrapingFailed` carrying the cause.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid product url: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    ScrapingFailed(String),
}
