use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::config::ScrapingSection;
use crate::error::FetchError;
use crate::extractor;
use crate::fetcher::{FetchOptions, FetchedPage, PageFetcher};
use crate::identity::{FingerprintRotator, RandomSource};
use crate::models::ProductDetails;
use crate::proxy::{ProxyInfo, ProxyPool};

/// Statuses the target site uses to signal request-pattern throttling.
/// 490 is the site-specific block status next to the standard 429.
const RATE_LIMIT_STATUSES: [u16; 2] = [429, 490];

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const REFERER: &str = "https://www.naver.com/";

/// State of one logical fetch while its retry loop runs. Never persisted.
struct RetryContext<'a> {
    attempt: usize,
    url: &'a str,
    proxy: Option<ProxyInfo>,
}

/// Bounded-concurrency, rate-limited, retrying fetch driver.
///
/// Two intersecting policies:
/// - at most `max_concurrent` logical fetches in flight, with at least
///   `throttle_min_time_ms` between successive dispatches. The concurrency
///   slot is held for the whole retry sequence, not per attempt.
/// - up to `max_retries` attempts per fetch. A rate-limit response backs off
///   linearly with the attempt number and does NOT mark the proxy failed
///   (the block is request-pattern based, the proxy may be fine); any other
///   failure marks the proxy failed and backs off a flat `min_delay_ms`.
pub struct FetchOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    proxies: Arc<ProxyPool>,
    fingerprints: FingerprintRotator,
    rng: Arc<dyn RandomSource>,
    semaphore: Arc<Semaphore>,
    next_dispatch: Mutex<Instant>,
    min_time: Duration,
    max_retries: usize,
    min_delay_ms: u64,
    max_delay_ms: u64,
    timeout_ms: u64,
}

impl FetchOrchestrator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        proxies: Arc<ProxyPool>,
        rng: Arc<dyn RandomSource>,
        config: &ScrapingSection,
    ) -> Self {
        FetchOrchestrator {
            fetcher,
            proxies,
            fingerprints: FingerprintRotator::new(rng.clone()),
            rng,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            next_dispatch: Mutex::new(Instant::now()),
            min_time: Duration::from_millis(config.throttle_min_time_ms),
            max_retries: config.max_retries,
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms,
            timeout_ms: config.timeout_ms,
        }
    }

    /// Fetch an HTML page and run it through the extraction engine.
    pub async fn fetch(&self, url: &str) -> Result<ProductDetails, FetchError> {
        let page = self
            .fetch_raw(url, &[("Accept", HTML_ACCEPT), ("Referer", REFERER)])
            .await?;
        Ok(extractor::extract(&page.body, url))
    }

    /// Fetch a JSON endpoint under the same concurrency/retry policy.
    pub async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let page = self.fetch_raw(url, &[("Referer", REFERER)]).await?;
        Ok(serde_json::from_str(&page.body)?)
    }

    async fn fetch_raw(
        &self,
        url: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<FetchedPage, FetchError> {
        // The permit spans the entire retry sequence.
        let _permit = self.semaphore.acquire().await.expect("semaphore closed");
        self.wait_for_dispatch_slot().await;

        let mut ctx = RetryContext {
            attempt: 1,
            url,
            proxy: None,
        };

        loop {
            ctx.proxy = self.proxies.next();

            match self.attempt(&ctx, extra_headers).await {
                Ok(page) => return Ok(page),
                Err(error) => {
                    let rate_limited = error.is_rate_limited();
                    if !rate_limited {
                        if let Some(proxy) = &ctx.proxy {
                            self.proxies.mark_failed(proxy);
                        }
                    }

                    if ctx.attempt >= self.max_retries {
                        return Err(FetchError::FetchFailed {
                            attempts: ctx.attempt,
                            last: error.to_string(),
                        });
                    }

                    let backoff = if rate_limited {
                        // The server signaled a cooldown; respect it and escalate.
                        3_000 * ctx.attempt as u64
                    } else {
                        self.min_delay_ms
                    };
                    warn!(
                        "Retry {}/{} for {} (wait {}ms): {}",
                        ctx.attempt, self.max_retries, url, backoff, error
                    );
                    self.random_sleep(backoff, backoff + 1_000).await;
                    ctx.attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        ctx: &RetryContext<'_>,
        extra_headers: &[(&str, &str)],
    ) -> Result<FetchedPage, FetchError> {
        // Human-like pause before every attempt.
        self.random_sleep(self.min_delay_ms, self.max_delay_ms).await;

        let fingerprint = self.fingerprints.generate();
        let mut headers: Vec<(String, String)> = fingerprint
            .headers()
            .into_iter()
            .filter(|(name, _)| {
                !extra_headers
                    .iter()
                    .any(|(extra, _)| extra.eq_ignore_ascii_case(name))
            })
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        for (name, value) in extra_headers {
            headers.push((name.to_string(), value.to_string()));
        }

        let options = FetchOptions {
            headers,
            proxy: ctx.proxy.as_ref().map(|proxy| proxy.url.clone()),
            timeout_ms: self.timeout_ms,
        };

        debug!("Attempt {} for {}", ctx.attempt, ctx.url);
        let page = self.fetcher.fetch_page(ctx.url, &options).await?;

        if RATE_LIMIT_STATUSES.contains(&page.status) {
            warn!("{} rate limited: {}", page.status, ctx.url);
            return Err(FetchError::RateLimited {
                status: page.status,
            });
        }
        if !(200..300).contains(&page.status) {
            return Err(FetchError::UnexpectedStatus {
                status: page.status,
                url: ctx.url.to_string(),
            });
        }

        Ok(page)
    }

    /// Leaky-bucket dispatch gate: successive logical fetches are spaced at
    /// least `min_time` apart, regardless of which task dispatches them.
    async fn wait_for_dispatch_slot(&self) {
        let wait = {
            let mut next = self.next_dispatch.lock().expect("dispatch gate poisoned");
            let now = Instant::now();
            let slot = (*next).max(now);
            *next = slot + self.min_time;
            slot.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn random_sleep(&self, min_ms: u64, max_ms: u64) {
        let delay = self.rng.delay_ms(min_ms, max_ms);
        if delay > 0 {
            sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::testing::ScriptedRandom;
    use async_trait::async_trait;

    /// Replays a scripted sequence of attempt outcomes.
    struct MockFetcher {
        outcomes: Mutex<Vec<Outcome>>,
        seen_proxies: Mutex<Vec<Option<String>>>,
    }

    enum Outcome {
        Page(u16, &'static str),
        NetworkError,
    }

    impl MockFetcher {
        fn new(outcomes: Vec<Outcome>) -> Self {
            MockFetcher {
                outcomes: Mutex::new(outcomes),
                seen_proxies: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch_page(
            &self,
            url: &str,
            options: &FetchOptions,
        ) -> Result<FetchedPage, FetchError> {
            self.seen_proxies
                .lock()
                .unwrap()
                .push(options.proxy.clone());
            match self.outcomes.lock().unwrap().remove(0) {
                Outcome::Page(status, body) => Ok(FetchedPage {
                    status,
                    body: body.to_string(),
                    content_type: "text/html".to_string(),
                }),
                Outcome::NetworkError => Err(FetchError::UnexpectedStatus {
                    status: 0,
                    url: url.to_string(),
                }),
            }
        }
    }

    fn proxy(n: u16) -> ProxyInfo {
        ProxyInfo {
            url: format!("http://proxy{n}.example.com:{}", 8000 + n),
            host: format!("proxy{n}.example.com"),
            port: 8000 + n,
            username: None,
            password: None,
        }
    }

    fn orchestrator(
        outcomes: Vec<Outcome>,
        proxies: Vec<ProxyInfo>,
    ) -> (FetchOrchestrator, Arc<ProxyPool>) {
        let pool = Arc::new(ProxyPool::new(proxies));
        let config = ScrapingSection {
            throttle_min_time_ms: 0,
            ..Default::default()
        };
        let orchestrator = FetchOrchestrator::new(
            Arc::new(MockFetcher::new(outcomes)),
            pool.clone(),
            Arc::new(ScriptedRandom::new(Vec::new())),
            &config,
        );
        (orchestrator, pool)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retries_without_marking_proxy_failed() {
        let html = "<html><head><meta property=\"og:title\" content=\"Widget\"></head></html>";
        let (orchestrator, pool) = orchestrator(
            vec![
                Outcome::Page(429, ""),
                Outcome::Page(429, ""),
                Outcome::Page(200, html),
            ],
            vec![proxy(1), proxy(2)],
        );

        let details = orchestrator.fetch("https://smartstore.naver.com/s/products/1").await.unwrap();
        assert_eq!(details.title.as_deref(), Some("Widget"));
        assert_eq!(pool.active_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_error_marks_proxy_failed() {
        let (orchestrator, pool) = orchestrator(
            vec![Outcome::NetworkError, Outcome::Page(200, "<html></html>")],
            vec![proxy(1), proxy(2)],
        );

        orchestrator.fetch("https://smartstore.naver.com/s/products/1").await.unwrap();
        assert_eq!(pool.active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fail_with_last_error() {
        let (orchestrator, _pool) = orchestrator(
            vec![
                Outcome::Page(500, ""),
                Outcome::Page(500, ""),
                Outcome::Page(500, ""),
            ],
            Vec::new(),
        );

        let error = orchestrator
            .fetch("https://smartstore.naver.com/s/products/1")
            .await
            .unwrap_err();
        match error {
            FetchError::FetchFailed { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(last.contains("500"));
            }
            other => panic!("expected FetchFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_json_parses_body() {
        let (orchestrator, _pool) = orchestrator(
            vec![Outcome::Page(200, r#"{"coupons":[{"couponNo":"COUP001"}]}"#)],
            Vec::new(),
        );

        let value = orchestrator
            .fetch_json("https://smartstore.naver.com/i/v2/channels/c/products/1/benefits/by-product")
            .await
            .unwrap();
        assert_eq!(value["coupons"][0]["couponNo"], "COUP001");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_spacing_is_enforced() {
        let pool = Arc::new(ProxyPool::new(Vec::new()));
        let config = ScrapingSection {
            throttle_min_time_ms: 200,
            ..Default::default()
        };
        let orchestrator = FetchOrchestrator::new(
            Arc::new(MockFetcher::new(vec![
                Outcome::Page(200, "<html></html>"),
                Outcome::Page(200, "<html></html>"),
                Outcome::Page(200, "<html></html>"),
            ])),
            pool,
            Arc::new(ScriptedRandom::new(Vec::new())),
            &config,
        );

        let start = Instant::now();
        for _ in 0..3 {
            orchestrator
                .fetch("https://smartstore.naver.com/s/products/1")
                .await
                .unwrap();
        }
        // First dispatch is immediate, the next two wait 200ms each.
        assert!(start.elapsed() >= Duration::from_millis(400));
    }
}
