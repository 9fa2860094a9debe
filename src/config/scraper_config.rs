use serde::{Deserialize, Serialize};
use std::env;

/// Top-level configuration for the scraper. Every field has a documented
/// default, so an empty TOML file (or no file at all) yields a working setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub scraping: ScrapingSection,
    pub naver: NaverSection,
    pub proxy: ProxySection,
}

/// Retry, throttling and cache behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingSection {
    pub max_retries: usize,
    pub timeout_ms: u64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_concurrent: usize,
    pub throttle_min_time_ms: u64,
    pub cache_ttl_seconds: u64,
}

impl Default for ScrapingSection {
    fn default() -> Self {
        ScrapingSection {
            max_retries: 3,
            timeout_ms: 30_000,
            min_delay_ms: 500,
            max_delay_ms: 2_000,
            max_concurrent: 5,
            throttle_min_time_ms: 200,
            cache_ttl_seconds: 600,
        }
    }
}

/// Endpoints for the supported store family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NaverSection {
    pub base_url: String,
    pub api_base_url: String,
    pub benefits_path: String,
}

impl Default for NaverSection {
    fn default() -> Self {
        NaverSection {
            base_url: "https://smartstore.naver.com".to_string(),
            api_base_url: "https://smartstore.naver.com/i/v2".to_string(),
            benefits_path: "/benefits/by-product".to_string(),
        }
    }
}

/// Outbound proxy credentials. An empty host or zero port means
/// "no proxy configured" and the pool runs empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySection {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ScraperConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: ScraperConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Environment variables win over file values for proxy credentials,
    /// matching how deployments inject secrets.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = env::var("PROXY_HOST") {
            self.proxy.host = host;
        }
        if let Ok(port) = env::var("PROXY_PORT") {
            if let Ok(port) = port.parse() {
                self.proxy.port = port;
            }
        }
        if let Ok(username) = env::var("PROXY_USERNAME") {
            self.proxy.username = username;
        }
        if let Ok(password) = env::var("PROXY_PASSWORD") {
            self.proxy.password = password;
        }
    }
}
