#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! HTTP retrieval of the remote lookup page.

mod html;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use lookup_core::Fetcher;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use url::Url;

pub use html::html_to_text;

/// Placeholder replaced by the URL-encoded query.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// HTTP fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout (seconds)
    #[serde(default = "FetchConfig::default_timeout")]
    pub timeout: u64,

    /// User-Agent header
    #[serde(default = "FetchConfig::default_user_agent")]
    pub user_agent: String,

    /// Maximum response size (bytes)
    #[serde(default = "FetchConfig::default_max_size")]
    pub max_size: usize,
}

impl FetchConfig {
    const fn default_timeout() -> u64 {
        30
    }

    fn default_user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (compatible; lookupbot/1.0)"
            .to_string()
    }

    const fn default_max_size() -> usize {
        1_000_000 // 1MB
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Self::default_timeout(),
            user_agent: Self::default_user_agent(),
            max_size: Self::default_max_size(),
        }
    }
}

/// Fetches `url_template` with the query substituted in.
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
    url_template: String,
}

impl HttpFetcher {
    pub fn new(url_template: impl Into<String>, config: FetchConfig) -> Result<Self> {
        let url_template = url_template.into();
        if !url_template.contains(QUERY_PLACEHOLDER) {
            bail!("URL template must contain {QUERY_PLACEHOLDER}: {url_template}");
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to create HTTP client")?;

        let fetcher = Self {
            client,
            config,
            url_template,
        };
        fetcher.build_url("0")?;
        Ok(fetcher)
    }

    /// Substitute the URL-encoded query into the template.
    pub fn build_url(&self, query: &str) -> Result<Url> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let raw = self.url_template.replace(QUERY_PLACEHOLDER, &encoded);
        let url = Url::parse(&raw).with_context(|| format!("Invalid lookup URL: {raw}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("Only http and https URLs are supported: {raw}");
        }
        Ok(url)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, query: &str) -> Result<String> {
        let url = self.build_url(query)?;
        info!("Fetching lookup page for {query:?}");

        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.config.user_agent)
            .header("Accept", "text/html, application/json, text/plain")
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Lookup page returned HTTP {status}");
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .context("Failed to read response")?;

        if bytes.len() > self.config.max_size {
            bail!(
                "Response too large: {} bytes (max: {})",
                bytes.len(),
                self.config.max_size
            );
        }

        Ok(if content_type.contains("html") {
            html_to_text(&String::from_utf8_lossy(&bytes))
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, 30);
        assert_eq!(config.max_size, 1_000_000);
        assert!(config.user_agent.contains("lookupbot"));
    }

    #[test]
    fn test_template_requires_placeholder() {
        let result = HttpFetcher::new("https://example.com/lookup", FetchConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_template_requires_http_scheme() {
        let result = HttpFetcher::new("ftp://example.com/{query}", FetchConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_query_is_url_encoded() {
        let Ok(fetcher) = HttpFetcher::new(
            "https://example.com/lookup?number={query}",
            FetchConfig::default(),
        ) else {
            panic!("Failed to create HttpFetcher");
        };
        let Ok(url) = fetcher.build_url("+91 98&x") else {
            panic!("Failed to build URL");
        };
        assert_eq!(url.as_str(), "https://example.com/lookup?number=%2B91+98%26x");
    }
}
