use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::future::Future;
use std::time::Duration;

use crate::log_sink::SharedLog;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";
const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

static TITLE_TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"<title>([^<]+)</title>").ok());

/// Given a URL, asynchronously produce the page title if there is one.
///
/// Implementations report failures through their own logging and answer
/// `None`; they never fail the caller.
pub trait TitleFetcher: Send + Sync {
    fn fetch_title(&self, url: &str) -> impl Future<Output = Option<String>> + Send;
}

/// Pulls the first `<title>` out of an HTML document, entity-decoded and trimmed.
pub fn extract_title(markup: &str) -> Option<String> {
    let regex = TITLE_TAG.as_ref()?;
    let raw = regex.captures(markup)?.get(1)?.as_str();
    let title = html_escape::decode_html_entities(raw).trim().to_string();
    if title.is_empty() { None } else { Some(title) }
}

pub struct HttpTitleFetcher {
    client: reqwest::Client,
    log: SharedLog,
}

impl HttpTitleFetcher {
    pub fn new(log: SharedLog) -> Result<Self> {
        Self::with_timeout(log, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(log: SharedLog, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(HTML_ACCEPT));

        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self { client, log })
    }

    async fn request_title(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(anyhow!("server answered {}", response.status()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("failed to read body: {}", e))?;

        Ok(extract_title(&body))
    }
}

impl TitleFetcher for HttpTitleFetcher {
    async fn fetch_title(&self, url: &str) -> Option<String> {
        match self.request_title(url).await {
            Ok(Some(title)) => Some(title),
            Ok(None) => {
                self.log.warning(&format!("No title found at {url}"));
                None
            }
            Err(e) => {
                self.log.warning(&format!("Request to {url} failed: {e}"));
                None
            }
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub struct MockTitleFetcher {
    titles: std::collections::HashMap<String, String>,
    stalled: std::collections::HashSet<String>,
    pub requested: std::sync::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for MockTitleFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl MockTitleFetcher {
    pub fn new() -> Self {
        Self {
            titles: std::collections::HashMap::new(),
            stalled: std::collections::HashSet::new(),
            requested: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_title(mut self, url: &str, title: &str) -> Self {
        self.titles.insert(url.to_string(), title.to_string());
        self
    }

    /// Requests for `url` never finish on their own.
    pub fn with_stall(mut self, url: &str) -> Self {
        self.stalled.insert(url.to_string());
        self
    }

    pub fn get_requested_urls(&self) -> Vec<String> {
        let mut urls = self
            .requested
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default();
        urls.sort();
        urls
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl TitleFetcher for MockTitleFetcher {
    async fn fetch_title(&self, url: &str) -> Option<String> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(url.to_string());
        }
        if self.stalled.contains(url) {
            std::future::pending::<()>().await;
        }
        self.titles.get(url).cloned()
    }
}
