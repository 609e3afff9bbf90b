//! Web page scraper.
//!
//! Fetches one URL with a browser-like `User-Agent`, strips the markup and
//! returns the visible text as a [`Document`] of format `web`, titled with
//! the page `<title>` (or the URL when the page has none).

use std::time::Duration;

use ragbot_core::error::IngestionError;
use ragbot_core::models::{Document, DocumentFormat};
use reqwest::Url;
use tracing::{debug, info};

use crate::config::ScrapeConfig;
use crate::html;

pub struct Scraper {
    client: reqwest::Client,
}

impl Scraper {
    pub fn new(config: &ScrapeConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Fetch `url` and turn the page into a document.
    ///
    /// Network failures, non-2xx statuses and pages without visible text
    /// are reported as [`IngestionError`]s keyed by the normalized URL.
    pub async fn scrape(&self, url: &str) -> Result<Document, IngestionError> {
        let url = normalize_url(url)?;
        let source_id = url.to_string();
        let fail = |reason: String| IngestionError::new(&source_id, reason);

        debug!(url = %source_id, "fetching page");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fail(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| fail(format!("failed to read body: {}", e)))?;

        let document = page_to_document(&source_id, &body)?;
        info!(url = %source_id, chars = document.text.len(), "scraped page");
        Ok(document)
    }
}

/// Trim `raw` and prepend `https://` when it has no scheme. Only `http` and
/// `https` URLs are accepted.
pub fn normalize_url(raw: &str) -> Result<Url, IngestionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IngestionError::new(raw, "URL is empty"));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| IngestionError::new(trimmed, format!("invalid URL: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(IngestionError::new(
            trimmed,
            format!("unsupported URL scheme '{}'", other),
        )),
    }
}

/// Build the document for a fetched page.
pub fn page_to_document(source_id: &str, body: &str) -> Result<Document, IngestionError> {
    let text = html::strip_tags(body);
    if text.is_empty() {
        return Err(IngestionError::new(source_id, "page has no visible text"));
    }
    let title = html::extract_title(body).unwrap_or_else(|| source_id.to_string());
    Ok(Document::new(source_id, title, DocumentFormat::Web, text))
}
