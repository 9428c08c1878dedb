// HTTP page fetching for save_info

use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use std::time::Duration;
use url::Url;

const MAX_CONTENT_BYTES: usize = 100_000;

/// A fetched web page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub truncated: bool,
}

/// Fetches pages over HTTP(S), optionally restricted to an allow-list of domains
pub struct PageFetcher {
    client: reqwest::Client,
    allowed_domains: Vec<String>,
}

impl PageFetcher {
    pub fn new(timeout: Duration, allowed_domains: Vec<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("parley-mcp/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            allowed_domains,
        })
    }

    /// Empty allow-list admits every host
    fn is_domain_allowed(&self, url: &Url) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }

        let Some(host) = url.host_str() else {
            return false;
        };

        self.allowed_domains
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{}", allowed)))
    }

    pub async fn fetch(&self, raw_url: &str) -> Result<FetchedPage> {
        let url = Url::parse(raw_url).with_context(|| format!("Invalid URL: {}", raw_url))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            bail!("Only HTTP/HTTPS URLs are supported, got: {}", url.scheme());
        }

        if !self.is_domain_allowed(&url) {
            bail!(
                "Domain not allowed: {}. Allowed domains: {}",
                url.host_str().unwrap_or("unknown"),
                self.allowed_domains.join(", ")
            );
        }

        tracing::debug!("Fetching {}", url);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .with_context(|| format!("HTTP request failed: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Fetching {} returned HTTP {}", url, status);
        }

        let mut bytes = Vec::new();
        let mut over_limit = false;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to read response body")?;
            bytes.extend_from_slice(&chunk);
            if bytes.len() > MAX_CONTENT_BYTES {
                over_limit = true;
                break;
            }
        }

        if over_limit {
            tracing::debug!("Stopped reading {} after {} bytes", url, bytes.len());
        }

        let body = String::from_utf8_lossy(&bytes).into_owned();
        let title = extract_title(&body);
        let (content, truncated) = truncate_utf8(body, MAX_CONTENT_BYTES);

        Ok(FetchedPage {
            url: url.to_string(),
            title,
            content,
            truncated: truncated || over_limit,
        })
    }
}

/// Contents of the first `<title>` element, if any
fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title")?;

    let title = html[start..end].trim();
    (!title.is_empty()).then(|| title.to_string())
}

fn truncate_utf8(mut text: String, max_bytes: usize) -> (String, bool) {
    if text.len() <= max_bytes {
        return (text, false);
    }

    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str("\n\n... (truncated, content too large)");
    (text, true)
}
