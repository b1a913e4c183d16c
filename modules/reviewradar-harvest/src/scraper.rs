use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{info, warn};

// --- PageScraper trait ---

#[async_trait]
pub trait PageScraper: Send + Sync {
    async fn scrape(&self, url: &str) -> Result<String>;
    /// Return raw HTML without Readability extraction. Used where links need
    /// to be pulled from the page structure.
    async fn scrape_raw(&self, url: &str) -> Result<String> {
        self.scrape(url).await
    }
    fn name(&self) -> &str;
}

// --- Static HTTP + Readability scraper ---

/// Scraper for server-rendered pages: plain GET, then spider_transformations
/// Readability extraction for clean main content. Pages that need a script
/// engine go through the browser session instead.
pub struct HttpScraper {
    client: reqwest::Client,
}

impl HttpScraper {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 reviewradar/0.1")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).context("Invalid URL")?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("Only http/https URLs are allowed, got: {}", parsed.scheme());
        }

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        if !resp.status().is_success() {
            anyhow::bail!("GET {url} returned {}", resp.status());
        }

        resp.text().await.context("Failed to read response body")
    }
}

#[async_trait]
impl PageScraper for HttpScraper {
    async fn scrape(&self, url: &str) -> Result<String> {
        info!(url, scraper = "http", "Scraping URL");

        let html = self.fetch_html(url).await?;
        if html.is_empty() {
            warn!(url, scraper = "http", "Empty HTML response");
            return Ok(String::new());
        }

        let text = readability_extract(&html, url);
        if text.trim().is_empty() {
            warn!(
                url,
                scraper = "http",
                "Empty content after Readability extraction"
            );
            return Ok(String::new());
        }

        info!(
            url,
            scraper = "http",
            bytes = text.len(),
            "Scraped successfully"
        );
        Ok(text)
    }

    async fn scrape_raw(&self, url: &str) -> Result<String> {
        info!(url, scraper = "http", "Scraping raw HTML");
        let html = self.fetch_html(url).await?;
        info!(
            url,
            scraper = "http",
            bytes = html.len(),
            "Raw HTML scraped"
        );
        Ok(html)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Readability main-content extraction to markdown. Shared by the static
/// scraper and the browser-rendered path.
pub fn readability_extract(html: &str, url: &str) -> String {
    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };

    transform_content_input(input, &config)
}

// --- Browser-rendered scraper ---

/// Scraper for pages that refuse to render without a script engine. Spins
/// up a headless-Chrome session per page, takes the rendered DOM, then runs
/// the same Readability extraction as the static path. Heavy; callers cap
/// how often it runs.
pub struct BrowserScraper {
    chrome_bin: Option<String>,
}

impl BrowserScraper {
    pub fn new(chrome_bin: Option<String>) -> Self {
        Self { chrome_bin }
    }

    async fn rendered_html(&self, url: &str) -> Result<String> {
        let session = browser_client::ChromeSession::launch(self.chrome_bin.as_deref())
            .await
            .context("Chrome launch failed")?;
        let result = async {
            session.navigate(url).await?;
            session.content().await
        }
        .await;
        if let Err(e) = session.close().await {
            warn!(url, error = %e, "Chrome session close failed");
        }
        Ok(result?)
    }
}

#[async_trait]
impl PageScraper for BrowserScraper {
    async fn scrape(&self, url: &str) -> Result<String> {
        info!(url, scraper = "browser", "Rendering URL");

        let html = self.rendered_html(url).await?;
        let text = readability_extract(&html, url);
        if text.trim().is_empty() {
            warn!(
                url,
                scraper = "browser",
                "Empty content after Readability extraction"
            );
            return Ok(String::new());
        }

        info!(
            url,
            scraper = "browser",
            bytes = text.len(),
            "Rendered successfully"
        );
        Ok(text)
    }

    async fn scrape_raw(&self, url: &str) -> Result<String> {
        info!(url, scraper = "browser", "Rendering raw HTML");
        self.rendered_html(url).await
    }

    fn name(&self) -> &str {
        "browser"
    }
}

/// Extract links from raw HTML whose resolved URL contains any of `patterns`.
/// Resolves relative URLs against `base_url`, deduplicates, and caps at `max`.
pub fn extract_links_by_patterns(
    html: &str,
    base_url: &str,
    patterns: &[&str],
    max: usize,
) -> Vec<String> {
    let href_re = regex::Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).expect("valid regex");
    let base = url::Url::parse(base_url).ok();

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();

    for cap in href_re.captures_iter(html) {
        let raw = &cap[1];

        let resolved = if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else if let Some(ref b) = base {
            match b.join(raw) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            }
        } else {
            continue;
        };

        if patterns.iter().any(|p| resolved.contains(p)) && seen.insert(resolved.clone()) {
            links.push(resolved);
            if links.len() >= max {
                break;
            }
        }
    }

    links
}

// --- WebSearcher trait ---

#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

// --- Serper (Google Search) ---

pub struct SerperSearcher {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearcher {
    pub fn new(api_key: &str) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("Failed to build HTTP client")?,
        })
    }
}

#[async_trait]
impl WebSearcher for SerperSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        info!(query, max_results, "Serper search");

        let body = serde_json::json!({
            "q": query,
            "num": max_results,
        });

        let resp = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Serper API request failed")?;

        let data: SerperResponse = resp
            .json()
            .await
            .context("Failed to parse Serper response")?;

        let results: Vec<SearchResult> = data
            .organic
            .into_iter()
            .map(|r| SearchResult {
                url: r.link,
                title: r.title,
                snippet: r.snippet,
            })
            .collect();

        info!(query, count = results.len(), "Serper search complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_extraction_matches_patterns_and_dedupes() {
        let html = r#"
            <a href="/thread/sony-xm5-impressions">one</a>
            <a href="/thread/sony-xm5-impressions">dupe</a>
            <a href="https://forum.example.com/topic/42-battery">two</a>
            <a href="/news/unrelated">news</a>
        "#;
        let links = extract_links_by_patterns(
            html,
            "https://forum.example.com",
            &["/thread/", "/topic/"],
            20,
        );
        assert_eq!(
            links,
            vec![
                "https://forum.example.com/thread/sony-xm5-impressions".to_string(),
                "https://forum.example.com/topic/42-battery".to_string(),
            ]
        );
    }

    #[test]
    fn link_extraction_respects_cap() {
        let html: String = (0..10)
            .map(|i| format!(r#"<a href="/thread/t{i}">t</a>"#))
            .collect();
        let links = extract_links_by_patterns(&html, "https://f.example.com", &["/thread/"], 3);
        assert_eq!(links.len(), 3);
    }

    #[test]
    fn relative_links_without_base_are_skipped() {
        let html = r#"<a href="/thread/x">x</a>"#;
        let links = extract_links_by_patterns(html, "not a url", &["/thread/"], 20);
        assert!(links.is_empty());
    }
}
