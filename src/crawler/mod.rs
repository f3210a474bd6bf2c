pub mod extractor;
pub mod robots;
pub mod sitemap;


use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use ureq::Agent;
use url::Url;

use self::extractor::extract_content;
use self::robots::{RobotsTxt, fetch_robots_txt};
use self::sitemap::{default_sitemap_url, discover_pages};
use crate::DocsError;

/// Path extensions that never hold documentation text
const ASSET_EXTENSIONS: [&str; 16] = [
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "pdf", "zip", "gz", "mp4", "mp3", "css",
    "js", "woff", "woff2",
];

/// One fetched documentation page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// The manifest entry the page was reached from
    pub source_id: String,
    pub url: String,
    pub title: String,
    /// Main content text of the page
    pub text: String,
}

/// Fetches every document belonging to one source
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch_source(&self, source_id: &str) -> crate::Result<Vec<SourceDocument>>;
}

/// Configuration for the web crawler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// User agent string to use for requests
    pub user_agent: String,
    /// Timeout for HTTP requests in seconds
    pub timeout_seconds: u64,
    /// Rate limit delay between requests in milliseconds
    pub rate_limit_ms: u64,
    /// Maximum number of retry attempts for retryable errors
    pub max_retries: u32,
    /// Delay between retry attempts in seconds
    pub retry_delay_seconds: u64,
    /// Pages fetched per source before the crawl stops
    pub max_pages_per_source: usize,
    pub respect_robots_txt: bool,
}

impl Default for CrawlerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            user_agent: "docs-assistant/0.1.0 (Documentation Assistant)".to_string(),
            timeout_seconds: 30,
            rate_limit_ms: 250,
            max_retries: 3,
            retry_delay_seconds: 2,
            max_pages_per_source: 200,
            respect_robots_txt: true,
        }
    }
}

/// Failure of a single HTTP GET
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP error {0}")]
    Status(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl HttpError {
    /// Network failures, 5xx and 429 are worth another attempt
    #[inline]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status(status) => *status >= 500 || *status == 429,
            Self::Transport(_) => true,
            Self::Body(_) => false,
        }
    }
}

/// HTTP client wrapper with rate limiting and retry logic
#[derive(Debug)]
pub struct HttpClient {
    agent: Agent,
    config: CrawlerConfig,
    last_request_time: Mutex<Option<Instant>>,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    #[inline]
    pub fn new(config: CrawlerConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .user_agent(&config.user_agent)
            .build()
            .into();

        Self {
            agent,
            config,
            last_request_time: Mutex::new(None),
        }
    }

    /// Perform an HTTP GET request with rate limiting and retry logic
    #[inline]
    pub async fn get(&self, url: &str) -> Result<String> {
        self.apply_rate_limit().await;

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!("Retrying request to {} (attempt {})", url, attempt + 1);
                sleep(Duration::from_secs(self.config.retry_delay_seconds)).await;
            }

            let agent = self.agent.clone();
            let target = url.to_string();
            let outcome = tokio::task::spawn_blocking(move || try_get(&agent, &target))
                .await
                .with_context(|| format!("HTTP request task for {} failed", url))?;

            match outcome {
                Ok(response) => {
                    debug!("Successfully fetched {} (attempt {})", url, attempt + 1);
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    warn!("Retryable error for {}: {}", url, e);
                    last_error = Some(e);
                }
                Err(e) => {
                    debug!("Giving up on {}: {}", url, e);
                    return Err(e).with_context(|| format!("Failed to fetch {}", url));
                }
            }
        }

        match last_error {
            Some(e) => Err(e).with_context(|| format!("Failed to fetch {}", url)),
            None => Err(anyhow!("All retry attempts failed for {}", url)),
        }
    }

    /// Apply rate limiting by sleeping if necessary
    async fn apply_rate_limit(&self) {
        let mut last_request_time = self.last_request_time.lock().await;

        if let Some(last_time) = *last_request_time {
            let elapsed = last_time.elapsed();
            let rate_limit_duration = Duration::from_millis(self.config.rate_limit_ms);

            if elapsed < rate_limit_duration {
                let sleep_duration = rate_limit_duration - elapsed;
                debug!("Rate limiting: sleeping for {:?}", sleep_duration);
                sleep(sleep_duration).await;
            }
        }

        *last_request_time = Some(Instant::now());
    }
}

impl Default for HttpClient {
    /// Create a new HTTP client with default configuration
    #[inline]
    fn default() -> Self {
        Self::new(CrawlerConfig::default())
    }
}

/// Attempt a single blocking HTTP GET request without retry logic
fn try_get(agent: &Agent, url: &str) -> Result<String, HttpError> {
    debug!("Making HTTP GET request to: {}", url);

    match agent.get(url).call() {
        Ok(mut response) => {
            let text = response
                .body_mut()
                .read_to_string()
                .map_err(|e| HttpError::Body(e.to_string()))?;
            debug!("Successfully read {} bytes from {}", text.len(), url);
            Ok(text)
        }
        Err(ureq::Error::StatusCode(status)) => {
            debug!("HTTP request failed with status {}: {}", status, url);
            Err(HttpError::Status(status))
        }
        Err(e) => {
            debug!("HTTP request failed with transport error: {}", e);
            Err(HttpError::Transport(e.to_string()))
        }
    }
}

/// Validate and normalize a URL
#[inline]
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL format: {}", url_str))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!("URL must use HTTP or HTTPS scheme: {}", url_str));
    }

    if url.host_str().is_none() {
        return Err(anyhow!("URL must have a valid host: {}", url_str));
    }

    Ok(url)
}

/// Check if a URL should be crawled based on base URL filtering rules
#[inline]
pub fn should_crawl_url(url: &Url, base_url: &Url) -> bool {
    // Must be same scheme and host
    if url.scheme() != base_url.scheme()
        || url.host() != base_url.host()
        || url.port_or_known_default() != base_url.port_or_known_default()
    {
        return false;
    }

    if is_asset(url) {
        return false;
    }

    // Must start with the base URL path (excluding trailing filename)
    let base_path = normalize_path_for_filtering(base_url.path());
    let url_path = url.path();

    url_path.starts_with(base_path.as_ref())
}

fn is_asset(url: &Url) -> bool {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .is_some_and(|(_, extension)| {
            ASSET_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
        })
}

/// Normalize a URL path for filtering by removing trailing filename if present
fn normalize_path_for_filtering(path: &str) -> Cow<'_, str> {
    if path.ends_with('/') {
        return Cow::Borrowed(path);
    }

    match path.rsplit_once('/') {
        // A last segment with a dot looks like a file; filter on its directory
        Some((directory, last_segment)) if last_segment.contains('.') => {
            Cow::Owned(format!("{}/", directory))
        }
        _ => Cow::Owned(format!("{}/", path)),
    }
}

/// Extract all links from HTML content using proper HTML parsing
#[inline]
pub fn extract_links(html: &str, source_url: &Url, base_url: &Url) -> Result<Vec<Url>> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a[href]")
        .map_err(|e| anyhow!("Failed to create CSS selector: {:?}", e))?;

    let mut links = Vec::new();

    for element in document.select(&link_selector) {
        if let Some(href) = element.value().attr("href") {
            // Skip non-HTTP(S) links
            if href.starts_with("mailto:")
                || href.starts_with("javascript:")
                || href.starts_with("tel:")
                || href.starts_with('#')
            {
                continue;
            }

            match source_url.join(href) {
                Ok(mut absolute_url) => {
                    absolute_url.set_fragment(None);
                    if should_crawl_url(&absolute_url, base_url) {
                        links.push(absolute_url);
                    }
                }
                Err(e) => {
                    debug!(
                        "Failed to resolve URL '{}' relative to '{}': {}",
                        href, source_url, e
                    );
                }
            }
        }
    }

    // Remove duplicates
    links.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    links.dedup();

    debug!("Extracted {} valid links from {}", links.len(), source_url);
    Ok(links)
}

/// Statistics about one source crawl
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlStats {
    /// URLs discovered from links and sitemaps
    pub total_urls: usize,
    pub successful_crawls: usize,
    pub failed_crawls: usize,
    pub robots_blocked: usize,
    /// Pages fetched but holding no text
    pub empty_pages: usize,
    pub duration: Duration,
}

impl CrawlStats {
    #[inline]
    pub fn total_crawled(&self) -> usize {
        self.successful_crawls + self.failed_crawls + self.robots_blocked + self.empty_pages
    }
}

/// Crawls documentation sites over HTTP, following sitemaps and in-site links
#[derive(Debug)]
pub struct SiteCrawler {
    http_client: HttpClient,
    config: CrawlerConfig,
}

impl SiteCrawler {
    #[inline]
    pub fn new(config: CrawlerConfig) -> Self {
        Self {
            http_client: HttpClient::new(config.clone()),
            config,
        }
    }

    /// Crawl one source breadth-first and return its documents with statistics
    #[inline]
    pub async fn crawl(&self, source_id: &str) -> Result<(Vec<SourceDocument>, CrawlStats)> {
        let start_time = Instant::now();
        let source_url = validate_url(source_id)?;

        info!("Starting crawl of {}", source_url);

        let robots_txt = if self.config.respect_robots_txt {
            match fetch_robots_txt(&self.http_client, &source_url).await {
                Ok(robots) => {
                    debug!("Successfully loaded robots.txt for {}", source_url);
                    robots
                }
                Err(e) => {
                    warn!("Failed to fetch robots.txt for {}: {}", source_url, e);
                    RobotsTxt::parse("") // Allow all if robots.txt is unavailable
                }
            }
        } else {
            RobotsTxt::parse("")
        };

        let mut sitemap_candidates: Vec<Url> = robots_txt
            .sitemaps()
            .iter()
            .filter_map(|s| Url::parse(s).ok())
            .collect();
        sitemap_candidates.push(default_sitemap_url(&source_url)?);
        let sitemap_pages = discover_pages(&self.http_client, sitemap_candidates, &source_url).await;

        let mut entry_url = source_url.clone();
        entry_url.set_fragment(None);

        let mut queue = VecDeque::new();
        let mut discovered_urls = HashSet::new();
        for url in std::iter::once(entry_url.clone()).chain(sitemap_pages) {
            if discovered_urls.insert(url.as_str().to_string()) {
                queue.push_back(url);
            }
        }

        let mut stats = CrawlStats {
            total_urls: queue.len(),
            ..CrawlStats::default()
        };
        let mut documents = Vec::new();

        let bar = if console::user_attended_stderr() {
            ProgressBar::new_spinner().with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Crawling {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };
        bar.set_length(stats.total_urls as u64);

        // Main crawling loop - breadth-first approach
        while let Some(url) = queue.pop_front() {
            if stats.total_crawled() >= self.config.max_pages_per_source {
                info!(
                    "Reached page limit of {} for {}, {} URLs left unvisited",
                    self.config.max_pages_per_source,
                    source_url,
                    queue.len() + 1
                );
                break;
            }

            let is_entry = url == entry_url;

            if !robots_txt.is_allowed(&url, &self.config.user_agent) {
                info!("URL blocked by robots.txt: {}", url);
                stats.robots_blocked += 1;
                bar.set_position(stats.total_crawled() as u64);
                continue;
            }

            bar.set_message(url.to_string());
            let html = match self.http_client.get(url.as_str()).await {
                Ok(html) => html,
                Err(e) if is_entry => {
                    bar.finish_and_clear();
                    return Err(e).with_context(|| format!("Entry page {} failed", url));
                }
                Err(e) => {
                    error!("Failed to crawl {}: {:#}", url, e);
                    stats.failed_crawls += 1;
                    bar.set_position(stats.total_crawled() as u64);
                    continue;
                }
            };

            match extract_content(&html) {
                Ok(page) if !page.text.is_empty() => {
                    debug!("Extracted {} chars from {}", page.text.len(), url);
                    documents.push(SourceDocument {
                        source_id: source_id.to_string(),
                        url: url.to_string(),
                        title: page.title,
                        text: page.text,
                    });
                    stats.successful_crawls += 1;
                }
                Ok(_) => {
                    debug!("No text on {}", url);
                    stats.empty_pages += 1;
                }
                Err(e) => {
                    warn!("Content extraction failed for {}: {}", url, e);
                    stats.failed_crawls += 1;
                }
            }
            bar.set_position(stats.total_crawled() as u64);

            match extract_links(&html, &url, &source_url) {
                Ok(links) => {
                    for link in links {
                        if discovered_urls.insert(link.as_str().to_string()) {
                            queue.push_back(link);
                            stats.total_urls += 1;
                            bar.set_length(stats.total_urls as u64);
                        }
                    }
                }
                Err(e) => warn!("Failed to extract links from {}: {}", url, e),
            }
        }

        stats.duration = start_time.elapsed();
        bar.finish_and_clear();

        info!(
            "Crawl completed for {}: {} successful, {} failed, {} empty, {} blocked by robots.txt, took {:?}",
            source_url,
            stats.successful_crawls,
            stats.failed_crawls,
            stats.empty_pages,
            stats.robots_blocked,
            stats.duration
        );

        if documents.is_empty() {
            bail!("No page of {} yielded any text", source_url);
        }

        Ok((documents, stats))
    }
}

#[async_trait]
impl SourceFetcher for SiteCrawler {
    #[inline]
    async fn fetch_source(&self, source_id: &str) -> crate::Result<Vec<SourceDocument>> {
        match self.crawl(source_id).await {
            Ok((documents, _)) => {
                info!("Fetched {} documents from {}", documents.len(), source_id);
                Ok(documents)
            }
            Err(e) => Err(DocsError::SourceFetch {
                source_id: source_id.to_string(),
                message: format!("{:#}", e),
            }),
        }
    }
}
