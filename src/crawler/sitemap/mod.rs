
use anyhow::{Result, anyhow};
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

use super::{HttpClient, should_crawl_url};

/// Nested sitemap indexes are followed at most this deep
const MAX_SITEMAP_DEPTH: usize = 2;

/// Locations listed in one sitemap document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sitemap {
    /// Page URLs from `<url><loc>` entries
    pub pages: Vec<String>,
    /// Child sitemaps from a `<sitemapindex>`
    pub sitemaps: Vec<String>,
}

/// Parse a sitemap or sitemap index document
#[inline]
pub fn parse_sitemap(xml: &str) -> Result<Sitemap> {
    let document = Html::parse_document(xml);
    let page_selector = Selector::parse("url > loc")
        .map_err(|e| anyhow!("Failed to create CSS selector: {:?}", e))?;
    let index_selector = Selector::parse("sitemap > loc")
        .map_err(|e| anyhow!("Failed to create CSS selector: {:?}", e))?;

    let collect = |selector: &Selector| -> Vec<String> {
        document
            .select(selector)
            .map(|loc| loc.text().collect::<String>().trim().to_string())
            .filter(|loc| !loc.is_empty())
            .collect()
    };

    Ok(Sitemap {
        pages: collect(&page_selector),
        sitemaps: collect(&index_selector),
    })
}

/// Default sitemap location for a documentation source
///
/// Hosted documentation sites publish `sitemap.xml` next to the documentation root.
#[inline]
pub fn default_sitemap_url(source_url: &Url) -> Result<Url> {
    let mut base = source_url.clone();
    base.set_query(None);
    base.set_fragment(None);
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("sitemap.xml")
        .map_err(|e| anyhow!("Failed to build sitemap URL for {}: {}", source_url, e))
}

/// Collect every page under `source_url` that the given sitemaps list
///
/// Sitemaps that fail to load are skipped; discovery never fails the crawl.
#[inline]
pub async fn discover_pages(
    http_client: &HttpClient,
    candidates: Vec<Url>,
    source_url: &Url,
) -> Vec<Url> {
    let mut pending: Vec<(Url, usize)> = candidates.into_iter().map(|url| (url, 0)).collect();
    let mut visited = HashSet::new();
    let mut pages = Vec::new();
    let mut seen_pages = HashSet::new();

    while let Some((sitemap_url, depth)) = pending.pop() {
        if !visited.insert(sitemap_url.as_str().to_string()) {
            continue;
        }

        let body = match http_client.get(sitemap_url.as_str()).await {
            Ok(body) => body,
            Err(e) => {
                debug!("No sitemap at {}: {}", sitemap_url, e);
                continue;
            }
        };

        let sitemap = match parse_sitemap(&body) {
            Ok(sitemap) => sitemap,
            Err(e) => {
                warn!("Failed to parse sitemap {}: {}", sitemap_url, e);
                continue;
            }
        };

        for loc in sitemap.pages {
            match Url::parse(&loc) {
                Ok(mut page) => {
                    page.set_fragment(None);
                    if should_crawl_url(&page, source_url)
                        && seen_pages.insert(page.as_str().to_string())
                    {
                        pages.push(page);
                    }
                }
                Err(e) => debug!("Skipping invalid sitemap entry '{}': {}", loc, e),
            }
        }

        if depth < MAX_SITEMAP_DEPTH {
            for child in sitemap.sitemaps {
                match Url::parse(&child) {
                    Ok(child) => pending.push((child, depth + 1)),
                    Err(e) => debug!("Skipping invalid child sitemap '{}': {}", child, e),
                }
            }
        }
    }

    info!(
        "Discovered {} pages for {} from sitemaps",
        pages.len(),
        source_url
    );
    pages
}
