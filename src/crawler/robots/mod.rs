
use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

use super::{HttpClient, HttpError};

/// Represents a robots.txt file and its rules
#[derive(Debug, Clone)]
pub struct RobotsTxt {
    /// Rules for different user agents
    rules: HashMap<String, UserAgentRules>,
    /// Default rules for all user agents (*)
    default_rules: UserAgentRules,
    /// Sitemap locations announced by the site
    sitemaps: Vec<String>,
}

/// Rules for a specific user agent
#[derive(Debug, Clone, Default)]
struct UserAgentRules {
    /// List of disallowed path patterns
    disallowed: Vec<String>,
    /// List of allowed path patterns (takes precedence over disallowed)
    allowed: Vec<String>,
}

impl RobotsTxt {
    /// Parse robots.txt content
    #[inline]
    pub fn parse(content: &str) -> Self {
        let mut rules: HashMap<String, UserAgentRules> = HashMap::new();
        let mut default_rules = UserAgentRules::default();
        let mut current_user_agents = Vec::new();
        let mut sitemaps = Vec::new();
        let mut in_agent_group = false;

        for line in content.lines() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Parse directive
            if let Some((directive, value)) = parse_directive(line) {
                match directive.to_lowercase().as_str() {
                    "user-agent" => {
                        // Consecutive User-agent lines share one group
                        if !in_agent_group {
                            current_user_agents.clear();
                        }
                        current_user_agents.push(value.to_lowercase());
                        in_agent_group = true;
                    }
                    "disallow" => {
                        in_agent_group = false;
                        if value.is_empty() {
                            // An empty Disallow allows everything
                            continue;
                        }
                        if current_user_agents.is_empty() {
                            warn!("Disallow directive without User-agent: {}", line);
                            continue;
                        }

                        for user_agent in &current_user_agents {
                            if user_agent == "*" {
                                default_rules.disallowed.push(value.to_string());
                            } else {
                                rules
                                    .entry(user_agent.clone())
                                    .or_default()
                                    .disallowed
                                    .push(value.to_string());
                            }
                        }
                    }
                    "allow" => {
                        in_agent_group = false;
                        if current_user_agents.is_empty() {
                            warn!("Allow directive without User-agent: {}", line);
                            continue;
                        }

                        for user_agent in &current_user_agents {
                            if user_agent == "*" {
                                default_rules.allowed.push(value.to_string());
                            } else {
                                rules
                                    .entry(user_agent.clone())
                                    .or_default()
                                    .allowed
                                    .push(value.to_string());
                            }
                        }
                    }
                    "sitemap" => {
                        if !value.is_empty() {
                            sitemaps.push(value.to_string());
                        }
                    }
                    "crawl-delay" => {
                        in_agent_group = false;
                        debug!("Ignoring robots.txt directive: {}: {}", directive, value);
                    }
                    _ => {
                        debug!("Unknown robots.txt directive: {}: {}", directive, value);
                    }
                }
            }
        }

        Self {
            rules,
            default_rules,
            sitemaps,
        }
    }

    /// Sitemap URLs listed with `Sitemap:` directives, in file order
    #[inline]
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Check if a URL is allowed to be crawled by the given user agent
    #[inline]
    pub fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        let path = url.path();
        // Groups are keyed by product token: "docs-assistant/0.1.0 (...)" -> "docs-assistant"
        let product = user_agent
            .split(['/', ' '])
            .next()
            .unwrap_or_default()
            .to_lowercase();

        // First check specific user agent rules
        if let Some(agent_rules) = self.rules.get(&product) {
            // Check if explicitly allowed (takes precedence)
            for allow_pattern in &agent_rules.allowed {
                if path_matches_pattern(path, allow_pattern) {
                    debug!("URL {} allowed by specific pattern: {}", url, allow_pattern);
                    return true;
                }
            }

            // Check if explicitly disallowed
            for disallow_pattern in &agent_rules.disallowed {
                if path_matches_pattern(path, disallow_pattern) {
                    debug!(
                        "URL {} disallowed by specific pattern: {}",
                        url, disallow_pattern
                    );
                    return false;
                }
            }
        }

        // If no specific rules matched, check default rules
        // Check if explicitly allowed by default rules
        for allow_pattern in &self.default_rules.allowed {
            if path_matches_pattern(path, allow_pattern) {
                debug!("URL {} allowed by default pattern: {}", url, allow_pattern);
                return true;
            }
        }

        // Check if explicitly disallowed by default rules
        for disallow_pattern in &self.default_rules.disallowed {
            if path_matches_pattern(path, disallow_pattern) {
                debug!(
                    "URL {} disallowed by default pattern: {}",
                    url, disallow_pattern
                );
                return false;
            }
        }

        // Default is to allow
        true
    }

    /// Get the robots.txt URL for a given base URL
    #[inline]
    pub fn robots_url(base_url: &Url) -> Url {
        let mut robots_url = base_url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);
        robots_url
    }
}

/// Parse a robots.txt directive line
fn parse_directive(line: &str) -> Option<(&str, &str)> {
    let (directive, value) = line.split_once(':')?;
    let value = value.split_once('#').map_or(value, |(before, _)| before);
    Some((directive.trim(), value.trim()))
}

/// Check if a path matches a robots.txt pattern
///
/// Patterns are prefixes; `*` matches any run of characters and a trailing `$`
/// anchors the pattern to the end of the path.
fn path_matches_pattern(path: &str, pattern: &str) -> bool {
    // Empty pattern means root
    if pattern.is_empty() || pattern == "/" {
        return true;
    }

    let (pattern, anchored) = pattern
        .strip_suffix('$')
        .map_or((pattern, false), |p| (p, true));

    let segments: Vec<&str> = pattern.split('*').collect();
    let Some((first, tail)) = segments.split_first() else {
        return true;
    };
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };

    let Some((last, middle)) = tail.split_last() else {
        return !anchored || rest.is_empty();
    };

    for segment in middle.iter().filter(|s| !s.is_empty()) {
        match rest.find(segment) {
            Some(pos) => rest = rest.get(pos + segment.len()..).unwrap_or_default(),
            None => return false,
        }
    }

    if anchored {
        rest.ends_with(last)
    } else {
        rest.contains(last)
    }
}

/// Fetch and parse robots.txt for a given URL
#[inline]
pub async fn fetch_robots_txt(http_client: &HttpClient, base_url: &Url) -> Result<RobotsTxt> {
    let robots_url = RobotsTxt::robots_url(base_url);

    debug!("Fetching robots.txt from: {}", robots_url);

    match http_client.get(robots_url.as_str()).await {
        Ok(content) => {
            debug!("Successfully fetched robots.txt ({} bytes)", content.len());
            Ok(RobotsTxt::parse(&content))
        }
        Err(e) if is_not_found(&e) => {
            debug!("No robots.txt found (404), allowing all URLs");
            Ok(RobotsTxt::parse(""))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to fetch robots.txt from {}", robots_url)),
    }
}

fn is_not_found(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<HttpError>(),
        Some(HttpError::Status(404 | 410))
    )
}
