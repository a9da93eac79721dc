// src/discovery/extract.rs - pure extraction, no network
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;
use url::Url;

/// Finds email-shaped substrings in text. Returns the full distinct set;
/// picking one candidate out of it is the caller's job.
pub struct EmailExtractor {
    pattern: Regex,
}

impl EmailExtractor {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"[A-Za-z0-9_.+-]+@[A-Za-z0-9-]+\.[A-Za-z0-9.-]+").unwrap(),
        }
    }

    /// A `BTreeSet` so iteration order is stable across runs.
    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl Default for EmailExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds anchors pointing at recognized social platforms and returns them as
/// absolute URLs in document order, deduplicated. Malformed HTML degrades to
/// an empty list.
pub struct SocialLinkExtractor {
    platforms: Vec<String>,
}

impl SocialLinkExtractor {
    pub fn new(platforms: Vec<String>) -> Self {
        Self { platforms }
    }

    pub fn extract(&self, html: &str, base_url: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let link_selector = Selector::parse("a[href]").unwrap();

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for element in document.select(&link_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if !self.platforms.iter().any(|p| href.contains(p.as_str())) {
                continue;
            }
            if let Some(absolute) = resolve_url(href, base_url) {
                if seen.insert(absolute.clone()) {
                    links.push(absolute);
                }
            }
        }

        debug!("Extracted {} social links from {}", links.len(), base_url);
        links
    }
}

/// Absolute hrefs pass through; relative ones are resolved against the base.
pub fn resolve_url(href: &str, base_url: &str) -> Option<String> {
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Url::parse(base_url)
            .ok()?
            .join(href)
            .ok()
            .map(|u| u.to_string()),
    }
}

/// Flattens an HTML document to its visible text for email scanning.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
}
