// src/discovery/pipeline.rs - the ordered fallback chain for one record
use crate::config::DiscoveryConfig;
use crate::discovery::browser::{HeavyFetcher, SessionFactory};
use crate::discovery::extract::{html_to_text, EmailExtractor, SocialLinkExtractor};
use crate::discovery::fetch::{FetchResult, PageFetcher};
use crate::models::DiscoveryError;
use tracing::{debug, warn};
use url::Url;

/// Per-record discovery: landing page first, then a fixed subpage list, then
/// the landing page's social profile links rendered in a heavy session.
/// Terminates on the first non-empty candidate set; fetch failures just move
/// the chain along. Holds no per-record state, so one instance serves a
/// whole worker.
pub struct DiscoveryPipeline {
    emails: EmailExtractor,
    social: SocialLinkExtractor,
    subpages: Vec<String>,
}

impl DiscoveryPipeline {
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self {
            emails: EmailExtractor::new(),
            social: SocialLinkExtractor::new(config.social_platforms.clone()),
            subpages: config.subpages.clone(),
        }
    }

    /// `Ok(None)` means no email was found, which is a normal outcome. The
    /// only error is a render session that could not be brought up.
    pub async fn discover<F: SessionFactory>(
        &self,
        fetcher: &dyn PageFetcher,
        renderer: &mut HeavyFetcher<F>,
        website: Option<&str>,
    ) -> Result<Option<String>, DiscoveryError> {
        let Some(url) = website else {
            return Ok(None);
        };

        // Step 1: the landing page itself. Its content is kept around for
        // the social fallback even when no email is on it.
        let mut primary_html = None;
        match fetcher.fetch(url).await {
            FetchResult::Content(html) => {
                if let Some(email) = self.first_email(&html_to_text(&html)) {
                    debug!("Email on landing page of {}", url);
                    return Ok(Some(email));
                }
                primary_html = Some(html);
            }
            FetchResult::Failed(reason) => {
                warn!("Landing page fetch failed for {}: {}", url, reason);
            }
        }

        // Step 2: likely subpages, in priority order.
        if let Ok(base) = Url::parse(url) {
            for subpage in &self.subpages {
                let Ok(sub_url) = base.join(subpage) else {
                    continue;
                };
                if let FetchResult::Content(html) = fetcher.fetch(sub_url.as_str()).await {
                    if let Some(email) = self.first_email(&html_to_text(&html)) {
                        debug!("Email on subpage {} of {}", subpage, url);
                        return Ok(Some(email));
                    }
                }
            }
        }

        // Step 3: social profiles linked from the landing page. Subpage
        // content is deliberately not scanned for social links.
        let Some(html) = primary_html else {
            return Ok(None);
        };
        for link in self.social.extract(&html, url) {
            match renderer.render(&link).await? {
                FetchResult::Content(source) => {
                    // The raw rendered source is scanned, not its text:
                    // profile pages often keep the email in attributes.
                    if let Some(email) = self.first_email(&source) {
                        debug!("Email on social profile {} for {}", link, url);
                        return Ok(Some(email));
                    }
                }
                FetchResult::Failed(reason) => {
                    warn!("Render failed for {}: {}", link, reason);
                }
            }
        }

        Ok(None)
    }

    /// Stable selection: lexicographically smallest of the candidate set.
    fn first_email(&self, text: &str) -> Option<String> {
        self.emails.extract(text).into_iter().next()
    }
}
