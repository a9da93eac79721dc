// src/discovery/fetch.rs - plain HTTP GET, no client-side rendering
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Outcome of fetching one page. Never partially populated: either the
/// body arrived on an OK status, or a typed reason why it did not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Content(String),
    Failed(FetchFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("request timed out")]
    Timeout,
    #[error("http status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
}

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchResult;
}

/// Stateless GET fetcher shared by all workers. Every failure mode is folded
/// into `FetchResult::Failed`; callers never see an Err from here.
pub struct LightFetcher {
    client: Client,
}

impl LightFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> crate::models::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl PageFetcher for LightFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        debug!("Fetching: {}", url);
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    debug!("Fetched {} bytes from {}", body.len(), url);
                    FetchResult::Content(body)
                }
                Err(e) => FetchResult::Failed(FetchFailure::Network(e.to_string())),
            },
            Ok(response) => FetchResult::Failed(FetchFailure::Status(response.status().as_u16())),
            Err(e) if e.is_timeout() => FetchResult::Failed(FetchFailure::Timeout),
            Err(e) => FetchResult::Failed(FetchFailure::Network(e.to_string())),
        }
    }
}
