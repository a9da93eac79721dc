use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Marker some datasets use for "website unknown".
pub const NO_DATA_SENTINEL: &str = "-";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub website: Option<String>,
    pub email: Option<String>,
}

impl Record {
    /// The record's website URL, unless it is absent, empty, or the
    /// "no data" sentinel.
    pub fn website_url(&self) -> Option<&str> {
        self.website
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty() && *w != NO_DATA_SENTINEL)
    }
}

/// Pipeline-level failures. Network and parse problems are not errors: they
/// degrade to "no data from this source" and the pipeline moves on. Only a
/// render session that cannot be created crosses this boundary, because
/// without it the worker cannot run the social fallback at all.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("render session unavailable: {0}")]
    Session(String),
}
