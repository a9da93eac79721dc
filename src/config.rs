use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub store: StoreConfig,
    pub crawler: CrawlerConfig,
    pub discovery: DiscoveryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub db_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    /// Concurrent workers; also the number of live browser sessions.
    pub workers: usize,
    pub fetch_timeout_seconds: u64,
    pub render_ready_timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// Relative paths tried in order when the landing page has no email.
    pub subpages: Vec<String>,
    /// Href tokens that mark an anchor as a social profile link.
    pub social_platforms: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                db_path: "data/records.db".to_string(),
            },
            crawler: CrawlerConfig {
                workers: 5,
                fetch_timeout_seconds: 10,
                render_ready_timeout_seconds: 15,
                user_agent: "Mozilla/5.0".to_string(),
            },
            discovery: DiscoveryConfig {
                subpages: [
                    "contact",
                    "about",
                    "privacy-policy",
                    "About",
                    "Contact",
                    "Privacy-Policy",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                social_platforms: [
                    "facebook.com",
                    "twitter.com",
                    "linkedin.com",
                    "instagram.com",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

pub async fn load_config(
    path: &str,
) -> std::result::Result<Config, Box<dyn std::error::Error + Send + Sync>> {
    let content = tokio::fs::read_to_string(path).await?;
    let config: Config = serde_yaml::from_str(&content)?;
    Ok(config)
}
