use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

/// Default maximum entry text length in bytes. Below the log's hard limit
/// of 8192 to leave room for entry metadata.
pub const DEFAULT_CEILING: usize = 7000;

/// Smallest ceiling accepted from config.
pub const MIN_CEILING: usize = 64;

/// TOML-backed configuration loaded from disk.
/// Secrets (DB URL) stay as env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub feed: FeedConfig,
    pub publish: PublishConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    pub url: String,
    /// Avatar image for the about entry.
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    /// Identity that owns the log.
    pub author: String,
    #[serde(default = "default_ceiling")]
    pub ceiling: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    #[serde(default = "default_feed_timeout_secs")]
    pub feed_timeout_secs: u64,
    #[serde(default = "default_media_timeout_secs")]
    pub media_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

fn default_ceiling() -> usize {
    DEFAULT_CEILING
}
fn default_feed_timeout_secs() -> u64 {
    60
}
fn default_media_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("rssplug/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_interval_minutes() -> u64 {
    5
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            feed_timeout_secs: default_feed_timeout_secs(),
            media_timeout_secs: default_media_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
        }
    }
}

impl HttpConfig {
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn media_timeout(&self) -> Duration {
        Duration::from_secs(self.media_timeout_secs)
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

impl FileConfig {
    /// Load and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate config from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: FileConfig = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.feed.url.trim().is_empty() {
            bail!("feed.url must not be empty");
        }
        if self.publish.author.trim().is_empty() {
            bail!("publish.author must not be empty");
        }
        if self.publish.ceiling < MIN_CEILING {
            bail!(
                "publish.ceiling must be at least {MIN_CEILING}, got {}",
                self.publish.ceiling
            );
        }
        if self.poll.interval_minutes == 0 {
            bail!("poll.interval_minutes must be at least 1");
        }
        Ok(())
    }
}

/// Environment-only configuration (secrets).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable is required")?,
        };

        config.log_redacted();
        Ok(config)
    }

    fn log_redacted(&self) {
        let host = self
            .database_url
            .rsplit_once('@')
            .map(|(_, host)| host)
            .unwrap_or("<unparsed>");
        info!(database = host, "Loaded environment config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[feed]
url = "https://example.com/feed.xml"

[publish]
author = "@plug"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = FileConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.publish.ceiling, DEFAULT_CEILING);
        assert_eq!(config.http.feed_timeout(), Duration::from_secs(60));
        assert_eq!(config.http.media_timeout(), Duration::from_secs(30));
        assert_eq!(config.poll.interval(), Duration::from_secs(300));
        assert!(config.feed.avatar.is_none());
    }

    #[test]
    fn full_config_parses() {
        let config = FileConfig::parse(
            r#"
[feed]
url = "https://example.com/feed.xml"
avatar = "https://example.com/logo.png"

[publish]
author = "@plug"
ceiling = 4000

[http]
feed_timeout_secs = 10
media_timeout_secs = 5
user_agent = "test-agent"

[poll]
interval_minutes = 15
"#,
        )
        .unwrap();

        assert_eq!(config.feed.avatar.as_deref(), Some("https://example.com/logo.png"));
        assert_eq!(config.publish.ceiling, 4000);
        assert_eq!(config.http.user_agent, "test-agent");
        assert_eq!(config.poll.interval_minutes, 15);
    }

    #[test]
    fn unknown_fields_rejected() {
        let toml = format!("{MINIMAL}\nshs_cap = \"abc\"\n");
        assert!(FileConfig::parse(&toml).is_err());
    }

    #[test]
    fn tiny_ceiling_rejected() {
        let toml = MINIMAL.replace("author = \"@plug\"", "author = \"@plug\"\nceiling = 10");
        let err = FileConfig::parse(&toml).unwrap_err();
        assert!(err.to_string().contains("ceiling"));
    }

    #[test]
    fn empty_author_rejected() {
        let toml = MINIMAL.replace("@plug", " ");
        assert!(FileConfig::parse(&toml).is_err());
    }
}
