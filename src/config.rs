use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::models::Platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub api: ApiConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub sources: BTreeMap<Platform, SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub overrides_file: String,
    pub history_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Seconds allowed for feed and API calls.
    pub request_timeout: u64,
    /// Seconds allowed for the best-effort page title fetch of an override.
    pub title_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub max_concurrent_tasks: usize,
    /// Seconds allowed for a page navigation.
    pub navigation_timeout: u64,
    /// Milliseconds to let client-side rendering settle before extraction.
    pub settle_delay_ms: u64,
    pub block_resources: bool,
    pub user_agent: String,
    pub chrome_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub run_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bluesky_base_url: String,
    pub twitter_base_url: String,
    pub graph_base_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub webhook_url: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: Option<String>,
    pub file_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

/// Where to look for a platform's posts. A platform without a profile URL is
/// never resolved automatically.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub profile_url: Option<String>,
    pub feed_url: Option<String>,
    pub api: Option<ApiCredentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiCredentials {
    pub token: String,
    /// Page id (Facebook) or IG user id (Instagram).
    #[serde(default)]
    pub account_id: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            overrides_file: "latest_posts.json".to_string(),
            history_file: "posted_history.json".to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; PostHerald/0.1)".to_string(),
            request_timeout: 15,
            title_timeout: 5,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 2,
            navigation_timeout: 30,
            settle_delay_ms: 2000,
            block_resources: true,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            chrome_path: None,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30 * 60,
            run_on_start: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bluesky_base_url: "https://public.api.bsky.app".to_string(),
            twitter_base_url: "https://api.twitter.com".to_string(),
            graph_base_url: "https://graph.facebook.com/v19.0".to_string(),
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: "Post Herald".to_string(),
            avatar_url: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: "post-herald.log".to_string(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9001,
        }
    }
}

impl StorageConfig {
    pub fn overrides_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.overrides_file)
    }

    pub fn history_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.history_file)
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn title_timeout(&self) -> Duration {
        Duration::from_secs(self.title_timeout)
    }
}

impl ScraperConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Wall-clock bound for a whole task, after which its result is dropped.
    pub fn task_deadline(&self) -> Duration {
        self.navigation_timeout() + self.settle_delay() + Duration::from_secs(10)
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "HERALD_"
            .add_source(Environment::with_prefix("HERALD").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        config.apply_legacy_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Fill gaps from the environment variables older deployments used.
    fn apply_legacy_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.scraper.chrome_path.is_none() {
            self.scraper.chrome_path = lookup("CHROME_PATH");
        }

        if self.notifications.discord.webhook_url.is_none() {
            self.notifications.discord.webhook_url = lookup("DISCORD_WEBHOOK_URL");
        }

        if let Some(token) = lookup("TWITTER_BEARER_TOKEN") {
            let source = self.sources.entry(Platform::X).or_default();
            source.api.get_or_insert(ApiCredentials {
                token,
                account_id: None,
            });
        }

        if let Some(token) = lookup("FB_ACCESS_TOKEN") {
            if let Some(page_id) = lookup("FB_PAGE_ID") {
                let source = self.sources.entry(Platform::Facebook).or_default();
                source.api.get_or_insert(ApiCredentials {
                    token: token.clone(),
                    account_id: Some(page_id),
                });
            }
            if let Some(ig_user) = lookup("IG_USER_ID") {
                let source = self.sources.entry(Platform::Instagram).or_default();
                source.api.get_or_insert(ApiCredentials {
                    token,
                    account_id: Some(ig_user),
                });
            }
        }
    }

    pub fn source(&self, platform: Platform) -> Option<&SourceConfig> {
        self.sources.get(&platform)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate scheduler configuration
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Message("Scheduler interval_secs must be greater than 0".into()));
        }

        // Validate scraper configuration
        if self.scraper.max_concurrent_tasks == 0 || self.scraper.max_concurrent_tasks > 8 {
            return Err(ConfigError::Message("Scraper max_concurrent_tasks must be between 1 and 8".into()));
        }

        if self.scraper.navigation_timeout == 0 {
            return Err(ConfigError::Message("Scraper navigation_timeout must be greater than 0".into()));
        }

        // Validate HTTP configuration
        if self.http.request_timeout == 0 || self.http.title_timeout == 0 {
            return Err(ConfigError::Message("HTTP timeouts must be greater than 0".into()));
        }

        for (name, base) in [
            ("bluesky_base_url", &self.api.bluesky_base_url),
            ("twitter_base_url", &self.api.twitter_base_url),
            ("graph_base_url", &self.api.graph_base_url),
        ] {
            if Url::parse(base).is_err() {
                return Err(ConfigError::Message(format!("Invalid URL for api.{}", name)));
            }
        }

        // Validate per-platform sources
        for (platform, source) in &self.sources {
            for url in [&source.profile_url, &source.feed_url].into_iter().flatten() {
                if Url::parse(url).is_err() {
                    return Err(ConfigError::Message(format!("Invalid URL for source {}: {}", platform, url)));
                }
            }
            if let Some(api) = &source.api {
                if api.token.trim().is_empty() {
                    return Err(ConfigError::Message(format!("Empty API token for source {}", platform)));
                }
            }
        }

        // Validate Discord webhook
        if let Some(webhook) = &self.notifications.discord.webhook_url {
            match Url::parse(webhook) {
                Ok(url) if url.scheme() == "https" => {}
                _ => return Err(ConfigError::Message("Discord webhook_url must be an https URL".into())),
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }
}
