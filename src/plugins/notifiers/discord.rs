use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::config::DiscordConfig;
use crate::models::AnnouncementEvent;
use crate::plugins::traits::AnnouncementNotifier;
use crate::utils::error::AppError;
use crate::Result;

const ANNOUNCE_COLOR: u32 = 0x00ff00;
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts each announcement as a single embed to a Discord webhook.
pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
    username: String,
    avatar_url: Option<String>,
}

impl DiscordNotifier {
    /// `None` when no webhook is configured.
    pub fn from_config(config: &DiscordConfig) -> Result<Option<Self>> {
        let Some(webhook_url) = config.webhook_url.clone() else {
            return Ok(None);
        };
        let client = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Some(Self {
            client,
            webhook_url,
            username: config.username.clone(),
            avatar_url: config.avatar_url.clone(),
        }))
    }

    fn create_embed(&self, event: &AnnouncementEvent) -> serde_json::Value {
        let mut embed = json!({
            "title": format!("New {} Post!", event.platform.display_name()),
            "description": format!("**[{}]({})**", event.title, event.link),
            "url": event.link,
            "color": ANNOUNCE_COLOR,
            "footer": { "text": self.username },
        });

        // Discord rejects invalid timestamps, so only send a real one.
        if let Some(published) = event.published_at {
            embed["timestamp"] = json!(published.to_rfc3339());
        }

        embed
    }

    fn create_webhook_payload(&self, event: &AnnouncementEvent) -> serde_json::Value {
        let mut payload = json!({
            "username": self.username,
            "embeds": [self.create_embed(event)]
        });

        if let Some(avatar_url) = &self.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        payload
    }
}

#[async_trait]
impl AnnouncementNotifier for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    async fn notify(&self, event: &AnnouncementEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&self.create_webhook_payload(event))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::api(
                event.platform,
                format!("Discord webhook returned HTTP {}", response.status()),
            ));
        }

        tracing::info!(platform = %event.platform, link = %event.link, "Announcement delivered to Discord");
        Ok(())
    }
}
