use async_trait::async_trait;

use crate::models::AnnouncementEvent;
use crate::plugins::traits::AnnouncementNotifier;
use crate::Result;

/// Default notifier: writes the event as a structured log record.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl AnnouncementNotifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, event: &AnnouncementEvent) -> Result<()> {
        tracing::info!(
            platform = %event.platform,
            title = %event.title,
            link = %event.link,
            published_at = ?event.published_at,
            "New post"
        );
        Ok(())
    }
}
