use async_trait::async_trait;

use crate::models::AnnouncementEvent;
use crate::Result;

/// Hands announcement events to whatever presents them to people.
#[async_trait]
pub trait AnnouncementNotifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, event: &AnnouncementEvent) -> Result<()>;
}
