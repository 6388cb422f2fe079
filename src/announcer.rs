//! Link-based deduplication of resolved posts.

use std::sync::Arc;

use crate::models::{AnnouncementEvent, Platform, ResolvedPost};
use crate::store::HistoryStore;

/// Decides whether a resolved post is new and, if so, records it before
/// handing out an event. The history is the only record of what was
/// announced; it is written here and nowhere else.
pub struct Announcer {
    history: Arc<HistoryStore>,
}

/// Result of recording a post without announcing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Recorded,
    AlreadyKnown,
    Unavailable,
}

impl Announcer {
    pub fn new(history: Arc<HistoryStore>) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Compare against the last announced link and emit an event for a new
    /// one. History is persisted first; if that fails no event is emitted and
    /// the post will be evaluated again next cycle.
    pub async fn evaluate(&self, platform: Platform, resolved: Option<ResolvedPost>) -> Option<AnnouncementEvent> {
        let post = resolved?;

        let last = match self.history.last_announced(platform).await {
            Ok(last) => last,
            Err(e) => {
                tracing::error!(%platform, "Cannot read announcement history: {}", e);
                return None;
            }
        };

        if last.as_deref() == Some(post.link.as_str()) {
            tracing::debug!(%platform, link = %post.link, "Already announced");
            return None;
        }

        if let Err(e) = self.history.record(platform, &post.link).await {
            tracing::error!(%platform, link = %post.link, "Not announcing, history write failed: {}", e);
            return None;
        }

        tracing::info!(%platform, link = %post.link, previous = ?last, "New post detected");
        metrics::counter!("herald_announcements_total", "platform" => platform.id()).increment(1);
        Some(AnnouncementEvent::from_post(post))
    }

    /// Record a post as already announced so it is never announced.
    pub async fn seed(&self, platform: Platform, resolved: Option<ResolvedPost>) -> crate::Result<SeedOutcome> {
        let Some(post) = resolved else {
            return Ok(SeedOutcome::Unavailable);
        };
        if self.history.last_announced(platform).await?.as_deref() == Some(post.link.as_str()) {
            return Ok(SeedOutcome::AlreadyKnown);
        }
        self.history.record(platform, &post.link).await?;
        tracing::info!(%platform, link = %post.link, "Seeded announcement history");
        Ok(SeedOutcome::Recorded)
    }
}
