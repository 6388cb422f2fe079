use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Platform;
use crate::utils::text::{first_line, truncate_title};

/// The latest post of a platform as determined by one resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedPost {
    pub platform: Platform,
    pub title: String,
    /// Canonical URL of the post, the dedup key.
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl ResolvedPost {
    /// Builds a post with a normalized title: first non-empty line, at most
    /// 100 characters, or the platform placeholder when nothing is left.
    pub fn new(
        platform: Platform,
        title: &str,
        link: impl Into<String>,
        published_at: Option<DateTime<Utc>>,
    ) -> Self {
        let title = first_line(title)
            .map(|line| truncate_title(&line))
            .unwrap_or_else(|| platform.placeholder_title());
        Self {
            platform,
            title,
            link: link.into(),
            published_at,
        }
    }
}

/// Emitted once per newly seen link for a platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnouncementEvent {
    pub platform: Platform,
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub announced_at: DateTime<Utc>,
}

impl AnnouncementEvent {
    pub fn from_post(post: ResolvedPost) -> Self {
        Self {
            platform: post.platform,
            title: post.title,
            link: post.link,
            published_at: post.published_at,
            announced_at: Utc::now(),
        }
    }
}

/// An administrator- or detector-supplied link that supersedes automatic
/// resolution for its platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManualOverride {
    pub link: String,
    #[serde(rename = "date", alias = "setAt")]
    pub set_at: DateTime<Utc>,
    #[serde(default = "default_manual")]
    pub manual: bool,
}

fn default_manual() -> bool {
    true
}

impl ManualOverride {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            set_at: Utc::now(),
            manual: true,
        }
    }
}

/// One page to render and extract from, created per poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeTask {
    pub url: String,
    pub platform: Platform,
}

impl ScrapeTask {
    pub fn new(platform: Platform, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            platform,
        }
    }
}
