use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SourceConfig;
use crate::models::{Platform, ResolvedPost};
use crate::Result;

/// The closed set of ways a platform's latest post can be found.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    ManualOverride,
    Feed,
    Api,
    Scrape,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::ManualOverride => "override",
            StrategyKind::Feed => "feed",
            StrategyKind::Api => "api",
            StrategyKind::Scrape => "scrape",
        }
    }

    /// Automatic strategies tried for a platform, in order, once no manual
    /// override applies. Scrape, when present, is always last.
    pub fn chain_for(platform: Platform) -> &'static [StrategyKind] {
        match platform {
            Platform::Youtube | Platform::Blogger | Platform::Tumblr => &[StrategyKind::Feed],
            Platform::Bluesky => &[StrategyKind::Api],
            Platform::X | Platform::Facebook | Platform::Instagram => {
                &[StrategyKind::Api, StrategyKind::Scrape]
            }
            Platform::Linkedin | Platform::Threads => &[StrategyKind::Scrape],
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A network-backed strategy (feed or API) that can report a platform's
/// latest post.
///
/// `Ok(None)` means the source answered without a usable post or does not
/// apply (e.g. no credentials); `Err` is a transient failure. Both make the
/// resolver move on to the next strategy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostSource: Send + Sync {
    fn strategy(&self) -> StrategyKind;

    async fn latest(&self, platform: Platform, source: &SourceConfig) -> Result<Option<ResolvedPost>>;
}

/// Best-effort lookup of a page's human title, used to decorate manual
/// overrides.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TitleFetcher: Send + Sync {
    async fn fetch_title(&self, url: &str) -> Result<Option<String>>;
}
