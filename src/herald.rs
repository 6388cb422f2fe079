use regex::Regex;
use std::sync::{Arc, OnceLock};

use crate::announcer::{Announcer, SeedOutcome};
use crate::config::AppConfig;
use crate::models::{ManualOverride, Platform, ResolvedPost};
use crate::plugins::notifiers::{DiscordNotifier, LogNotifier};
use crate::plugins::sources::{ApiSource, FeedSource, PageTitleFetcher};
use crate::plugins::traits::{AnnouncementNotifier, TitleFetcher};
use crate::resolver::Resolver;
use crate::scheduler::PollScheduler;
use crate::session::{ScrapeBackend, ScrapeSessionManager};
use crate::store::{HistoryStore, OverrideStore};
use crate::Result;

/// Wires the stores, strategies and announcer together from configuration
/// and exposes the operations the binary offers.
pub struct Herald {
    config: AppConfig,
    overrides: Arc<OverrideStore>,
    history: Arc<HistoryStore>,
    resolver: Arc<Resolver>,
    announcer: Arc<Announcer>,
    notifier: Arc<dyn AnnouncementNotifier>,
}

impl Herald {
    /// Production wiring with a headless Chrome scrape backend.
    pub fn new(config: AppConfig) -> Result<Self> {
        let scraper = Arc::new(ScrapeSessionManager::chrome(&config.scraper));
        let titles = Arc::new(PageTitleFetcher::new(&config.http)?);
        Self::with_backends(config, scraper, titles)
    }

    pub fn with_backends(
        config: AppConfig,
        scraper: Arc<dyn ScrapeBackend>,
        titles: Arc<dyn TitleFetcher>,
    ) -> Result<Self> {
        let overrides = Arc::new(OverrideStore::new(config.storage.overrides_path()));
        let history = Arc::new(HistoryStore::new(config.storage.history_path()));

        let resolver = Resolver::new(config.sources.clone(), Arc::clone(&overrides), titles, scraper)
            .with_strategy(Arc::new(FeedSource::new(&config.http)?))
            .with_strategy(Arc::new(ApiSource::new(&config.http, config.api.clone())?));

        let notifier: Arc<dyn AnnouncementNotifier> = match DiscordNotifier::from_config(&config.notifications.discord)? {
            Some(discord) => Arc::new(discord),
            None => Arc::new(LogNotifier),
        };
        tracing::debug!(notifier = notifier.name(), "Announcement notifier selected");

        Ok(Self {
            announcer: Arc::new(Announcer::new(Arc::clone(&history))),
            resolver: Arc::new(resolver),
            config,
            overrides,
            history,
            notifier,
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn AnnouncementNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn overrides(&self) -> &OverrideStore {
        &self.overrides
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub async fn scheduler(&self) -> Result<PollScheduler> {
        PollScheduler::new(
            Arc::clone(&self.resolver),
            Arc::clone(&self.announcer),
            Arc::clone(&self.notifier),
            Platform::ALL.to_vec(),
            self.config.scheduler.clone(),
        )
        .await
    }

    /// One-shot resolution without dedup or history changes.
    pub async fn latest(&self, platform: Platform) -> Option<ResolvedPost> {
        self.resolver.resolve(platform).await
    }

    pub async fn latest_all(&self) -> Vec<(Platform, Option<ResolvedPost>)> {
        self.resolver.resolve_cycle(&Platform::ALL).await
    }

    /// Resolve every platform and mark the results as already announced.
    pub async fn seed(&self) -> Result<Vec<(Platform, SeedOutcome)>> {
        let mut outcomes = Vec::new();
        for (platform, post) in self.latest_all().await {
            outcomes.push((platform, self.announcer.seed(platform, post).await?));
        }
        Ok(outcomes)
    }

    pub async fn set_latest(&self, platform: Platform, link: &str) -> Result<ManualOverride> {
        self.overrides.set(platform, link).await
    }

    pub async fn clear_latest(&self, platform: Platform) -> Result<bool> {
        self.overrides.clear(platform).await
    }

    /// Store the first recognizable post link in `text` as an override.
    pub async fn detect(&self, text: &str) -> Result<Option<(Platform, ManualOverride)>> {
        let Some((platform, link)) = detect_link(text) else {
            return Ok(None);
        };
        tracing::info!(%platform, link = %link, "Detected post link");
        let entry = self.overrides.set(platform, &link).await?;
        Ok(Some((platform, entry)))
    }
}

fn url_pattern() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("URL pattern is valid"))
}

/// The first URL in `text` whose host belongs to a known platform.
pub fn detect_link(text: &str) -> Option<(Platform, String)> {
    url_pattern().find_iter(text).find_map(|m| {
        let link = m.as_str().trim_end_matches(|c: char| matches!(c, '.' | ',' | ')' | '>' | '!' | '?'));
        Platform::from_url(link).map(|platform| (platform, link.to_string()))
    })
}
