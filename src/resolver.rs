//! Per-platform latest-post resolution.
//!
//! A manual override always wins. Otherwise the platform's strategy chain
//! is walked in order and the first post found is returned. Feed and API
//! strategies run inline; reaching the scrape strategy yields a task so a
//! whole cycle can share one scrape batch.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::SourceConfig;
use crate::models::{ManualOverride, Platform, ResolvedPost, ScrapeTask};
use crate::plugins::traits::{PostSource, StrategyKind, TitleFetcher};
use crate::session::ScrapeBackend;
use crate::store::OverrideStore;

/// Where a platform's resolution stands before any scraping happens.
#[derive(Debug)]
enum Step {
    Done(Option<ResolvedPost>, &'static str),
    NeedsScrape(ScrapeTask),
}

pub struct Resolver {
    sources: BTreeMap<Platform, SourceConfig>,
    overrides: Arc<OverrideStore>,
    strategies: HashMap<StrategyKind, Arc<dyn PostSource>>,
    titles: Arc<dyn TitleFetcher>,
    scraper: Arc<dyn ScrapeBackend>,
}

impl Resolver {
    pub fn new(
        sources: BTreeMap<Platform, SourceConfig>,
        overrides: Arc<OverrideStore>,
        titles: Arc<dyn TitleFetcher>,
        scraper: Arc<dyn ScrapeBackend>,
    ) -> Self {
        Self {
            sources,
            overrides,
            strategies: HashMap::new(),
            titles,
            scraper,
        }
    }

    /// Register a network strategy under the kind it reports.
    pub fn with_strategy(mut self, source: Arc<dyn PostSource>) -> Self {
        self.strategies.insert(source.strategy(), source);
        self
    }

    /// Resolve one platform. Never fails; `None` means temporarily
    /// unavailable.
    pub async fn resolve(&self, platform: Platform) -> Option<ResolvedPost> {
        match self.prepare(platform).await {
            Step::Done(post, outcome) => {
                record_outcome(platform, outcome);
                post
            }
            Step::NeedsScrape(task) => {
                let post = self.scraper.scrape_batch(vec![task]).await.into_iter().next().flatten();
                record_outcome(platform, scrape_outcome(&post));
                post
            }
        }
    }

    /// Resolve several platforms in order, running every scrape they need in
    /// a single batch. Results keep the input order.
    pub async fn resolve_cycle(&self, platforms: &[Platform]) -> Vec<(Platform, Option<ResolvedPost>)> {
        let mut results = Vec::with_capacity(platforms.len());
        let mut pending = Vec::new();
        let mut tasks = Vec::new();

        for &platform in platforms {
            match self.prepare(platform).await {
                Step::Done(post, outcome) => {
                    record_outcome(platform, outcome);
                    results.push((platform, post));
                }
                Step::NeedsScrape(task) => {
                    pending.push(results.len());
                    tasks.push(task);
                    results.push((platform, None));
                }
            }
        }

        if !tasks.is_empty() {
            tracing::debug!(tasks = tasks.len(), "Dispatching scrape batch");
            let scraped = self.scraper.scrape_batch(tasks).await;
            if scraped.len() != pending.len() {
                tracing::warn!(expected = pending.len(), got = scraped.len(), "Scrape batch returned wrong number of results");
            }
            for (index, post) in pending.into_iter().zip(scraped) {
                let platform = results[index].0;
                record_outcome(platform, scrape_outcome(&post));
                results[index].1 = post;
            }
        }

        results
    }

    async fn prepare(&self, platform: Platform) -> Step {
        match self.overrides.get(platform).await {
            Ok(Some(entry)) => {
                tracing::debug!(%platform, link = %entry.link, strategy = "override", "Using manual override");
                return Step::Done(Some(self.from_override(platform, entry).await), "override");
            }
            Ok(None) => {}
            Err(e) => {
                // An unreadable override may hide a higher-confidence link.
                tracing::warn!(%platform, "Skipping resolution, overrides unreadable: {}", e);
                return Step::Done(None, "unavailable");
            }
        }

        let Some(source) = self.sources.get(&platform).filter(|s| s.profile_url.is_some() || s.feed_url.is_some())
        else {
            tracing::debug!(%platform, "No profile configured");
            return Step::Done(None, "unconfigured");
        };

        for &kind in StrategyKind::chain_for(platform) {
            if kind == StrategyKind::Scrape {
                return match source.profile_url.as_deref() {
                    Some(url) => Step::NeedsScrape(ScrapeTask::new(platform, url)),
                    None => Step::Done(None, "unavailable"),
                };
            }

            let Some(strategy) = self.strategies.get(&kind) else {
                tracing::debug!(%platform, strategy = %kind, "Strategy not registered");
                continue;
            };

            match strategy.latest(platform, source).await {
                Ok(Some(post)) => {
                    tracing::debug!(%platform, strategy = %kind, link = %post.link, "Resolved latest post");
                    return Step::Done(Some(post), kind.as_str());
                }
                Ok(None) => tracing::debug!(%platform, strategy = %kind, "Strategy found nothing"),
                Err(e) => tracing::warn!(%platform, strategy = %kind, "Strategy failed: {}", e),
            }
        }

        Step::Done(None, "unavailable")
    }

    /// The override's link with a live page title when one can be fetched.
    async fn from_override(&self, platform: Platform, entry: ManualOverride) -> ResolvedPost {
        let title = match self.titles.fetch_title(&entry.link).await {
            Ok(Some(title)) if !title.trim().is_empty() => title,
            Ok(_) => platform.override_title(),
            Err(e) => {
                tracing::debug!(%platform, link = %entry.link, "Title enrichment failed: {}", e);
                platform.override_title()
            }
        };
        ResolvedPost::new(platform, &title, entry.link, Some(entry.set_at))
    }
}

fn scrape_outcome(post: &Option<ResolvedPost>) -> &'static str {
    if post.is_some() {
        "scrape"
    } else {
        "unavailable"
    }
}

fn record_outcome(platform: Platform, outcome: &'static str) {
    metrics::counter!("herald_resolutions_total", "platform" => platform.id(), "outcome" => outcome).increment(1);
}
