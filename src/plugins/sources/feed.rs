use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::config::{HttpConfig, SourceConfig};
use crate::models::{Platform, ResolvedPost};
use crate::plugins::traits::{PostSource, StrategyKind};
use crate::utils::error::AppError;
use crate::Result;

/// How a platform's syndication feed is located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLocation {
    /// Fetch this URL directly.
    Direct(String),
    /// Fetch the profile page and follow its `<link rel="alternate">` feed.
    Discover(String),
}

impl FeedLocation {
    pub fn for_source(platform: Platform, source: &SourceConfig) -> Option<FeedLocation> {
        if let Some(feed_url) = &source.feed_url {
            return Some(FeedLocation::Direct(feed_url.clone()));
        }
        let profile = source.profile_url.as_deref()?;
        match platform {
            Platform::Tumblr => Some(FeedLocation::Direct(format!(
                "{}/rss",
                profile.trim_end_matches('/')
            ))),
            Platform::Youtube => Some(FeedLocation::Discover(profile.to_string())),
            // Blogger needs an explicit feed URL.
            _ => None,
        }
    }
}

/// RSS/Atom strategy: the first entry of the feed is the latest post.
pub struct FeedSource {
    client: Client,
    user_agent: String,
}

impl FeedSource {
    pub fn new(http: &HttpConfig) -> Result<Self> {
        let client = Client::builder().timeout(http.request_timeout()).build()?;
        Ok(Self {
            client,
            user_agent: http.user_agent.clone(),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    async fn resolve_feed_url(&self, location: &FeedLocation) -> Result<Option<String>> {
        match location {
            FeedLocation::Direct(url) => Ok(Some(url.clone())),
            FeedLocation::Discover(profile) => {
                let html = self.get_text(profile).await?;
                Ok(discover_feed_url(&html, profile))
            }
        }
    }

    async fn fetch_first_entry(&self, platform: Platform, feed_url: &str) -> Result<Option<ResolvedPost>> {
        let bytes = self
            .client
            .get(feed_url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let feed = feed_rs::parser::parse(&bytes[..])?;
        tracing::debug!(%platform, feed_url, entries = feed.entries.len(), "Parsed feed");
        Ok(first_post(platform, feed))
    }
}

#[async_trait]
impl PostSource for FeedSource {
    fn strategy(&self) -> StrategyKind {
        StrategyKind::Feed
    }

    async fn latest(&self, platform: Platform, source: &SourceConfig) -> Result<Option<ResolvedPost>> {
        let Some(location) = FeedLocation::for_source(platform, source) else {
            tracing::debug!(%platform, "No feed configured");
            return Ok(None);
        };

        let Some(feed_url) = self.resolve_feed_url(&location).await? else {
            return Err(AppError::unavailable(format!("no feed link on {} profile page", platform)));
        };

        self.fetch_first_entry(platform, &feed_url).await
    }
}

/// Find the RSS or Atom feed advertised by an HTML page, resolved against
/// the page URL.
pub fn discover_feed_url(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(
        r#"link[type="application/rss+xml"], link[type="application/atom+xml"]"#,
    )
    .ok()?;

    let href = document
        .select(&selector)
        .find_map(|el| el.value().attr("href"))?;

    match Url::parse(page_url).and_then(|base| base.join(href)) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Url::parse(href).ok().map(|u| u.to_string()),
    }
}

/// The entry's permalink. Atom entries also carry `replies`, `edit` and
/// `self` links, which often come first.
fn post_link(links: &[feed_rs::model::Link]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
}

/// The feed's first entry as a post. Entries without a link are not posts.
pub fn first_post(platform: Platform, feed: feed_rs::model::Feed) -> Option<ResolvedPost> {
    let entry = feed.entries.into_iter().next()?;
    let link = post_link(&entry.links).or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;
    let title = entry.title.map(|t| t.content).unwrap_or_default();
    let published = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.with_timezone(&chrono::Utc));

    Some(ResolvedPost::new(platform, &title, link, published))
}
