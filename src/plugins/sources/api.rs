use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::{ApiConfig, ApiCredentials, HttpConfig, SourceConfig};
use crate::models::{Platform, ResolvedPost};
use crate::plugins::traits::{PostSource, StrategyKind};
use crate::utils::error::AppError;
use crate::utils::time::parse_timestamp;
use crate::Result;

// Bluesky AppView
#[derive(Debug, Deserialize)]
struct AuthorFeed {
    #[serde(default)]
    feed: Vec<FeedViewPost>,
}

#[derive(Debug, Deserialize)]
struct FeedViewPost {
    post: BskyPost,
}

#[derive(Debug, Deserialize)]
struct BskyPost {
    uri: String,
    author: BskyAuthor,
    record: BskyRecord,
}

#[derive(Debug, Deserialize)]
struct BskyAuthor {
    handle: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BskyRecord {
    #[serde(default)]
    text: String,
    created_at: Option<String>,
}

// Twitter v2
#[derive(Debug, Deserialize)]
struct TwitterUser {
    data: TwitterUserData,
}

#[derive(Debug, Deserialize)]
struct TwitterUserData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TwitterTimeline {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    created_at: Option<String>,
}

// Graph API
#[derive(Debug, Deserialize)]
struct GraphList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct PagePost {
    message: Option<String>,
    permalink_url: Option<String>,
    created_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaPost {
    caption: Option<String>,
    permalink: Option<String>,
    timestamp: Option<String>,
}

/// Documented platform APIs: the Bluesky public AppView, Twitter v2 and the
/// Graph API for Facebook pages and Instagram business accounts.
pub struct ApiSource {
    client: Client,
    endpoints: ApiConfig,
}

impl ApiSource {
    pub fn new(http: &HttpConfig, endpoints: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(http.request_timeout())
            .user_agent(http.user_agent.clone())
            .build()?;
        Ok(Self { client, endpoints })
    }

    fn endpoint(base: &str, path: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        platform: Platform,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::api(platform, format!("HTTP {}", status)));
        }
        Ok(response.json::<T>().await?)
    }

    async fn bluesky(&self, profile_url: &str) -> Result<Option<ResolvedPost>> {
        let Some(handle) = bluesky_handle(profile_url) else {
            return Err(AppError::api(Platform::Bluesky, "profile URL has no /profile/<handle>"));
        };

        let url = Self::endpoint(&self.endpoints.bluesky_base_url, "xrpc/app.bsky.feed.getAuthorFeed");
        let feed: AuthorFeed = self
            .get_json(
                Platform::Bluesky,
                self.client.get(url).query(&[("actor", handle.as_str()), ("limit", "1")]),
            )
            .await?;

        let Some(item) = feed.feed.into_iter().next() else {
            return Ok(None);
        };
        let post = item.post;
        let rkey = post.uri.rsplit('/').next().unwrap_or_default();
        let link = format!("https://bsky.app/profile/{}/post/{}", post.author.handle, rkey);
        let published = post.record.created_at.as_deref().and_then(parse_timestamp);

        Ok(Some(ResolvedPost::new(Platform::Bluesky, &post.record.text, link, published)))
    }

    async fn twitter(&self, profile_url: &str, credentials: &ApiCredentials) -> Result<Option<ResolvedPost>> {
        let Some(username) = first_path_segment(profile_url) else {
            return Err(AppError::api(Platform::X, "profile URL has no username"));
        };

        let user_url = Self::endpoint(
            &self.endpoints.twitter_base_url,
            &format!("2/users/by/username/{}", username),
        );
        let user: TwitterUser = self
            .get_json(Platform::X, self.client.get(user_url).bearer_auth(&credentials.token))
            .await?;

        let tweets_url = Self::endpoint(
            &self.endpoints.twitter_base_url,
            &format!("2/users/{}/tweets", user.data.id),
        );
        let timeline: TwitterTimeline = self
            .get_json(
                Platform::X,
                self.client
                    .get(tweets_url)
                    .bearer_auth(&credentials.token)
                    .query(&[("max_results", "5"), ("tweet.fields", "created_at")]),
            )
            .await?;

        let Some(tweet) = timeline.data.into_iter().next() else {
            return Ok(None);
        };
        let link = format!("https://x.com/{}/status/{}", username, tweet.id);
        let published = tweet.created_at.as_deref().and_then(parse_timestamp);
        Ok(Some(ResolvedPost::new(Platform::X, &tweet.text, link, published)))
    }

    async fn facebook_page(&self, credentials: &ApiCredentials) -> Result<Option<ResolvedPost>> {
        let Some(page_id) = credentials.account_id.as_deref() else {
            return Err(AppError::api(Platform::Facebook, "missing page id"));
        };

        let url = Self::endpoint(&self.endpoints.graph_base_url, &format!("{}/feed", page_id));
        let posts: GraphList<PagePost> = self
            .get_json(
                Platform::Facebook,
                self.client.get(url).query(&[
                    ("fields", "message,permalink_url,created_time"),
                    ("limit", "1"),
                    ("access_token", credentials.token.as_str()),
                ]),
            )
            .await?;

        let Some(post) = posts.data.into_iter().next() else {
            return Ok(None);
        };
        let Some(link) = post.permalink_url else {
            return Err(AppError::api(Platform::Facebook, "post has no permalink_url"));
        };
        let published = post.created_time.as_deref().and_then(parse_timestamp);
        Ok(Some(ResolvedPost::new(
            Platform::Facebook,
            post.message.as_deref().unwrap_or_default(),
            link,
            published,
        )))
    }

    async fn instagram_media(&self, credentials: &ApiCredentials) -> Result<Option<ResolvedPost>> {
        let Some(user_id) = credentials.account_id.as_deref() else {
            return Err(AppError::api(Platform::Instagram, "missing IG user id"));
        };

        let url = Self::endpoint(&self.endpoints.graph_base_url, &format!("{}/media", user_id));
        let media: GraphList<MediaPost> = self
            .get_json(
                Platform::Instagram,
                self.client.get(url).query(&[
                    ("fields", "caption,permalink,timestamp"),
                    ("limit", "1"),
                    ("access_token", credentials.token.as_str()),
                ]),
            )
            .await?;

        let Some(item) = media.data.into_iter().next() else {
            return Ok(None);
        };
        let Some(link) = item.permalink else {
            return Err(AppError::api(Platform::Instagram, "media has no permalink"));
        };
        let published = item.timestamp.as_deref().and_then(parse_timestamp);
        Ok(Some(ResolvedPost::new(
            Platform::Instagram,
            item.caption.as_deref().unwrap_or_default(),
            link,
            published,
        )))
    }
}

#[async_trait]
impl PostSource for ApiSource {
    fn strategy(&self) -> StrategyKind {
        StrategyKind::Api
    }

    async fn latest(&self, platform: Platform, source: &SourceConfig) -> Result<Option<ResolvedPost>> {
        let Some(profile_url) = source.profile_url.as_deref() else {
            return Ok(None);
        };

        match (platform, source.api.as_ref()) {
            (Platform::Bluesky, _) => self.bluesky(profile_url).await,
            (Platform::X, Some(credentials)) => self.twitter(profile_url, credentials).await,
            (Platform::Facebook, Some(credentials)) => self.facebook_page(credentials).await,
            (Platform::Instagram, Some(credentials)) => self.instagram_media(credentials).await,
            (Platform::X | Platform::Facebook | Platform::Instagram, None) => {
                tracing::debug!(%platform, "No API credentials, skipping API strategy");
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

/// `https://bsky.app/profile/<handle>/...` -> `<handle>`.
pub fn bluesky_handle(profile_url: &str) -> Option<String> {
    let url = Url::parse(profile_url).ok()?;
    let mut segments = url.path_segments()?;
    while let Some(segment) = segments.next() {
        if segment == "profile" {
            return segments.next().filter(|h| !h.is_empty()).map(str::to_string);
        }
    }
    None
}

/// `https://x.com/<name>` -> `<name>`, ignoring a leading `@`.
pub fn first_path_segment(profile_url: &str) -> Option<String> {
    let url = Url::parse(profile_url).ok()?;
    url.path_segments()?
        .find(|s| !s.is_empty())
        .map(|s| s.trim_start_matches('@').to_string())
}
