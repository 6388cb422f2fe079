use super::*;
use chrono::Utc;
use post_herald::config::{ApiCredentials, DiscordConfig, HttpConfig};
use post_herald::plugins::notifiers::DiscordNotifier;
use post_herald::plugins::sources::{ApiSource, FeedSource, PageTitleFetcher};
use post_herald::plugins::traits::PostSource;
use post_herald::AppError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http() -> HttpConfig {
    HttpConfig {
        request_timeout: 5,
        title_timeout: 2,
        ..Default::default()
    }
}

fn api_source(server: &MockServer) -> ApiSource {
    let base = server.uri();
    ApiSource::new(
        &http(),
        ApiConfig {
            bluesky_base_url: base.clone(),
            twitter_base_url: base.clone(),
            graph_base_url: base,
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_tumblr_feed_from_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[("Reblogged art", "https://me.tumblr.com/post/5")])))
        .expect(1)
        .mount(&server)
        .await;

    let feed = FeedSource::new(&http()).unwrap();
    let post = feed
        .latest(Platform::Tumblr, &profile(format!("{}/", server.uri())))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(post.title, "Reblogged art");
    assert_eq!(post.link, "https://me.tumblr.com/post/5");
}

#[tokio::test]
async fn test_youtube_feed_is_discovered() {
    let server = MockServer::start().await;
    let page = format!(
        r#"<html><head><link rel="alternate" type="application/rss+xml" href="{}/feeds/videos.xml?channel_id=UC1"></head></html>"#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/@insights"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feeds/videos.xml"))
        .and(query_param("channel_id", "UC1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[("Video", "https://www.youtube.com/watch?v=abc")])))
        .mount(&server)
        .await;

    let feed = FeedSource::new(&http()).unwrap();
    let post = feed
        .latest(Platform::Youtube, &profile(format!("{}/@insights", server.uri())))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(post.link, "https://www.youtube.com/watch?v=abc");
}

#[tokio::test]
async fn test_youtube_without_feed_link_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><head></head></html>"))
        .mount(&server)
        .await;

    let feed = FeedSource::new(&http()).unwrap();
    let result = feed.latest(Platform::Youtube, &profile(server.uri())).await;
    assert!(matches!(result, Err(AppError::Unavailable { .. })));
}

#[tokio::test]
async fn test_empty_feed_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(&[])))
        .mount(&server)
        .await;

    let feed = FeedSource::new(&http()).unwrap();
    let source = SourceConfig {
        feed_url: Some(format!("{}/feed", server.uri())),
        ..Default::default()
    };
    assert!(feed.latest(Platform::Blogger, &source).await.unwrap().is_none());
}

#[tokio::test]
async fn test_bluesky_author_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/xrpc/app.bsky.feed.getAuthorFeed"))
        .and(query_param("actor", "insights.bsky.social"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "feed": [{
                "post": {
                    "uri": "at://did:plc:abc/app.bsky.feed.post/3kxyz",
                    "author": { "handle": "insights.bsky.social" },
                    "record": { "text": "Hello sky\nmore", "createdAt": "2024-05-01T10:00:00.000Z" }
                }
            }]
        })))
        .mount(&server)
        .await;

    let post = api_source(&server)
        .latest(Platform::Bluesky, &profile("https://bsky.app/profile/insights.bsky.social"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(post.link, "https://bsky.app/profile/insights.bsky.social/post/3kxyz");
    assert_eq!(post.title, "Hello sky");
    assert!(post.published_at.is_some());
}

#[tokio::test]
async fn test_twitter_two_step_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/users/by/username/insightsbysd"))
        .and(header("authorization", "Bearer t0ken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "id": "42" } })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/users/42/tweets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "1790", "text": "Shipping today", "created_at": "2024-05-01T10:00:00.000Z" }]
        })))
        .mount(&server)
        .await;

    let source = SourceConfig {
        profile_url: Some("https://x.com/insightsbysd".to_string()),
        api: Some(ApiCredentials {
            token: "t0ken".to_string(),
            account_id: None,
        }),
        ..Default::default()
    };
    let post = api_source(&server).latest(Platform::X, &source).await.unwrap().unwrap();
    assert_eq!(post.link, "https://x.com/insightsbysd/status/1790");
    assert_eq!(post.title, "Shipping today");
}

#[tokio::test]
async fn test_rate_limited_api_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let source = SourceConfig {
        profile_url: Some("https://x.com/insightsbysd".to_string()),
        api: Some(ApiCredentials {
            token: "t".to_string(),
            account_id: None,
        }),
        ..Default::default()
    };
    let result = api_source(&server).latest(Platform::X, &source).await;
    assert!(matches!(result, Err(AppError::Api { platform: Platform::X, .. })));
}

#[tokio::test]
async fn test_graph_page_and_media() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1234/feed"))
        .and(query_param("access_token", "fb"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "message": "Page update", "permalink_url": "https://www.facebook.com/1234/posts/9", "created_time": "2024-05-01T10:00:00+0000" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/5678/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "permalink": "https://www.instagram.com/p/C1/", "timestamp": "2024-05-01T10:00:00+0000" }]
        })))
        .mount(&server)
        .await;

    let api = api_source(&server);
    let credentials = |id: &str| SourceConfig {
        profile_url: Some("https://example.com/insights".to_string()),
        api: Some(ApiCredentials {
            token: "fb".to_string(),
            account_id: Some(id.to_string()),
        }),
        ..Default::default()
    };

    let page = api.latest(Platform::Facebook, &credentials("1234")).await.unwrap().unwrap();
    assert_eq!(page.link, "https://www.facebook.com/1234/posts/9");
    assert_eq!(page.title, "Page update");
    assert!(page.published_at.is_some());

    let media = api.latest(Platform::Instagram, &credentials("5678")).await.unwrap().unwrap();
    assert_eq!(media.link, "https://www.instagram.com/p/C1/");
    assert_eq!(media.title, "New Instagram Post");
}

#[tokio::test]
async fn test_page_title_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/post/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><meta property="og:title" content="Quarterly results | Insights Blog"><title>ignored</title></head></html>"#,
        ))
        .mount(&server)
        .await;

    let titles = PageTitleFetcher::new(&http()).unwrap();
    let title = titles.fetch_title(&format!("{}/post/1", server.uri())).await.unwrap();
    assert_eq!(title.as_deref(), Some("Quarterly results"));
}

#[tokio::test]
async fn test_page_title_fetch_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(4)))
        .mount(&server)
        .await;

    let titles = PageTitleFetcher::new(&http()).unwrap();
    assert!(titles.fetch_title(&server.uri()).await.is_err());
}

#[tokio::test]
async fn test_discord_webhook_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .and(body_partial_json(json!({
            "username": "Post Herald",
            "embeds": [{ "title": "New YouTube Post!", "url": "https://youtu.be/abc" }]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = DiscordNotifier::from_config(&DiscordConfig {
        webhook_url: Some(format!("{}/webhook", server.uri())),
        ..Default::default()
    })
    .unwrap()
    .unwrap();

    let event = AnnouncementEvent {
        platform: Platform::Youtube,
        title: "A video".to_string(),
        link: "https://youtu.be/abc".to_string(),
        published_at: None,
        announced_at: Utc::now(),
    };
    notifier.notify(&event).await.unwrap();
}

#[tokio::test]
async fn test_discord_rejection_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let notifier = DiscordNotifier::from_config(&DiscordConfig {
        webhook_url: Some(server.uri()),
        ..Default::default()
    })
    .unwrap()
    .unwrap();

    let event = AnnouncementEvent::from_post(ResolvedPost::new(Platform::Tumblr, "t", "https://t/1", None));
    assert!(notifier.notify(&event).await.is_err());
}
