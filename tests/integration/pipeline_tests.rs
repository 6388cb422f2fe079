use super::*;
use post_herald::announcer::SeedOutcome;
use post_herald::Herald;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Pipeline {
    _dir: TempDir,
    server: MockServer,
    scraper: Arc<ScriptedScraper>,
    notifier: Arc<RecordingNotifier>,
    herald: Herald,
}

async fn mount_blog(server: &MockServer, items: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path("/blog/feeds/posts/default"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(items)))
        .mount(server)
        .await;
}

async fn pipeline() -> Pipeline {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    mount_blog(&server, &[("Newest", "https://blog.example/2"), ("Older", "https://blog.example/1")]).await;

    let mut config = get_test_config(&dir, &server.uri());
    config.sources.insert(
        Platform::Blogger,
        SourceConfig {
            profile_url: Some("https://blog.example".to_string()),
            feed_url: Some(format!("{}/blog/feeds/posts/default", server.uri())),
            api: None,
        },
    );
    config.sources.insert(Platform::X, profile("https://x.com/insights"));
    config.sources.insert(Platform::Linkedin, profile("https://www.linkedin.com/company/insights/posts"));

    let scraper = Arc::new(ScriptedScraper::default());
    scraper.set(Platform::X, "https://x.com/insights/status/1");
    let notifier = Arc::new(RecordingNotifier::default());

    let herald = Herald::with_backends(config, scraper.clone(), Arc::new(NoTitles))
        .unwrap()
        .with_notifier(notifier.clone());

    Pipeline {
        _dir: dir,
        server,
        scraper,
        notifier,
        herald,
    }
}

#[tokio::test]
async fn test_cycles_announce_each_link_once() -> anyhow::Result<()> {
    let p = pipeline().await;
    let scheduler = p.herald.scheduler().await?;

    let first = scheduler.run_cycle_now().await.expect("cycle should run");
    assert_eq!(first.events.len(), 2);
    assert_eq!(
        p.notifier.links(),
        vec!["https://blog.example/2".to_string(), "https://x.com/insights/status/1".to_string()]
    );

    // X and LinkedIn were scraped together.
    assert_eq!(p.scraper.batch_count(), 1);
    let batch = p.scraper.batches.lock().unwrap()[0].clone();
    assert_eq!(batch.iter().map(|t| t.platform).collect::<Vec<_>>(), vec![Platform::X, Platform::Linkedin]);

    let second = scheduler.run_cycle_now().await.expect("cycle should run");
    assert!(second.events.is_empty());
    assert_eq!(p.notifier.links().len(), 2);

    let history = p.herald.history().snapshot().await?;
    assert_eq!(history[&Platform::Blogger], "https://blog.example/2");
    assert_eq!(history[&Platform::X], "https://x.com/insights/status/1");
    assert!(!history.contains_key(&Platform::Linkedin));
    Ok(())
}

#[tokio::test]
async fn test_new_feed_entry_is_announced() -> anyhow::Result<()> {
    let p = pipeline().await;
    let scheduler = p.herald.scheduler().await?;
    scheduler.run_cycle_now().await;

    p.server.reset().await;
    mount_blog(&p.server, &[("Brand new", "https://blog.example/3"), ("Newest", "https://blog.example/2")]).await;

    let report = scheduler.run_cycle_now().await.expect("cycle should run");
    assert_eq!(report.events.len(), 1);
    assert_eq!(report.events[0].platform, Platform::Blogger);
    assert_eq!(report.events[0].title, "Brand new");
    assert_eq!(
        p.herald.history().last_announced(Platform::Blogger).await?.as_deref(),
        Some("https://blog.example/3")
    );
    Ok(())
}

#[tokio::test]
async fn test_feed_outage_degrades_one_platform() -> anyhow::Result<()> {
    let p = pipeline().await;
    p.server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&p.server)
        .await;

    let scheduler = p.herald.scheduler().await?;
    let report = scheduler.run_cycle_now().await.expect("cycle should run");

    assert_eq!(p.notifier.links(), vec!["https://x.com/insights/status/1".to_string()]);
    assert!(report.unavailable >= 1);
    assert!(p.herald.history().last_announced(Platform::Blogger).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_override_supersedes_scrape() -> anyhow::Result<()> {
    let p = pipeline().await;
    let scheduler = p.herald.scheduler().await?;
    scheduler.run_cycle_now().await;

    p.herald.set_latest(Platform::X, "https://x.com/insights/status/99").await?;
    let report = scheduler.run_cycle_now().await.expect("cycle should run");

    assert_eq!(report.events.len(), 1);
    assert_eq!(report.events[0].link, "https://x.com/insights/status/99");
    assert_eq!(report.events[0].title, "Latest X Post");

    // Overridden platforms are no longer scraped.
    let last_batch = p.scraper.batches.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last_batch.iter().map(|t| t.platform).collect::<Vec<_>>(), vec![Platform::Linkedin]);

    assert!(p.herald.clear_latest(Platform::X).await?);
    let report = scheduler.run_cycle_now().await.expect("cycle should run");
    assert_eq!(report.events[0].link, "https://x.com/insights/status/1");
    Ok(())
}

#[tokio::test]
async fn test_detected_link_becomes_override() -> anyhow::Result<()> {
    let p = pipeline().await;

    let detected = p
        .herald
        .detect("we just posted https://www.linkedin.com/feed/update/urn:li:activity:1 check it out")
        .await?;
    let (platform, entry) = detected.expect("link should be detected");
    assert_eq!(platform, Platform::Linkedin);

    let resolved = p.herald.latest(Platform::Linkedin).await.expect("override resolves");
    assert_eq!(resolved.link, entry.link);

    assert!(p.herald.detect("no links here").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_seed_suppresses_existing_posts() -> anyhow::Result<()> {
    let p = pipeline().await;

    let outcomes = p.herald.seed().await?;
    let recorded: Vec<_> = outcomes
        .iter()
        .filter(|(_, outcome)| *outcome == SeedOutcome::Recorded)
        .map(|(platform, _)| *platform)
        .collect();
    assert_eq!(recorded, vec![Platform::Blogger, Platform::X]);

    let scheduler = p.herald.scheduler().await?;
    let report = scheduler.run_cycle_now().await.expect("cycle should run");
    assert!(report.events.is_empty());
    assert!(p.notifier.links().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_latest_does_not_touch_history() -> anyhow::Result<()> {
    let p = pipeline().await;

    let all = p.herald.latest_all().await;
    assert_eq!(all.len(), Platform::ALL.len());
    assert!(all.iter().any(|(platform, post)| *platform == Platform::Blogger && post.is_some()));

    assert!(p.herald.history().snapshot().await?.is_empty());
    Ok(())
}
