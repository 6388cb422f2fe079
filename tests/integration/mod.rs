// Integration tests for Post Herald
// These tests wire the real stores, feed and API drivers against local mock
// servers, with a scripted scrape backend in place of Chrome.

pub mod pipeline_tests;
pub mod sources_tests;
pub mod store_tests;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tempfile::TempDir;

use post_herald::config::{ApiConfig, SourceConfig, StorageConfig};
use post_herald::models::{AnnouncementEvent, Platform, ResolvedPost, ScrapeTask};
use post_herald::plugins::traits::{AnnouncementNotifier, TitleFetcher};
use post_herald::session::ScrapeBackend;
use post_herald::AppConfig;

/// Test configuration with storage in `dir` and every endpoint on `server`.
pub fn get_test_config(dir: &TempDir, server: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage = StorageConfig {
        data_dir: dir.path().display().to_string(),
        ..Default::default()
    };
    config.http.request_timeout = 5;
    config.http.title_timeout = 2;
    config.api = ApiConfig {
        bluesky_base_url: server.to_string(),
        twitter_base_url: server.to_string(),
        graph_base_url: server.to_string(),
    };
    config.scheduler.run_on_start = false;
    config.sources = BTreeMap::new();
    config
}

pub fn profile(url: impl Into<String>) -> SourceConfig {
    SourceConfig {
        profile_url: Some(url.into()),
        ..Default::default()
    }
}

/// Scrape backend that answers from a link table and records every batch.
#[derive(Default)]
pub struct ScriptedScraper {
    pub links: Mutex<BTreeMap<Platform, String>>,
    pub batches: Mutex<Vec<Vec<ScrapeTask>>>,
}

impl ScriptedScraper {
    pub fn set(&self, platform: Platform, link: &str) {
        self.links.lock().unwrap().insert(platform, link.to_string());
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

#[async_trait]
impl ScrapeBackend for ScriptedScraper {
    async fn scrape_batch(&self, tasks: Vec<ScrapeTask>) -> Vec<Option<ResolvedPost>> {
        let links = self.links.lock().unwrap().clone();
        let results = tasks
            .iter()
            .map(|task| {
                links
                    .get(&task.platform)
                    .map(|link| ResolvedPost::new(task.platform, "", link.clone(), None))
            })
            .collect();
        self.batches.lock().unwrap().push(tasks);
        results
    }
}

/// Title lookups that never succeed.
pub struct NoTitles;

#[async_trait]
impl TitleFetcher for NoTitles {
    async fn fetch_title(&self, _url: &str) -> post_herald::Result<Option<String>> {
        Ok(None)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<AnnouncementEvent>>,
}

impl RecordingNotifier {
    pub fn links(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|e| e.link.clone()).collect()
    }
}

#[async_trait]
impl AnnouncementNotifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, event: &AnnouncementEvent) -> post_herald::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub fn rss(items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, link)| {
            format!(
                "<item><title>{}</title><link>{}</link><pubDate>Wed, 01 May 2024 10:00:00 +0000</pubDate></item>",
                title, link
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>t</title><link>https://example.com</link><description>d</description>{}</channel></rss>"#,
        items
    )
}
