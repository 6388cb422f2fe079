use super::*;
use post_herald::store::{HistoryStore, OverrideStore};
use std::sync::Arc;

#[tokio::test]
async fn test_admin_and_pipeline_writers_do_not_clobber() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("latest_posts.json");

    // Two handles on one file, as the CLI and the running service would hold.
    let service = Arc::new(OverrideStore::new(&path));
    let admin = Arc::new(OverrideStore::new(&path));

    service.set(Platform::X, "https://x.com/a/status/1").await?;
    admin.set(Platform::Instagram, "https://www.instagram.com/p/C1/").await?;
    service.set(Platform::Threads, "https://www.threads.net/@a/post/1").await?;

    let snapshot = admin.snapshot().await?;
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[&Platform::Instagram].link, "https://www.instagram.com/p/C1/");
    Ok(())
}

#[tokio::test]
async fn test_reads_documents_written_by_older_deployments() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let overrides_path = dir.path().join("latest_posts.json");
    let history_path = dir.path().join("posted_history.json");

    std::fs::write(
        &overrides_path,
        r#"{"linkedin":{"link":"https://www.linkedin.com/posts/a","date":"2024-05-01T10:00:00.000Z","manual":true}}"#,
    )?;
    std::fs::write(&history_path, r#"{"youtube":"https://youtu.be/a","x":"https://x.com/a/status/1"}"#)?;

    let overrides = OverrideStore::new(&overrides_path);
    let entry = overrides.get(Platform::Linkedin).await?.expect("legacy override");
    assert_eq!(entry.link, "https://www.linkedin.com/posts/a");

    let history = HistoryStore::new(&history_path);
    assert_eq!(history.last_announced(Platform::X).await?.as_deref(), Some("https://x.com/a/status/1"));
    assert_eq!(history.snapshot().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_store_creates_missing_data_directory() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let history = HistoryStore::new(dir.path().join("nested").join("data").join("posted_history.json"));

    history.record(Platform::Bluesky, "https://bsky.app/profile/a/post/1").await?;
    tokio_test::assert_ok!(history.last_announced(Platform::Bluesky).await);
    assert!(history.path().exists());
    Ok(())
}

#[tokio::test]
async fn test_empty_override_link_is_ignored() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("latest_posts.json");
    std::fs::write(&path, r#"{"x":{"link":"","date":"2024-05-01T10:00:00Z"}}"#)?;

    let overrides = OverrideStore::new(&path);
    assert!(overrides.get(Platform::X).await?.is_none());
    Ok(())
}
