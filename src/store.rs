//! Durable per-platform state: the manual override document and the
//! announcement history. Both are small JSON objects keyed by platform id and
//! are always rewritten whole after merging a single key.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::models::{ManualOverride, Platform};
use crate::utils::error::{AppError, Result};

/// A JSON object on disk whose values are `V`, keyed by platform id.
///
/// Every read goes to disk so writes made by other processes (the admin CLI)
/// are merged rather than clobbered. Unknown keys are carried through
/// untouched.
pub struct JsonDocument<V> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> V>,
}

impl<V> JsonDocument<V>
where
    V: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_error(&self, message: impl std::fmt::Display) -> AppError {
        AppError::Persistence {
            path: self.path.display().to_string(),
            message: message.to_string(),
        }
    }

    async fn read_raw(&self) -> Result<Map<String, Value>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.persistence_error(e)),
        };

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(self.persistence_error("document is not a JSON object")),
            Err(e) => Err(self.persistence_error(e)),
        }
    }

    async fn write_raw(&self, map: Map<String, Value>) -> Result<()> {
        let path = self.path.clone();
        let json = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|e| self.persistence_error(e))?;

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir)?;

            // Write beside the target, then rename over it.
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(json.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| self.persistence_error(e))?
        .map_err(|e| self.persistence_error(e))
    }

    /// Read one platform's entry.
    pub async fn get(&self, platform: Platform) -> Result<Option<V>> {
        let map = self.read_raw().await?;
        match map.get(platform.id()) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| self.persistence_error(format!("entry {}: {}", platform, e))),
        }
    }

    /// All readable entries. Entries that do not decode as `V` are skipped.
    pub async fn snapshot(&self) -> Result<BTreeMap<Platform, V>> {
        let map = self.read_raw().await?;
        let mut out = BTreeMap::new();
        for platform in Platform::ALL {
            if let Some(value) = map.get(platform.id()) {
                match serde_json::from_value(value.clone()) {
                    Ok(entry) => {
                        out.insert(platform, entry);
                    }
                    Err(e) => {
                        tracing::warn!(%platform, path = %self.path.display(), "Skipping unreadable entry: {}", e);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Read-modify-write of a single key. `None` removes the key. Returns
    /// whether the document held the key before.
    pub async fn put(&self, platform: Platform, entry: Option<&V>) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        // A malformed document fails here, so it is never overwritten.
        let mut map = self.read_raw().await?;
        let existed = match entry {
            Some(entry) => {
                let value = serde_json::to_value(entry).map_err(|e| self.persistence_error(e))?;
                map.insert(platform.id().to_string(), value).is_some()
            }
            None => map.remove(platform.id()).is_some(),
        };

        self.write_raw(map).await?;
        Ok(existed)
    }
}

/// `{platform -> lastAnnouncedLink}`. Written only by the announcer.
pub struct HistoryStore {
    doc: JsonDocument<String>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            doc: JsonDocument::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.doc.path()
    }

    pub async fn last_announced(&self, platform: Platform) -> Result<Option<String>> {
        self.doc.get(platform).await
    }

    pub async fn record(&self, platform: Platform, link: &str) -> Result<()> {
        self.doc.put(platform, Some(&link.to_string())).await?;
        tracing::debug!(%platform, link, "Recorded announced link");
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<BTreeMap<Platform, String>> {
        self.doc.snapshot().await
    }
}

/// `{platform -> {link, date}}`. Written by the administrative surface only;
/// the pipeline reads it.
pub struct OverrideStore {
    doc: JsonDocument<ManualOverride>,
}

impl OverrideStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            doc: JsonDocument::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.doc.path()
    }

    pub async fn get(&self, platform: Platform) -> Result<Option<ManualOverride>> {
        let entry = self.doc.get(platform).await?;
        Ok(entry.filter(|o| !o.link.trim().is_empty()))
    }

    pub async fn set(&self, platform: Platform, link: &str) -> Result<ManualOverride> {
        let link = link.trim();
        if link.is_empty() {
            return Err(AppError::Validation("Override link must not be empty".to_string()));
        }
        let entry = ManualOverride::new(link);
        self.doc.put(platform, Some(&entry)).await?;
        tracing::info!(%platform, link, "Manual override set");
        Ok(entry)
    }

    pub async fn clear(&self, platform: Platform) -> Result<bool> {
        let existed = self.doc.put(platform, None).await?;
        if existed {
            tracing::info!(%platform, "Manual override cleared");
        }
        Ok(existed)
    }

    pub async fn snapshot(&self) -> Result<BTreeMap<Platform, ManualOverride>> {
        self.doc.snapshot().await
    }
}
