use super::{GraphStore, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// All graphs in one JSON object file, keyed by name.
///
/// Entries are stored as JSON documents, so `put_raw` rejects bytes that do
/// not parse as JSON. Every write replaces the file through a temp file and
/// a rename.
pub struct FileGraphStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileGraphStore {
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            guard: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StoreResult<BTreeMap<String, Value>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(BTreeMap::new());
        }
        let bytes = tokio::fs::read(&self.path).await?;
        if bytes.is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(&self, map: &BTreeMap<String, Value>) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(map)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), entries = map.len(), "graph store saved");
        Ok(())
    }
}

#[async_trait]
impl GraphStore for FileGraphStore {
    async fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let _g = self.guard.lock().await;
        let mut map = self.load().await?;
        match map.remove(key) {
            Some(doc) => Ok(Some(serde_json::to_vec(&doc)?)),
            None => Ok(None),
        }
    }

    async fn put_raw(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let doc: Value = serde_json::from_slice(bytes)?;
        let _g = self.guard.lock().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), doc);
        self.save(&map).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let _g = self.guard.lock().await;
        let mut map = self.load().await?;
        let existed = map.remove(key).is_some();
        if existed {
            self.save(&map).await?;
        }
        Ok(existed)
    }

    async fn list(&self) -> StoreResult<Vec<String>> {
        let _g = self.guard.lock().await;
        let map = self.load().await?;
        Ok(map.keys().cloned().collect())
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}
