use super::GraphStore;
use super::StoreResult;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Process-local store; contents are lost on drop.
#[derive(Default)]
pub struct MemGraphStore {
    map: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for MemGraphStore {
    async fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self.map.read().await;
        Ok(map.get(key).cloned())
    }

    async fn put_raw(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let mut map = self.map.write().await;
        map.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.map.write().await;
        Ok(map.remove(key).is_some())
    }

    async fn list(&self) -> StoreResult<Vec<String>> {
        Ok(self.map.read().await.keys().cloned().collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
