//! Provides persistence for inferred schema graphs

use std::sync::Arc;

use async_trait::async_trait;
use schema_config::StorageConfig;
use schema_inference::SchemaGraph;
use tracing::info;

mod errors;
mod file_store;
mod mem_store;

pub use errors::{StoreError, StoreResult};
pub use file_store::FileGraphStore;
pub use mem_store::MemGraphStore;

/// Graph storage trait.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Get raw graph bytes.
    async fn get_raw(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store raw graph bytes.
    async fn put_raw(&self, key: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Delete a stored graph, returning whether it existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// List all keys, sorted.
    async fn list(&self) -> StoreResult<Vec<String>>;

    /// Backend name, for logging.
    fn backend(&self) -> &'static str;
}

/// Extension trait for typed graph access.
#[async_trait]
pub trait GraphStoreExt: GraphStore {
    async fn get_graph(&self, key: &str) -> StoreResult<Option<SchemaGraph>> {
        match self.get_raw(key).await? {
            Some(buf) => Ok(Some(serde_json::from_slice(&buf)?)),
            None => Ok(None),
        }
    }

    async fn put_graph(&self, key: &str, graph: &SchemaGraph) -> StoreResult<()> {
        let buf = serde_json::to_vec(graph)?;
        self.put_raw(key, &buf).await
    }
}

impl<T: GraphStore + ?Sized> GraphStoreExt for T {}

/// Build the store selected by configuration.
pub fn build_store(cfg: &StorageConfig) -> StoreResult<Arc<dyn GraphStore>> {
    let store: Arc<dyn GraphStore> = match cfg {
        StorageConfig::Memory => Arc::new(MemGraphStore::new()),
        StorageConfig::File { path } => Arc::new(FileGraphStore::new(path)?),
        StorageConfig::Redis { .. }
        | StorageConfig::Postgres { .. }
        | StorageConfig::Custom { .. } => {
            return Err(StoreError::NotSupported(cfg.kind().to_string()));
        }
    };
    info!(backend = store.backend(), "graph store ready");
    Ok(store)
}
