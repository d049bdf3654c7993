use serde::{Deserialize, Serialize};

/// Where inferred graphs are persisted.
///
/// Only `memory` and `file` have backends; the remaining variants are
/// accepted so configs written for other deployments still parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    #[default]
    Memory,
    File { path: String },
    Redis { uri: String },
    Postgres { dsn: String },
    Custom { name: String },
}

impl StorageConfig {
    /// Backend name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            StorageConfig::Memory => "memory",
            StorageConfig::File { .. } => "file",
            StorageConfig::Redis { .. } => "redis",
            StorageConfig::Postgres { .. } => "postgres",
            StorageConfig::Custom { .. } => "custom",
        }
    }
}
