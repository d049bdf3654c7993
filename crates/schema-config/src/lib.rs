//! Configuration for schema inference.
//!
//! All types derive serde with per-field defaults, so an empty YAML document
//! is a valid configuration. Environment variables written as `${VAR}` are
//! expanded before parsing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::debug;

mod analyzer_cfg;
mod pattern_cfg;
mod storage_cfg;

pub use analyzer_cfg::AnalyzerConfig;
pub use pattern_cfg::PatternConfig;
pub use storage_cfg::StorageConfig;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Recursive inference settings
    pub analyzer: AnalyzerConfig,

    /// Leaf constraint detection settings
    pub patterns: PatternConfig,

    /// Graph persistence backend
    pub storage: StorageConfig,
}

/// Parse a configuration document from a YAML string.
pub fn load_from_str(raw: &str) -> Result<InferenceConfig> {
    let with_env = shellexpand::env(raw)
        .with_context(|| "expanding environment variables")?
        .to_string();
    if with_env.trim().is_empty() {
        return Ok(InferenceConfig::default());
    }
    let cfg: InferenceConfig =
        serde_yaml::from_str(&with_env).with_context(|| "parsing yaml")?;
    Ok(cfg)
}

/// Load a configuration document from a file.
pub fn load_from_path(file_path: &str) -> Result<InferenceConfig> {
    let raw = fs::read_to_string(file_path)
        .with_context(|| format!("reading config {file_path}"))?;
    let cfg = load_from_str(&raw)
        .with_context(|| format!("loading config {file_path}"))?;
    debug!(path = %file_path, storage = cfg.storage.kind(), "config loaded");
    Ok(cfg)
}

/// Load from an optional path, falling back to defaults.
pub fn load_or_default(file_path: Option<&str>) -> Result<InferenceConfig> {
    match file_path {
        Some(path) => load_from_path(path),
        None => Ok(InferenceConfig::default()),
    }
}
