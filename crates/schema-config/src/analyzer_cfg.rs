//! Schema analyzer configuration.
//!
//! Controls how property optionality is decided, whether structurally
//! equivalent schemas are shared, and how deep inference recurses.

use serde::{Deserialize, Serialize};

/// Analyzer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Fraction of parent samples a property may be missing from before it
    /// is marked optional. `0.0` marks a property optional as soon as a
    /// single sample omits it; `0.1` marks it optional below 90% presence.
    #[serde(default = "default_optionality_threshold")]
    pub optionality_threshold: f64,

    /// Share one node between structurally equivalent schemas.
    #[serde(default = "default_true")]
    pub deduplicate: bool,

    /// Raw example values kept on scalar nodes.
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,

    /// Maximum nesting depth for object/array inference.
    /// Deeper structures are summarized without children.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            optionality_threshold: default_optionality_threshold(),
            deduplicate: true,
            max_examples: default_max_examples(),
            max_depth: default_max_depth(),
        }
    }
}

impl AnalyzerConfig {
    /// Any absence marks a property optional, no node sharing.
    pub fn strict() -> Self {
        Self {
            optionality_threshold: 0.0,
            deduplicate: false,
            ..Default::default()
        }
    }

    /// Decide optionality from presence counts.
    pub fn is_optional(&self, present: usize, total: usize) -> bool {
        if total == 0 || present >= total {
            return false;
        }
        let missing_ratio = (total - present) as f64 / total as f64;
        missing_ratio > self.optionality_threshold
    }
}

fn default_true() -> bool {
    true
}

fn default_optionality_threshold() -> f64 {
    0.1
}

fn default_max_examples() -> usize {
    5
}

fn default_max_depth() -> usize {
    64
}
