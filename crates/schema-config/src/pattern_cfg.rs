use serde::{Deserialize, Serialize};

/// Configuration for value-level pattern detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Fraction of string samples that must match a named format
    /// before it is reported. The comparison is strict (`ratio > threshold`).
    #[serde(default = "default_format_threshold")]
    pub format_threshold: f64,

    /// Detect enum-like string fields (low cardinality, repeated values).
    #[serde(default = "default_true")]
    pub enum_detection: bool,

    /// Maximum distinct values for a string field to be treated as an enum.
    #[serde(default = "default_enum_cardinality")]
    pub enum_max_cardinality: usize,

    /// Build the generalized shape frequency table for strings.
    #[serde(default = "default_true")]
    pub custom_patterns: bool,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            format_threshold: default_format_threshold(),
            enum_detection: true,
            enum_max_cardinality: default_enum_cardinality(),
            custom_patterns: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format_threshold() -> f64 {
    0.8
}

fn default_enum_cardinality() -> usize {
    10
}
