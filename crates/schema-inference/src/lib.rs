//! Schema Inference - recursive type inference and diffing for JSON samples.
//!
//! Feed arbitrary JSON samples to a [`SchemaAnalyzer`] and get back a
//! [`SchemaGraph`]: one node per inferred type (scalars, objects, arrays,
//! unions), annotated with sample counts, optionality and value-level
//! constraints detected by the [`PatternDetector`].
//!
//! # Features
//!
//! - **Recursive inference**: nested objects, pooled array items, unions
//! - **Pattern detection**: formats, numeric ranges, generalized shapes
//! - **Deduplication**: isomorphic shapes resolve to one node
//! - **Diffing**: compatible / partial / breaking verdicts
//! - **Export**: Mermaid diagrams and JSON Schema documents
//!
//! # Example
//!
//! ```ignore
//! use schema_inference::{AnalyzerConfig, SchemaAnalyzer, to_json_schema};
//! use serde_json::json;
//!
//! let mut analyzer = SchemaAnalyzer::new(AnalyzerConfig::default());
//! let root = analyzer.analyze(&json!([{"id": 1}, {"id": 2, "tag": "x"}]));
//! let schema = to_json_schema(analyzer.graph(), &root)?;
//! ```

mod analyzer;
mod comparator;
mod errors;
mod graph;
mod json_schema;
mod node;
mod pattern_detector;
mod signature;
mod visualizer;

pub use analyzer::SchemaAnalyzer;
pub use comparator::{
    Compatibility, NodeChange, NodeModification, SchemaComparator, SchemaDiff,
};
pub use errors::{SchemaError, SchemaResult};
pub use graph::SchemaGraph;
pub use json_schema::{JsonSchema, JsonSchemaType, to_json_schema};
pub use node::{
    NodeDraft, NodeId, NodeKind, NodeMetadata, ScalarType, SchemaNode,
    SchemaType, TypeConstraints,
};
pub use pattern_detector::{
    PatternDetector, detect_constraints, format_names, format_regex, generalize,
};
pub use signature::SchemaSignature;
pub use visualizer::{
    VisualEdge, VisualGraph, VisualNode, calculate_node_complexity, to_mermaid,
    visualize,
};

pub use schema_config::{AnalyzerConfig, PatternConfig};
