//! JSON Schema export functionality.
//!
//! Converts an inferred graph, starting at a root node, into a draft 2020-12
//! JSON Schema document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{SchemaError, SchemaResult};
use crate::graph::SchemaGraph;
use crate::node::{NodeId, NodeKind, ScalarType, TypeConstraints};
use crate::pattern_detector::format_regex;

const MAX_DEPTH: usize = 32;

/// Subset of JSON Schema covering what inference can produce.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JsonSchema {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema_uri: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<JsonSchemaType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, JsonSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<JsonSchema>>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// JSON Schema type values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JsonSchemaType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonSchema {
    /// Create a new JSON Schema with the standard schema URI.
    pub fn new() -> Self {
        Self {
            schema_uri: Some(
                "https://json-schema.org/draft/2020-12/schema".to_string(),
            ),
            ..Default::default()
        }
    }

    /// Create a type-only schema.
    pub fn typed(t: JsonSchemaType) -> Self {
        Self {
            schema_type: Some(t),
            ..Default::default()
        }
    }

    pub fn to_value(&self) -> SchemaResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Export the subtree rooted at `root`.
pub fn to_json_schema(graph: &SchemaGraph, root: &NodeId) -> SchemaResult<JsonSchema> {
    let mut js = convert_node(graph, root, 0)?;
    js.schema_uri = JsonSchema::new().schema_uri;
    Ok(js)
}

fn convert_node(
    graph: &SchemaGraph,
    id: &NodeId,
    depth: usize,
) -> SchemaResult<JsonSchema> {
    if depth > MAX_DEPTH {
        return Ok(JsonSchema {
            description: Some("(depth limit reached)".to_string()),
            ..Default::default()
        });
    }

    let node = graph
        .get_node(id)
        .ok_or_else(|| SchemaError::MissingNode(id.clone()))?;

    match &node.kind {
        NodeKind::Scalar { scalar_type, .. } => {
            Ok(convert_scalar(*scalar_type, node.constraints.as_ref()))
        }

        NodeKind::Object { properties } => {
            let mut js = JsonSchema::typed(JsonSchemaType::Object);
            let mut props = IndexMap::with_capacity(properties.len());
            let mut required = Vec::new();
            for (name, child) in properties {
                let child_node = graph
                    .get_node(child)
                    .ok_or_else(|| SchemaError::MissingNode(child.clone()))?;
                if !child_node.optional {
                    required.push(name.clone());
                }
                props.insert(name.clone(), convert_node(graph, child, depth + 1)?);
            }
            js.properties = Some(props);
            if !required.is_empty() {
                js.required = Some(required);
            }
            Ok(js)
        }

        NodeKind::Array { item_type } => {
            let mut js = JsonSchema::typed(JsonSchemaType::Array);
            js.items = Some(Box::new(convert_node(graph, item_type, depth + 1)?));
            Ok(js)
        }

        NodeKind::Union { types } => {
            if types.len() < 2 {
                return Err(SchemaError::UnionArity {
                    id: id.clone(),
                    members: types.len(),
                });
            }
            let one_of = types
                .iter()
                .map(|member| convert_node(graph, member, depth + 1))
                .collect::<SchemaResult<Vec<_>>>()?;
            Ok(JsonSchema {
                one_of: Some(one_of),
                ..Default::default()
            })
        }
    }
}

fn convert_scalar(
    scalar_type: ScalarType,
    constraints: Option<&TypeConstraints>,
) -> JsonSchema {
    let integer = constraints.and_then(|c| c.is_integer).unwrap_or(false);
    let mut js = match scalar_type {
        ScalarType::String => JsonSchema::typed(JsonSchemaType::String),
        ScalarType::Number if integer => JsonSchema::typed(JsonSchemaType::Integer),
        ScalarType::Number => JsonSchema::typed(JsonSchemaType::Number),
        ScalarType::Boolean => JsonSchema::typed(JsonSchemaType::Boolean),
        ScalarType::Null => JsonSchema::typed(JsonSchemaType::Null),
        // no samples, nothing to constrain
        ScalarType::Undefined => return JsonSchema::default(),
    };

    let Some(c) = constraints else {
        return js;
    };

    if let Some(format) = c.format.as_deref() {
        match format {
            "email" => js.format = Some("email".to_string()),
            "url" => js.format = Some("uri".to_string()),
            "uuid" => js.format = Some("uuid".to_string()),
            "date_iso" => js.format = Some("date".to_string()),
            "timestamp" => js.format = Some("date-time".to_string()),
            other => {
                js.pattern = format_regex(other).map(|re| re.as_str().to_string());
                js.description = Some(format!("format: {other}"));
            }
        }
    }

    js.min_length = c.min_length;
    js.max_length = c.max_length;
    js.minimum = c.minimum;
    js.maximum = c.maximum;
    js.multiple_of = c.multiple_of;
    js.enum_values = c
        .enum_values
        .as_ref()
        .map(|values| values.iter().cloned().map(Value::String).collect());
    js
}
