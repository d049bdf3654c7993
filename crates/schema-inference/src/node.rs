//! Schema node data model.
//!
//! A graph node is a [`SchemaNode`]: the fields every node carries (sample
//! count, optionality, constraints, metadata) plus a [`NodeKind`] holding the
//! variant-specific payload. Composite kinds refer to other nodes by
//! [`NodeId`]; the graph owns every node.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a node inside a [`SchemaGraph`](crate::SchemaGraph).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId(value)
    }
}

/// Type tag of a node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Boolean,
    Null,
    Undefined,
    Object,
    Array,
    Union,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Null => "null",
            SchemaType::Undefined => "undefined",
            SchemaType::Object => "object",
            SchemaType::Array => "array",
            SchemaType::Union => "union",
        }
    }

    /// Runtime kind of a JSON value. Never returns `Union` or `Undefined`.
    pub fn of(value: &Value) -> SchemaType {
        match value {
            Value::Null => SchemaType::Null,
            Value::Bool(_) => SchemaType::Boolean,
            Value::Number(_) => SchemaType::Number,
            Value::String(_) => SchemaType::String,
            Value::Array(_) => SchemaType::Array,
            Value::Object(_) => SchemaType::Object,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Number,
    Boolean,
    Null,
    Undefined,
}

impl ScalarType {
    /// Scalar counterpart of a type tag, if it has one.
    pub fn from_schema_type(t: SchemaType) -> Option<ScalarType> {
        match t {
            SchemaType::String => Some(ScalarType::String),
            SchemaType::Number => Some(ScalarType::Number),
            SchemaType::Boolean => Some(ScalarType::Boolean),
            SchemaType::Null => Some(ScalarType::Null),
            SchemaType::Undefined => Some(ScalarType::Undefined),
            SchemaType::Object | SchemaType::Array | SchemaType::Union => None,
        }
    }
}

impl From<ScalarType> for SchemaType {
    fn from(value: ScalarType) -> Self {
        match value {
            ScalarType::String => SchemaType::String,
            ScalarType::Number => SchemaType::Number,
            ScalarType::Boolean => SchemaType::Boolean,
            ScalarType::Null => SchemaType::Null,
            ScalarType::Undefined => SchemaType::Undefined,
        }
    }
}

/// Value-level constraints detected on scalar samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TypeConstraints {
    /// Recognized named format (`email`, `url`, `uuid`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_integer: Option<bool>,

    /// GCD of integer samples, only when greater than 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_sequential: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<usize>,

    /// Distinct values of a low-cardinality string field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,

    /// Generalized shape (`Aa9` abstraction) to occurrence count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_patterns: Option<BTreeMap<String, usize>>,
}

impl TypeConstraints {
    pub fn is_empty(&self) -> bool {
        self.populated() == 0
    }

    /// Number of populated constraint fields.
    pub fn populated(&self) -> usize {
        [
            self.format.is_some(),
            self.min_length.is_some(),
            self.max_length.is_some(),
            self.minimum.is_some(),
            self.maximum.is_some(),
            self.is_integer.is_some(),
            self.multiple_of.is_some(),
            self.is_sequential.is_some(),
            self.min_properties.is_some(),
            self.max_properties.is_some(),
            self.enum_values.is_some(),
            self.custom_patterns.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    /// Widen `self` so it admits every value either side admits.
    ///
    /// Joining a set with itself leaves it unchanged. Enum values survive
    /// only when both sides list them; shape counts keep the larger count
    /// per shape.
    pub fn join(&mut self, other: &TypeConstraints) {
        let divisor = gcd(self.divisor_base(), other.divisor_base());

        if self.format != other.format {
            self.format = None;
        }
        self.min_length = join_with(self.min_length, other.min_length, usize::min);
        self.max_length = join_with(self.max_length, other.max_length, usize::max);
        self.minimum = join_with(self.minimum, other.minimum, f64::min);
        self.maximum = join_with(self.maximum, other.maximum, f64::max);
        self.is_integer = join_with(self.is_integer, other.is_integer, |a, b| a && b);
        self.multiple_of = (self.is_integer == Some(true) && divisor > 1)
            .then_some(divisor);
        self.is_sequential =
            join_with(self.is_sequential, other.is_sequential, |a, b| a && b);
        self.min_properties =
            join_with(self.min_properties, other.min_properties, usize::min);
        self.max_properties =
            join_with(self.max_properties, other.max_properties, usize::max);

        self.enum_values = match (self.enum_values.take(), &other.enum_values) {
            (Some(mut values), Some(more)) => {
                for value in more {
                    if !values.contains(value) {
                        values.push(value.clone());
                    }
                }
                Some(values)
            }
            _ => None,
        };

        if let Some(more) = &other.custom_patterns {
            let shapes = self.custom_patterns.get_or_insert_with(BTreeMap::new);
            for (shape, count) in more {
                let slot = shapes.entry(shape.clone()).or_default();
                *slot = (*slot).max(*count);
            }
        }
    }

    /// Divisor the samples are known to share: 0 for an all-zero set, 1 when
    /// nothing larger was detected.
    fn divisor_base(&self) -> u64 {
        match self.multiple_of {
            Some(d) => d,
            None if self.minimum == Some(0.0) && self.maximum == Some(0.0) => 0,
            None => 1,
        }
    }

    /// Populated constraints keyed by their serialized name.
    pub fn entries(&self) -> BTreeMap<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        }
    }
}

fn join_with<T>(a: Option<T>, b: Option<T>, f: impl FnOnce(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        _ => None,
    }
}

pub(crate) fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Timestamps and scores attached to every node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Share of the parent sample set this node was inferred from.
    pub frequency: f64,
    /// Grows with the number of samples: `samples / (samples + 1)`.
    pub confidence: f64,
}

impl NodeMetadata {
    pub(crate) fn stamped(samples: usize, frequency: f64) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            last_updated: now,
            frequency,
            confidence: Self::confidence_for(samples),
        }
    }

    pub(crate) fn confidence_for(samples: usize) -> f64 {
        let n = samples as f64;
        n / (n + 1.0)
    }
}

/// Variant payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Scalar {
        scalar_type: ScalarType,
        /// First raw values observed
        examples: Vec<Value>,
    },
    Object {
        properties: IndexMap<String, NodeId>,
    },
    Array {
        item_type: NodeId,
    },
    Union {
        types: Vec<NodeId>,
    },
}

impl NodeKind {
    pub fn schema_type(&self) -> SchemaType {
        match self {
            NodeKind::Scalar { scalar_type, .. } => (*scalar_type).into(),
            NodeKind::Object { .. } => SchemaType::Object,
            NodeKind::Array { .. } => SchemaType::Array,
            NodeKind::Union { .. } => SchemaType::Union,
        }
    }

    /// Referenced node ids, in declaration order.
    pub fn children(&self) -> Vec<&NodeId> {
        match self {
            NodeKind::Scalar { .. } => Vec::new(),
            NodeKind::Object { properties } => properties.values().collect(),
            NodeKind::Array { item_type } => vec![item_type],
            NodeKind::Union { types } => types.iter().collect(),
        }
    }
}

/// A node stored in a schema graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub id: NodeId,
    pub samples: usize,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<TypeConstraints>,
    pub metadata: NodeMetadata,
    pub kind: NodeKind,
}

impl SchemaNode {
    pub fn schema_type(&self) -> SchemaType {
        self.kind.schema_type()
    }

    pub fn children(&self) -> Vec<&NodeId> {
        self.kind.children()
    }

    pub fn properties(&self) -> Option<&IndexMap<String, NodeId>> {
        match &self.kind {
            NodeKind::Object { properties } => Some(properties),
            _ => None,
        }
    }

    pub fn examples(&self) -> &[Value] {
        match &self.kind {
            NodeKind::Scalar { examples, .. } => examples,
            _ => &[],
        }
    }
}

/// A node before the graph assigns it an id and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDraft {
    pub samples: usize,
    pub optional: bool,
    pub constraints: Option<TypeConstraints>,
    pub frequency: f64,
    pub kind: NodeKind,
}

impl NodeDraft {
    pub fn new(kind: NodeKind, samples: usize) -> Self {
        Self {
            samples,
            optional: false,
            constraints: None,
            frequency: 1.0,
            kind,
        }
    }

    pub fn scalar(
        scalar_type: ScalarType,
        samples: usize,
        examples: Vec<Value>,
    ) -> Self {
        Self::new(
            NodeKind::Scalar {
                scalar_type,
                examples,
            },
            samples,
        )
    }

    pub fn object(properties: IndexMap<String, NodeId>, samples: usize) -> Self {
        Self::new(NodeKind::Object { properties }, samples)
    }

    pub fn array(item_type: NodeId, samples: usize) -> Self {
        Self::new(NodeKind::Array { item_type }, samples)
    }

    pub fn union(types: Vec<NodeId>, samples: usize) -> Self {
        Self::new(NodeKind::Union { types }, samples)
    }

    /// Attach constraints; empty constraint sets are dropped.
    pub fn with_constraints(mut self, constraints: TypeConstraints) -> Self {
        self.constraints = (!constraints.is_empty()).then_some(constraints);
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn schema_type(&self) -> SchemaType {
        self.kind.schema_type()
    }
}
