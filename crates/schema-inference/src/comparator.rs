//! Schema diffing.
//!
//! Two graphs are compared node by node, matched on id. That is only
//! meaningful when both graphs come from the same id lineage, e.g. a graph
//! and its continuation through [`SchemaAnalyzer::with_graph`].
//!
//! [`SchemaAnalyzer::with_graph`]: crate::SchemaAnalyzer::with_graph

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::SchemaGraph;
use crate::node::{NodeId, NodeKind, SchemaNode, SchemaType};

/// One difference between two versions of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum NodeChange {
    TypeChanged {
        before: SchemaType,
        after: SchemaType,
    },
    SamplesChanged {
        before: usize,
        after: usize,
    },
    OptionalityChanged {
        before: bool,
        after: bool,
    },
    PropertyAdded {
        name: String,
    },
    PropertyRemoved {
        name: String,
    },
    ItemTypeChanged {
        before: NodeId,
        after: NodeId,
    },
    UnionMemberAdded {
        id: NodeId,
    },
    UnionMemberRemoved {
        id: NodeId,
    },
    ConstraintChanged {
        name: String,
        before: Option<Value>,
        after: Option<Value>,
    },
}

impl NodeChange {
    /// Changes that can invalidate data accepted by the old schema.
    pub fn is_breaking(&self) -> bool {
        matches!(
            self,
            NodeChange::TypeChanged { .. }
                | NodeChange::OptionalityChanged { .. }
                | NodeChange::PropertyRemoved { .. }
        )
    }
}

fn show(value: &Option<Value>) -> String {
    value
        .as_ref()
        .map_or_else(|| "none".to_string(), Value::to_string)
}

impl fmt::Display for NodeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeChange::TypeChanged { before, after } => {
                write!(f, "type changed from {before} to {after}")
            }
            NodeChange::SamplesChanged { before, after } => {
                write!(f, "samples changed from {before} to {after}")
            }
            NodeChange::OptionalityChanged { before, after } => {
                write!(f, "optional changed from {before} to {after}")
            }
            NodeChange::PropertyAdded { name } => {
                write!(f, "property added: {name}")
            }
            NodeChange::PropertyRemoved { name } => {
                write!(f, "property removed: {name}")
            }
            NodeChange::ItemTypeChanged { before, after } => {
                write!(f, "item type changed from {before} to {after}")
            }
            NodeChange::UnionMemberAdded { id } => {
                write!(f, "union member added: {id}")
            }
            NodeChange::UnionMemberRemoved { id } => {
                write!(f, "union member removed: {id}")
            }
            NodeChange::ConstraintChanged {
                name,
                before,
                after,
            } => write!(
                f,
                "constraint {name} changed from {} to {}",
                show(before),
                show(after)
            ),
        }
    }
}

/// Overall verdict of a diff.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Compatibility {
    Compatible,
    Partial,
    Breaking,
}

impl fmt::Display for Compatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Compatibility::Compatible => "compatible",
            Compatibility::Partial => "partial",
            Compatibility::Breaking => "breaking",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeModification {
    pub before: SchemaNode,
    pub after: SchemaNode,
    pub changes: Vec<NodeChange>,
}

impl NodeModification {
    pub fn is_breaking(&self) -> bool {
        self.changes.iter().any(NodeChange::is_breaking)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub added: BTreeSet<NodeId>,
    pub removed: BTreeSet<NodeId>,
    pub modified: BTreeMap<NodeId, NodeModification>,
    pub compatibility: Compatibility,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaComparator;

impl SchemaComparator {
    pub fn new() -> Self {
        Self
    }

    pub fn compare(&self, before: &SchemaGraph, after: &SchemaGraph) -> SchemaDiff {
        let mut added = BTreeSet::new();
        let mut modified = BTreeMap::new();

        for node in after.get_all_nodes() {
            match before.get_node(&node.id) {
                None => {
                    added.insert(node.id.clone());
                }
                Some(old) => {
                    let changes = self.compare_nodes(old, node);
                    if !changes.is_empty() {
                        modified.insert(
                            node.id.clone(),
                            NodeModification {
                                before: old.clone(),
                                after: node.clone(),
                                changes,
                            },
                        );
                    }
                }
            }
        }

        let removed: BTreeSet<NodeId> = before
            .get_all_nodes()
            .filter(|node| !after.contains(&node.id))
            .map(|node| node.id.clone())
            .collect();

        let compatibility = classify(&added, &removed, &modified);
        SchemaDiff {
            added,
            removed,
            modified,
            compatibility,
        }
    }

    /// Differences between two versions of the same node.
    pub fn compare_nodes(
        &self,
        before: &SchemaNode,
        after: &SchemaNode,
    ) -> Vec<NodeChange> {
        let mut changes = Vec::new();

        if before.schema_type() != after.schema_type() {
            changes.push(NodeChange::TypeChanged {
                before: before.schema_type(),
                after: after.schema_type(),
            });
        }
        if before.samples != after.samples {
            changes.push(NodeChange::SamplesChanged {
                before: before.samples,
                after: after.samples,
            });
        }
        if before.optional != after.optional {
            changes.push(NodeChange::OptionalityChanged {
                before: before.optional,
                after: after.optional,
            });
        }

        match (&before.kind, &after.kind) {
            (
                NodeKind::Object { properties: old },
                NodeKind::Object { properties: new },
            ) => {
                for name in new.keys().filter(|k| !old.contains_key(*k)) {
                    changes.push(NodeChange::PropertyAdded { name: name.clone() });
                }
                for name in old.keys().filter(|k| !new.contains_key(*k)) {
                    changes.push(NodeChange::PropertyRemoved {
                        name: name.clone(),
                    });
                }
            }
            (
                NodeKind::Array { item_type: old },
                NodeKind::Array { item_type: new },
            ) if old != new => {
                changes.push(NodeChange::ItemTypeChanged {
                    before: old.clone(),
                    after: new.clone(),
                });
            }
            (NodeKind::Union { types: old }, NodeKind::Union { types: new }) => {
                for id in new.iter().filter(|id| !old.contains(*id)) {
                    changes.push(NodeChange::UnionMemberAdded { id: id.clone() });
                }
                for id in old.iter().filter(|id| !new.contains(*id)) {
                    changes.push(NodeChange::UnionMemberRemoved { id: id.clone() });
                }
            }
            _ => {}
        }

        let old_c = before.constraints.clone().unwrap_or_default().entries();
        let new_c = after.constraints.clone().unwrap_or_default().entries();
        let names: BTreeSet<&String> = old_c.keys().chain(new_c.keys()).collect();
        for name in names {
            let (a, b) = (old_c.get(name), new_c.get(name));
            if a != b {
                changes.push(NodeChange::ConstraintChanged {
                    name: name.clone(),
                    before: a.cloned(),
                    after: b.cloned(),
                });
            }
        }

        changes
    }
}

fn classify(
    added: &BTreeSet<NodeId>,
    removed: &BTreeSet<NodeId>,
    modified: &BTreeMap<NodeId, NodeModification>,
) -> Compatibility {
    if !removed.is_empty() || modified.values().any(NodeModification::is_breaking) {
        Compatibility::Breaking
    } else if !added.is_empty() || !modified.is_empty() {
        Compatibility::Partial
    } else {
        Compatibility::Compatible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeDraft, ScalarType, TypeConstraints};
    use indexmap::IndexMap;
    use serde_json::json;

    fn scalar(t: ScalarType, samples: usize) -> NodeDraft {
        NodeDraft::scalar(t, samples, vec![])
    }

    #[test]
    fn test_identical_graphs_are_compatible() {
        let mut g = SchemaGraph::new();
        g.add_node(scalar(ScalarType::String, 1));
        let diff = SchemaComparator::new().compare(&g, &g.clone());
        assert!(diff.is_empty());
        assert_eq!(diff.compatibility, Compatibility::Compatible);
    }

    #[test]
    fn test_additions_are_partial() {
        let mut before = SchemaGraph::new();
        before.add_node(scalar(ScalarType::String, 1));
        let mut after = before.clone();
        let id = after.add_node(scalar(ScalarType::Number, 1));

        let diff = SchemaComparator::new().compare(&before, &after);
        assert_eq!(diff.added, BTreeSet::from([id]));
        assert_eq!(diff.compatibility, Compatibility::Partial);
    }

    #[test]
    fn test_removal_is_breaking() {
        let mut before = SchemaGraph::new();
        before.add_node(scalar(ScalarType::String, 1));
        let after = SchemaGraph::new();

        let diff = SchemaComparator::new().compare(&before, &after);
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.compatibility, Compatibility::Breaking);
    }

    #[test]
    fn test_sample_count_change_is_partial() {
        let mut before = SchemaGraph::new();
        let id = before.add_node(scalar(ScalarType::String, 1));
        let mut after = before.clone();
        let mut node = after.get_node(&id).unwrap().clone();
        node.samples = 10;
        after.update_node(&id, node);

        let diff = SchemaComparator::new().compare(&before, &after);
        let m = &diff.modified[&id];
        assert_eq!(
            m.changes,
            vec![NodeChange::SamplesChanged {
                before: 1,
                after: 10
            }]
        );
        assert_eq!(diff.compatibility, Compatibility::Partial);
    }

    #[test]
    fn test_property_changes() {
        let mut before = SchemaGraph::new();
        let s = before.add_node(scalar(ScalarType::String, 1));
        let mut props = IndexMap::new();
        props.insert("name".to_string(), s.clone());
        let obj = before.add_node(NodeDraft::object(props, 1));

        let mut after = before.clone();
        let mut node = after.get_node(&obj).unwrap().clone();
        node.kind = NodeKind::Object {
            properties: IndexMap::from([("email".to_string(), s.clone())]),
        };
        after.update_node(&obj, node);

        let changes = &SchemaComparator::new().compare(&before, &after).modified[&obj]
            .changes;
        assert!(changes.contains(&NodeChange::PropertyAdded {
            name: "email".into()
        }));
        assert!(changes.contains(&NodeChange::PropertyRemoved {
            name: "name".into()
        }));
    }

    #[test]
    fn test_constraint_diff_and_display() {
        let mut before = SchemaGraph::new();
        let id = before.add_node(scalar(ScalarType::Number, 2).with_constraints(
            TypeConstraints {
                minimum: Some(1.0),
                ..Default::default()
            },
        ));
        let mut after = before.clone();
        let mut node = after.get_node(&id).unwrap().clone();
        node.constraints = Some(TypeConstraints {
            minimum: Some(0.0),
            is_integer: Some(true),
            ..Default::default()
        });
        after.update_node(&id, node);

        let diff = SchemaComparator::new().compare(&before, &after);
        let changes = &diff.modified[&id].changes;
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[0].to_string(),
            "constraint isInteger changed from none to true"
        );
        assert_eq!(
            changes[1],
            NodeChange::ConstraintChanged {
                name: "minimum".into(),
                before: Some(json!(1.0)),
                after: Some(json!(0.0)),
            }
        );
        assert_eq!(diff.compatibility, Compatibility::Partial);
    }

    #[test]
    fn test_breaking_kinds() {
        assert!(
            NodeChange::TypeChanged {
                before: SchemaType::String,
                after: SchemaType::Number
            }
            .is_breaking()
        );
        assert!(
            NodeChange::OptionalityChanged {
                before: true,
                after: false
            }
            .is_breaking()
        );
        assert!(!NodeChange::PropertyAdded { name: "x".into() }.is_breaking());
        assert!(
            !NodeChange::UnionMemberAdded {
                id: NodeId::from("null_3")
            }
            .is_breaking()
        );
    }

    #[test]
    fn test_compatibility_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(Compatibility::Breaking).unwrap(),
            json!("breaking")
        );
    }
}
