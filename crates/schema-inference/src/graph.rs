//! Node storage for inferred schemas.
//!
//! Nodes are kept in insertion order and addressed by generated ids of the
//! form `{type}_{n}`, or `{namespace}:{type}_{n}` for namespaced graphs.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::errors::SchemaResult;
use crate::node::{
    NodeDraft, NodeId, NodeKind, NodeMetadata, SchemaNode, TypeConstraints,
};
use crate::signature::SchemaSignature;

/// Owns every node of one inferred schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "GraphSnapshot", into = "GraphSnapshot")]
pub struct SchemaGraph {
    namespace: Option<String>,
    counter: u64,
    nodes: IndexMap<NodeId, SchemaNode>,
}

/// Bookkeeping for one [`SchemaGraph::merge`] call.
struct MergeState {
    /// Signatures of nodes already in the target graph
    memo: HashMap<NodeId, SchemaSignature>,
    index: HashMap<SchemaSignature, NodeId>,
    mapping: HashMap<NodeId, NodeId>,
    visiting: HashSet<NodeId>,
}

/// Serialized form of a graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    counter: u64,
    nodes: Vec<SchemaNode>,
}

impl From<GraphSnapshot> for SchemaGraph {
    fn from(snapshot: GraphSnapshot) -> Self {
        let nodes = snapshot
            .nodes
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect();
        Self {
            namespace: snapshot.namespace,
            counter: snapshot.counter,
            nodes,
        }
    }
}

impl From<SchemaGraph> for GraphSnapshot {
    fn from(graph: SchemaGraph) -> Self {
        Self {
            namespace: graph.namespace,
            counter: graph.counter,
            nodes: graph.nodes.into_values().collect(),
        }
    }
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph whose ids are prefixed with `namespace:`.
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    /// Namespaced graph with a random 8-char prefix.
    pub fn scoped() -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self::with_namespace(&id[..8])
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Store a draft under a freshly generated id.
    pub fn add_node(&mut self, draft: NodeDraft) -> NodeId {
        let id = self.next_id(draft.schema_type().as_str());
        self.insert_with_id(id.clone(), draft);
        id
    }

    fn insert_with_id(&mut self, id: NodeId, draft: NodeDraft) {
        let node = SchemaNode {
            id: id.clone(),
            samples: draft.samples,
            optional: draft.optional,
            constraints: draft.constraints,
            metadata: NodeMetadata::stamped(draft.samples, draft.frequency),
            kind: draft.kind,
        };
        trace!(node = %id, "node added");
        self.nodes.insert(id, node);
    }

    /// Next `{type}_{n}` id not already present in the graph.
    fn next_id(&mut self, type_name: &str) -> NodeId {
        loop {
            self.counter += 1;
            let raw = match &self.namespace {
                Some(ns) => format!("{ns}:{type_name}_{}", self.counter),
                None => format!("{type_name}_{}", self.counter),
            };
            let id = NodeId::from(raw);
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn get_node(&self, id: &NodeId) -> Option<&SchemaNode> {
        self.nodes.get(id)
    }

    /// All nodes in insertion order.
    pub fn get_all_nodes(&self) -> impl Iterator<Item = &SchemaNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Replace a node in place. The stored id is kept and `last_updated` is
    /// re-stamped; unknown ids are ignored.
    pub fn update_node(&mut self, id: &NodeId, mut node: SchemaNode) {
        let Some(slot) = self.nodes.get_mut(id) else {
            debug!(node = %id, "update of unknown node ignored");
            return;
        };
        node.id = id.clone();
        node.metadata.last_updated = Utc::now();
        *slot = node;
    }

    /// Set the optional flag through [`update_node`](Self::update_node).
    pub fn set_optional(&mut self, id: &NodeId, optional: bool) {
        if let Some(node) = self.nodes.get(id)
            && node.optional != optional
        {
            let mut node = node.clone();
            node.optional = optional;
            self.update_node(id, node);
        }
    }

    /// Structural signature of a node, `None` when the id is unknown.
    pub fn signature(&self, id: &NodeId) -> Option<SchemaSignature> {
        let mut memo = HashMap::new();
        let mut visiting = HashSet::new();
        self.signature_memo(id, &mut memo, &mut visiting)
    }

    fn signature_memo(
        &self,
        id: &NodeId,
        memo: &mut HashMap<NodeId, SchemaSignature>,
        visiting: &mut HashSet<NodeId>,
    ) -> Option<SchemaSignature> {
        if let Some(sig) = memo.get(id) {
            return Some(*sig);
        }
        let node = self.nodes.get(id)?;
        // a reference back into the current path hashes as missing
        if !visiting.insert(id.clone()) {
            return None;
        }
        let sig = SchemaSignature::of_node(node, |child| {
            self.signature_memo(child, memo, visiting)
        });
        visiting.remove(id);
        memo.insert(id.clone(), sig);
        Some(sig)
    }

    /// Nodes no other node refers to, in insertion order.
    pub fn roots(&self) -> Vec<&NodeId> {
        let referenced: HashSet<&NodeId> = self
            .nodes
            .values()
            .flat_map(|node| node.children())
            .collect();
        self.nodes
            .keys()
            .filter(|id| !referenced.contains(id))
            .collect()
    }

    /// Fold `other` into this graph.
    ///
    /// Nodes are visited children first. A node structurally identical to
    /// one already here maps onto it and widens its constraints; any other
    /// node is inserted under its own id, or under a fresh id when that one
    /// is taken. Returns the mapping from every id of `other` to its id in
    /// `self`.
    pub fn merge(&mut self, other: &SchemaGraph) -> HashMap<NodeId, NodeId> {
        let mut memo = HashMap::new();
        let mut visiting = HashSet::new();
        let mut index: HashMap<SchemaSignature, NodeId> = HashMap::new();
        for id in self.nodes.keys() {
            if let Some(sig) = self.signature_memo(id, &mut memo, &mut visiting) {
                index.entry(sig).or_insert_with(|| id.clone());
            }
        }

        let before = self.len();
        let mut state = MergeState {
            memo,
            index,
            mapping: HashMap::new(),
            visiting: HashSet::new(),
        };
        for id in other.nodes.keys() {
            self.merge_node(other, id, &mut state);
        }

        debug!(
            incoming = other.len(),
            inserted = self.len() - before,
            total = self.len(),
            "graph merged"
        );
        state.mapping
    }

    fn merge_node(
        &mut self,
        other: &SchemaGraph,
        id: &NodeId,
        state: &mut MergeState,
    ) -> Option<NodeId> {
        if let Some(mapped) = state.mapping.get(id) {
            return Some(mapped.clone());
        }
        let node = other.nodes.get(id)?;
        if !state.visiting.insert(id.clone()) {
            return None;
        }

        for child in node.children() {
            self.merge_node(other, child, state);
        }

        let kind = rewrite_refs(&node.kind, &state.mapping);
        let sig = SchemaSignature::compute(
            node.optional,
            node.constraints.as_ref(),
            &kind,
            |child| state.memo.get(child).copied(),
        );

        let target = match state.index.get(&sig) {
            Some(existing) => {
                let existing = existing.clone();
                self.widen_constraints(&existing, node.constraints.as_ref());
                existing
            }
            None => {
                let target = if self.nodes.contains_key(id) {
                    self.next_id(node.schema_type().as_str())
                } else {
                    id.clone()
                };
                let mut copy = node.clone();
                copy.id = target.clone();
                copy.kind = kind;
                self.nodes.insert(target.clone(), copy);
                state.index.insert(sig, target.clone());
                state.memo.insert(target.clone(), sig);
                target
            }
        };

        state.visiting.remove(id);
        state.mapping.insert(id.clone(), target.clone());
        Some(target)
    }

    /// Join incoming constraints into a node, re-stamping it only when
    /// they widen it.
    fn widen_constraints(&mut self, id: &NodeId, incoming: Option<&TypeConstraints>) {
        let (Some(node), Some(incoming)) = (self.nodes.get(id), incoming) else {
            return;
        };
        let Some(current) = &node.constraints else {
            return;
        };
        let mut joined = current.clone();
        joined.join(incoming);
        if &joined != current {
            let mut node = node.clone();
            node.constraints = Some(joined);
            self.update_node(id, node);
        }
    }

    pub fn to_json(&self) -> SchemaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> SchemaResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn rewrite_refs(kind: &NodeKind, mapping: &HashMap<NodeId, NodeId>) -> NodeKind {
    let map = |id: &NodeId| mapping.get(id).cloned().unwrap_or_else(|| id.clone());
    match kind {
        NodeKind::Scalar { .. } => kind.clone(),
        NodeKind::Object { properties } => NodeKind::Object {
            properties: properties
                .iter()
                .map(|(key, id)| (key.clone(), map(id)))
                .collect(),
        },
        NodeKind::Array { item_type } => NodeKind::Array {
            item_type: map(item_type),
        },
        NodeKind::Union { types } => NodeKind::Union {
            types: types.iter().map(map).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ScalarType, SchemaType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn string_draft() -> NodeDraft {
        NodeDraft::scalar(ScalarType::String, 1, vec![json!("x")])
    }

    #[test]
    fn test_ids_follow_type_and_counter() {
        let mut g = SchemaGraph::new();
        let a = g.add_node(string_draft());
        let b = g.add_node(NodeDraft::scalar(ScalarType::Number, 2, vec![]));
        assert_eq!(a.as_str(), "string_1");
        assert_eq!(b.as_str(), "number_2");
        assert_eq!(g.len(), 2);

        let node = g.get_node(&b).unwrap();
        assert_eq!(node.schema_type(), SchemaType::Number);
        assert_eq!(node.metadata.created_at, node.metadata.last_updated);
    }

    #[test]
    fn test_namespaced_ids() {
        let mut g = SchemaGraph::with_namespace("v2");
        let id = g.add_node(string_draft());
        assert_eq!(id.as_str(), "v2:string_1");

        let scoped = SchemaGraph::scoped();
        assert_eq!(scoped.namespace().map(str::len), Some(8));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut g = SchemaGraph::new();
        let ids: Vec<NodeId> = (0..5).map(|_| g.add_node(string_draft())).collect();
        let listed: Vec<NodeId> = g.get_all_nodes().map(|n| n.id.clone()).collect();
        assert_eq!(ids, listed);
    }

    #[test]
    fn test_update_node_keeps_id_and_bumps_timestamp() {
        let mut g = SchemaGraph::new();
        let id = g.add_node(string_draft());
        let mut node = g.get_node(&id).unwrap().clone();
        let created = node.metadata.created_at;
        node.id = NodeId::from("ignored");
        node.samples = 42;
        g.update_node(&id, node);

        let stored = g.get_node(&id).unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.samples, 42);
        assert!(stored.metadata.last_updated >= created);
        assert!(!g.contains(&NodeId::from("ignored")));
    }

    #[test]
    fn test_update_unknown_node_is_noop() {
        let mut g = SchemaGraph::new();
        let id = g.add_node(string_draft());
        let node = g.get_node(&id).unwrap().clone();
        g.update_node(&NodeId::from("nope_9"), node);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_roots() {
        let mut g = SchemaGraph::new();
        let leaf = g.add_node(string_draft());
        let arr = g.add_node(NodeDraft::array(leaf.clone(), 1));
        assert_eq!(g.roots(), vec![&arr]);
    }

    #[test]
    fn test_signature_unknown_id() {
        let g = SchemaGraph::new();
        assert!(g.signature(&NodeId::from("string_1")).is_none());
    }

    #[test]
    fn test_merge_dedups_and_avoids_collisions() {
        let mut left = SchemaGraph::new();
        let s = left.add_node(string_draft());
        left.add_node(NodeDraft::array(s, 1));

        let mut right = SchemaGraph::new();
        let rs = right.add_node(string_draft());
        let rarr = right.add_node(NodeDraft::array(rs.clone(), 3));
        let rn = right.add_node(NodeDraft::scalar(ScalarType::Number, 1, vec![]));

        let mapping = left.merge(&right);

        // string_1 and array_2 already exist structurally
        assert_eq!(mapping[&rs].as_str(), "string_1");
        assert_eq!(mapping[&rarr].as_str(), "array_2");
        // number_3 is free in left and keeps its id
        assert_eq!(mapping[&rn].as_str(), "number_3");
        assert_eq!(left.len(), 3);

        // the next generated id skips the merged one
        let next =
            left.add_node(NodeDraft::scalar(ScalarType::Number, 1, vec![]));
        assert_eq!(next.as_str(), "number_4");
    }

    #[test]
    fn test_merge_rewrites_references_on_collision() {
        let mut left = SchemaGraph::new();
        // same id as the incoming leaf, different structure
        left.add_node(string_draft().with_optional(true));

        let mut right = SchemaGraph::new();
        let s = right.add_node(string_draft());
        let arr = right.add_node(NodeDraft::array(s.clone(), 1));

        let mapping = left.merge(&right);
        let new_leaf = &mapping[&s];
        assert_eq!(new_leaf.as_str(), "string_2");
        assert_eq!(mapping[&arr].as_str(), "array_2");

        let merged_arr = left.get_node(&mapping[&arr]).unwrap();
        assert_eq!(merged_arr.children(), vec![new_leaf]);
        assert!(left.get_node(new_leaf).is_some());
    }

    #[test]
    fn test_merge_widens_matched_constraints() {
        let bounds = |min: f64, max: f64| TypeConstraints {
            minimum: Some(min),
            maximum: Some(max),
            is_integer: Some(true),
            ..Default::default()
        };
        let number = |c| NodeDraft::scalar(ScalarType::Number, 1, vec![]).with_constraints(c);

        let mut left = SchemaGraph::new();
        let n = left.add_node(number(bounds(1.0, 1.0)));
        let mut right = SchemaGraph::new();
        let rn = right.add_node(number(bounds(5.0, 9.0)));

        let mapping = left.merge(&right);
        assert_eq!(mapping[&rn], n);
        let c = left.get_node(&n).unwrap().constraints.clone().unwrap();
        assert_eq!((c.minimum, c.maximum), (Some(1.0), Some(9.0)));

        // merging again changes nothing
        let snapshot = left.clone();
        left.merge(&right);
        assert_eq!(left, snapshot);
    }

    #[test]
    fn test_merge_deep_chain_onto_itself() {
        let mut g = SchemaGraph::new();
        let mut id = g.add_node(string_draft());
        for _ in 0..400 {
            id = g.add_node(NodeDraft::array(id, 1));
        }
        let mut merged = g.clone();
        let mapping = merged.merge(&g);
        assert_eq!(merged.len(), g.len());
        assert_eq!(mapping.len(), g.len());
        assert!(mapping.iter().all(|(from, to)| from == to));
    }

    #[test]
    fn test_json_round_trip() {
        let mut g = SchemaGraph::with_namespace("ns");
        let s = g.add_node(string_draft());
        g.add_node(NodeDraft::array(s, 1));

        let json = g.to_json().unwrap();
        let back = SchemaGraph::from_json(&json).unwrap();
        assert_eq!(back, g);

        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["counter"], json!(2));
        assert_eq!(v["nodes"].as_array().unwrap().len(), 2);
    }
}
