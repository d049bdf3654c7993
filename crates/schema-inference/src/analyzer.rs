//! Recursive schema inference over JSON samples.
//!
//! Samples are partitioned by runtime type; a single partition becomes one
//! node, several become a union. Objects recurse per property, arrays pool
//! their elements, scalars are handed to the [`PatternDetector`].
//!
//! With deduplication on, every finished node is interned by its
//! [`SchemaSignature`]: an isomorphic shape inferred twice resolves to the
//! node created the first time, which then accounts for both groups.

use std::collections::HashMap;

use indexmap::IndexMap;
use metrics::counter;
use serde_json::Value;
use tracing::{debug, trace};

use schema_config::{AnalyzerConfig, PatternConfig};

use crate::graph::SchemaGraph;
use crate::node::{
    NodeDraft, NodeId, NodeKind, NodeMetadata, ScalarType, SchemaType,
};
use crate::pattern_detector::PatternDetector;
use crate::signature::SchemaSignature;

/// Position of a sample group inside the structure being inferred.
#[derive(Debug, Clone, Copy)]
struct Ctx {
    depth: usize,
    /// Size of the sample set the group was drawn from
    parent_total: usize,
    optional: bool,
}

impl Ctx {
    fn root(total: usize) -> Self {
        Self {
            depth: 0,
            parent_total: total,
            optional: false,
        }
    }

    fn child(&self, parent_total: usize, optional: bool) -> Self {
        Self {
            depth: self.depth + 1,
            parent_total,
            optional,
        }
    }

    fn sibling(&self, parent_total: usize) -> Self {
        Self {
            parent_total,
            optional: false,
            ..*self
        }
    }
}

pub struct SchemaAnalyzer {
    config: AnalyzerConfig,
    detector: PatternDetector,
    graph: SchemaGraph,
    registry: HashMap<SchemaSignature, NodeId>,
    signatures: HashMap<NodeId, SchemaSignature>,
}

impl SchemaAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self::with_graph(config, SchemaGraph::new())
    }

    /// Continue inference into an existing graph. With deduplication on,
    /// shapes already present in `graph` are reused.
    pub fn with_graph(config: AnalyzerConfig, graph: SchemaGraph) -> Self {
        let mut analyzer = Self {
            config,
            detector: PatternDetector::default(),
            graph,
            registry: HashMap::new(),
            signatures: HashMap::new(),
        };
        if analyzer.config.deduplicate {
            analyzer.seed_registry();
        }
        analyzer
    }

    pub fn with_patterns(mut self, patterns: PatternConfig) -> Self {
        self.detector = PatternDetector::new(patterns);
        self
    }

    fn seed_registry(&mut self) {
        for node in self.graph.get_all_nodes() {
            if let Some(sig) = self.graph.signature(&node.id) {
                self.registry.entry(sig).or_insert_with(|| node.id.clone());
                self.signatures.insert(node.id.clone(), sig);
            }
        }
        trace!(interned = self.registry.len(), "registry seeded");
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    pub fn into_graph(self) -> SchemaGraph {
        self.graph
    }

    /// Analyze one document. A top-level array is treated as the sample
    /// list; anything else is a single sample.
    pub fn analyze(&mut self, data: &Value) -> NodeId {
        match data {
            Value::Array(items) => self.analyze_samples(items),
            other => self.analyze_refs(&[other]),
        }
    }

    pub fn analyze_samples(&mut self, samples: &[Value]) -> NodeId {
        let refs: Vec<&Value> = samples.iter().collect();
        self.analyze_refs(&refs)
    }

    fn analyze_refs(&mut self, samples: &[&Value]) -> NodeId {
        counter!("schema_inference_samples_total")
            .increment(samples.len() as u64);
        let root = self.infer_schema(samples, Ctx::root(samples.len()));
        debug!(
            samples = samples.len(),
            root = %root,
            nodes = self.graph.len(),
            "samples analyzed"
        );
        root
    }

    /// Group object samples by the value of `key` and analyze each group.
    ///
    /// Group names are string values as-is and any other value in its JSON
    /// form. Samples without the key are skipped.
    pub fn analyze_by_key(
        &mut self,
        samples: &[Value],
        key: &str,
    ) -> IndexMap<String, NodeId> {
        let mut groups: IndexMap<String, Vec<&Value>> = IndexMap::new();
        let mut skipped = 0usize;
        for sample in samples {
            match sample.get(key) {
                Some(Value::String(s)) => {
                    groups.entry(s.clone()).or_default().push(sample)
                }
                Some(other) => {
                    groups.entry(other.to_string()).or_default().push(sample)
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!(key, skipped, "samples without discriminator skipped");
        }

        groups
            .into_iter()
            .map(|(name, group)| {
                let id = self.analyze_refs(&group);
                (name, id)
            })
            .collect()
    }

    fn infer_schema(&mut self, samples: &[&Value], ctx: Ctx) -> NodeId {
        if samples.is_empty() {
            let draft = NodeDraft::scalar(ScalarType::Undefined, 0, Vec::new());
            return self.finish(draft, ctx);
        }

        let mut partitions: IndexMap<SchemaType, Vec<&Value>> = IndexMap::new();
        for sample in samples {
            partitions
                .entry(SchemaType::of(sample))
                .or_default()
                .push(*sample);
        }

        if partitions.len() == 1
            && let Some((kind, group)) = partitions.first()
        {
            return self.create_type_node(*kind, group, ctx);
        }

        let total = samples.len();
        let members: Vec<NodeId> = partitions
            .iter()
            .map(|(kind, group)| {
                self.create_type_node(*kind, group, ctx.sibling(total))
            })
            .collect();
        self.finish(NodeDraft::union(members, total), ctx)
    }

    fn create_type_node(
        &mut self,
        kind: SchemaType,
        samples: &[&Value],
        ctx: Ctx,
    ) -> NodeId {
        match kind {
            SchemaType::Object => self.infer_object(samples, ctx),
            SchemaType::Array => self.infer_array(samples, ctx),
            other => self.infer_scalar(other, samples, ctx),
        }
    }

    fn infer_object(&mut self, samples: &[&Value], ctx: Ctx) -> NodeId {
        let total = samples.len();
        if ctx.depth >= self.config.max_depth {
            debug!(depth = ctx.depth, "depth limit reached, object truncated");
            return self.finish(NodeDraft::object(IndexMap::new(), total), ctx);
        }

        let mut by_key: IndexMap<&str, Vec<&Value>> = IndexMap::new();
        for sample in samples {
            if let Value::Object(map) = sample {
                for (key, value) in map {
                    by_key.entry(key.as_str()).or_default().push(value);
                }
            }
        }

        let mut properties = IndexMap::with_capacity(by_key.len());
        for (key, values) in by_key {
            let optional = self.config.is_optional(values.len(), total);
            let id = self.infer_schema(&values, ctx.child(total, optional));
            if !self.config.deduplicate && optional {
                self.graph.set_optional(&id, true);
            }
            properties.insert(key.to_string(), id);
        }

        self.finish(NodeDraft::object(properties, total), ctx)
    }

    fn infer_array(&mut self, samples: &[&Value], ctx: Ctx) -> NodeId {
        let total = samples.len();
        let item_type = if ctx.depth >= self.config.max_depth {
            debug!(depth = ctx.depth, "depth limit reached, array truncated");
            let empty = NodeDraft::scalar(ScalarType::Undefined, 0, Vec::new());
            self.finish(empty, ctx.child(0, false))
        } else {
            let pool: Vec<&Value> = samples
                .iter()
                .filter_map(|v| v.as_array())
                .flatten()
                .collect();
            let item_ctx = ctx.child(pool.len(), false);
            self.infer_schema(&pool, item_ctx)
        };

        self.finish(NodeDraft::array(item_type, total), ctx)
    }

    fn infer_scalar(
        &mut self,
        kind: SchemaType,
        samples: &[&Value],
        ctx: Ctx,
    ) -> NodeId {
        let scalar_type =
            ScalarType::from_schema_type(kind).unwrap_or(ScalarType::Undefined);
        let examples = samples
            .iter()
            .take(self.config.max_examples)
            .map(|v| (*v).clone())
            .collect();
        let constraints = self.detector.detect_constraints(samples);
        let draft = NodeDraft::scalar(scalar_type, samples.len(), examples)
            .with_constraints(constraints);
        self.finish(draft, ctx)
    }

    /// Store a completed draft, or return the interned node of the same
    /// shape when deduplicating.
    fn finish(&mut self, mut draft: NodeDraft, ctx: Ctx) -> NodeId {
        draft.frequency = if ctx.parent_total == 0 {
            1.0
        } else {
            draft.samples as f64 / ctx.parent_total as f64
        };

        if !self.config.deduplicate {
            return self.graph.add_node(draft);
        }

        draft.optional = ctx.optional;
        let sig = SchemaSignature::of_draft(&draft, |child| {
            self.signatures.get(child).copied()
        });
        if let Some(existing) = self.registry.get(&sig).cloned() {
            trace!(node = %existing, signature = %sig.fingerprint(), "dedup hit");
            self.absorb(&existing, draft);
            return existing;
        }

        let id = self.graph.add_node(draft);
        self.registry.insert(sig, id.clone());
        self.signatures.insert(id.clone(), sig);
        id
    }

    /// Record a group that resolved to an interned node: its samples count
    /// towards the node and its constraints widen the node's.
    ///
    /// Format and integrality are part of the signature, so folding leaves
    /// the node's signature unchanged.
    fn absorb(&mut self, id: &NodeId, draft: NodeDraft) {
        let Some(mut node) = self.graph.get_node(id).cloned() else {
            return;
        };
        node.samples += draft.samples;
        node.metadata.confidence = NodeMetadata::confidence_for(node.samples);

        if let (
            NodeKind::Scalar { examples, .. },
            NodeKind::Scalar { examples: more, .. },
        ) = (&mut node.kind, draft.kind)
        {
            let room = self.config.max_examples.saturating_sub(examples.len());
            examples.extend(more.into_iter().take(room));
        }
        if let (Some(into), Some(other)) = (&mut node.constraints, &draft.constraints) {
            self.detector.fold(into, other, node.samples);
        }

        self.graph.update_node(id, node);
    }
}

impl Default for SchemaAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn strict() -> SchemaAnalyzer {
        SchemaAnalyzer::new(AnalyzerConfig::strict())
    }

    #[test]
    fn test_empty_samples_yield_undefined() {
        let mut a = SchemaAnalyzer::default();
        let id = a.analyze_samples(&[]);
        let node = a.graph().get_node(&id).unwrap();
        assert_eq!(node.schema_type(), SchemaType::Undefined);
        assert_eq!(node.samples, 0);
        assert!(node.examples().is_empty());
        assert!(node.constraints.is_none());
    }

    #[test]
    fn test_scalar_examples_capped() {
        let mut a = SchemaAnalyzer::default();
        let id = a.analyze(&json!([1, 2, 3, 4, 5, 6, 7]));
        let node = a.graph().get_node(&id).unwrap();
        assert_eq!(node.samples, 7);
        assert_eq!(node.examples().len(), 5);
        assert_eq!(node.metadata.frequency, 1.0);
    }

    #[test]
    fn test_single_document_is_one_sample() {
        let mut a = SchemaAnalyzer::default();
        let id = a.analyze(&json!({"name": "x"}));
        let node = a.graph().get_node(&id).unwrap();
        assert_eq!(node.schema_type(), SchemaType::Object);
        assert_eq!(node.samples, 1);
    }

    #[test]
    fn test_union_wraps_partitions_in_first_seen_order() {
        let mut a = strict();
        let id = a.analyze(&json!(["a", 1, "b", null]));
        let node = a.graph().get_node(&id).unwrap();
        assert_eq!(node.schema_type(), SchemaType::Union);
        assert_eq!(node.samples, 4);

        let types: Vec<SchemaType> = node
            .children()
            .into_iter()
            .map(|c| a.graph().get_node(c).unwrap().schema_type())
            .collect();
        assert_eq!(
            types,
            vec![SchemaType::String, SchemaType::Number, SchemaType::Null]
        );
        let first = a.graph().get_node(node.children()[0]).unwrap();
        assert_eq!(first.samples, 2);
        assert_eq!(first.metadata.frequency, 0.5);
    }

    #[test]
    fn test_optionality_back_patched_without_dedup() {
        let mut a = strict();
        let id = a.analyze(&json!([{"a": 1, "b": 1}, {"b": 2}]));
        let props = a.graph().get_node(&id).unwrap().properties().unwrap().clone();
        let a_node = a.graph().get_node(&props["a"]).unwrap();
        let b_node = a.graph().get_node(&props["b"]).unwrap();
        assert!(a_node.optional);
        assert!(!b_node.optional);
        assert_eq!(a_node.metadata.frequency, 0.5);
    }

    #[test]
    fn test_default_threshold_tolerates_rare_absence() {
        let mut samples: Vec<Value> = (0..19).map(|i| json!({"a": i})).collect();
        samples.push(json!({}));

        let mut lenient = SchemaAnalyzer::default();
        let id = lenient.analyze_samples(&samples);
        let props = lenient.graph().get_node(&id).unwrap().properties().unwrap();
        assert!(!lenient.graph().get_node(&props["a"]).unwrap().optional);

        let mut any_absence = strict();
        let id = any_absence.analyze_samples(&samples);
        let props = any_absence.graph().get_node(&id).unwrap().properties().unwrap();
        assert!(any_absence.graph().get_node(&props["a"]).unwrap().optional);
    }

    #[test]
    fn test_dedup_shares_leaf_nodes() {
        let mut a = SchemaAnalyzer::default();
        let id = a.analyze(&json!({"first": "x", "last": "y", "age": 3}));
        let props = a.graph().get_node(&id).unwrap().properties().unwrap();
        assert_eq!(props["first"], props["last"]);
        assert_ne!(props["first"], props["age"]);
        assert_eq!(a.graph().len(), 3);
    }

    #[test]
    fn test_properties_keep_sample_key_order() {
        let mut a = SchemaAnalyzer::default();
        let id = a.analyze(&json!([
            {"zeta": 1, "alpha": "a", "mid": true},
            {"beta": null, "zeta": 2},
        ]));
        let keys: Vec<&str> = a
            .graph()
            .get_node(&id)
            .unwrap()
            .properties()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid", "beta"]);
    }

    #[test]
    fn test_dedup_hit_counts_towards_shared_node() {
        let mut a = SchemaAnalyzer::default();
        let id = a.analyze(&json!({"first": "x", "last": "yy"}));
        let props = a.graph().get_node(&id).unwrap().properties().unwrap().clone();
        let shared = a.graph().get_node(&props["first"]).unwrap();
        assert_eq!(shared.samples, 2);
        assert_eq!(shared.metadata.confidence, 2.0 / 3.0);
        assert_eq!(shared.examples(), &[json!("x"), json!("yy")]);
        let c = shared.constraints.as_ref().unwrap();
        assert_eq!((c.min_length, c.max_length), (Some(1), Some(2)));

        let created = shared.metadata.created_at;
        a.analyze(&json!({"first": "zzz", "last": "w"}));
        let shared = a.graph().get_node(&props["first"]).unwrap();
        assert_eq!(shared.samples, 4);
        assert_eq!(shared.metadata.created_at, created);
        assert!(shared.metadata.last_updated >= created);
        assert_eq!(shared.constraints.as_ref().unwrap().max_length, Some(3));
    }

    #[test]
    fn test_dedup_keeps_optional_and_required_apart() {
        let mut a = SchemaAnalyzer::new(AnalyzerConfig {
            optionality_threshold: 0.0,
            ..Default::default()
        });
        let id = a.analyze(&json!([{"a": "x", "b": "y"}, {"b": "z"}]));
        let props = a.graph().get_node(&id).unwrap().properties().unwrap();
        assert_ne!(props["a"], props["b"]);
        assert!(a.graph().get_node(&props["a"]).unwrap().optional);
        assert!(!a.graph().get_node(&props["b"]).unwrap().optional);
    }

    #[test]
    fn test_with_graph_reuses_existing_shapes() {
        let mut first = SchemaAnalyzer::default();
        let id = first.analyze(&json!({"a": [1, 2]}));
        let graph = first.into_graph();
        let before = graph.len();

        let mut second = SchemaAnalyzer::with_graph(AnalyzerConfig::default(), graph);
        let again = second.analyze(&json!({"a": [7]}));
        assert_eq!(again, id);
        assert_eq!(second.graph().len(), before);
    }

    #[test]
    fn test_analyze_by_key_groups() {
        let mut a = SchemaAnalyzer::default();
        let samples = vec![
            json!({"kind": "click", "x": 1}),
            json!({"kind": "view", "x": 2}),
            json!({"kind": "scroll", "dy": 2.5, "x": 5}),
            json!({"kind": 7, "x": 1}),
            json!({"x": 1}),
        ];
        let groups = a.analyze_by_key(&samples, "kind");
        let names: Vec<&str> = groups.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["click", "view", "scroll", "7"]);
        assert_eq!(groups["click"], groups["view"]);
        assert_ne!(groups["click"], groups["scroll"]);
        // numeric discriminator changes the property type
        assert_ne!(groups["click"], groups["7"]);
    }

    #[test]
    fn test_depth_limit_truncates() {
        let mut a = SchemaAnalyzer::new(AnalyzerConfig {
            max_depth: 1,
            ..Default::default()
        });
        let id = a.analyze(&json!({"inner": {"deep": 1}, "list": [[1]]}));
        let props = a.graph().get_node(&id).unwrap().properties().unwrap().clone();

        let inner = a.graph().get_node(&props["inner"]).unwrap();
        assert_eq!(inner.properties().map(|p| p.len()), Some(0));

        let list = a.graph().get_node(&props["list"]).unwrap();
        let NodeKind::Array { item_type } = &list.kind else {
            panic!("expected array");
        };
        let item = a.graph().get_node(item_type).unwrap();
        assert_eq!(item.schema_type(), SchemaType::Undefined);
    }

    #[test]
    fn test_scalar_constraints_attached() {
        let mut a = SchemaAnalyzer::default();
        let id = a.analyze(&json!(["test@example.com", "user@domain.com"]));
        let node = a.graph().get_node(&id).unwrap();
        let c = node.constraints.as_ref().unwrap();
        assert_eq!(c.format.as_deref(), Some("email"));

        let id = a.analyze(&json!([true, false]));
        assert!(a.graph().get_node(&id).unwrap().constraints.is_none());
    }
}
