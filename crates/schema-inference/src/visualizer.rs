//! Graph rendering: a node/edge model and Mermaid flowcharts.

use serde::Serialize;

use crate::graph::SchemaGraph;
use crate::node::{NodeId, NodeKind, SchemaNode, SchemaType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualNode {
    pub id: NodeId,
    pub label: String,
    pub node_type: SchemaType,
    pub samples: usize,
    pub confidence: f64,
    pub complexity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisualGraph {
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
}

/// Rough size of a node: itself plus its fan-out, or plus its populated
/// constraints for scalars.
pub fn calculate_node_complexity(node: &SchemaNode) -> usize {
    match &node.kind {
        NodeKind::Object { properties } => 1 + properties.len(),
        NodeKind::Union { types } => 1 + types.len(),
        NodeKind::Array { .. } => 2,
        NodeKind::Scalar { .. } => {
            1 + node.constraints.as_ref().map_or(0, |c| c.populated())
        }
    }
}

fn node_label(node: &SchemaNode) -> String {
    let format = node.constraints.as_ref().and_then(|c| c.format.as_deref());
    match format {
        Some(format) => {
            format!("{}: {format} ({})", node.schema_type(), node.samples)
        }
        None => format!("{} ({})", node.schema_type(), node.samples),
    }
}

/// Build the node/edge model of a graph, in node insertion order.
pub fn visualize(graph: &SchemaGraph) -> VisualGraph {
    let mut visual = VisualGraph::default();

    for node in graph.get_all_nodes() {
        visual.nodes.push(VisualNode {
            id: node.id.clone(),
            label: node_label(node),
            node_type: node.schema_type(),
            samples: node.samples,
            confidence: node.metadata.confidence,
            complexity: calculate_node_complexity(node),
        });

        let edge = |to: &NodeId, label: String| VisualEdge {
            from: node.id.clone(),
            to: to.clone(),
            label,
        };
        match &node.kind {
            NodeKind::Scalar { .. } => {}
            NodeKind::Object { properties } => {
                for (name, child) in properties {
                    let optional =
                        graph.get_node(child).is_some_and(|c| c.optional);
                    let label = if optional {
                        format!("{name}?")
                    } else {
                        name.clone()
                    };
                    visual.edges.push(edge(child, label));
                }
            }
            NodeKind::Array { item_type } => {
                visual.edges.push(edge(item_type, "items".to_string()));
            }
            NodeKind::Union { types } => {
                for member in types {
                    visual.edges.push(edge(member, "variant".to_string()));
                }
            }
        }
    }

    visual
}

/// Render a graph as a Mermaid `graph TD` flowchart.
pub fn to_mermaid(graph: &SchemaGraph) -> String {
    let visual = visualize(graph);
    let mut out = String::from("graph TD\n");
    for node in &visual.nodes {
        out.push_str(&format!(
            "  {}[\"{}\"]\n",
            mermaid_id(&node.id),
            escape_label(&node.label)
        ));
    }
    for edge in &visual.edges {
        out.push_str(&format!(
            "  {} -- \"{}\" --> {}\n",
            mermaid_id(&edge.from),
            escape_label(&edge.label),
            mermaid_id(&edge.to)
        ));
    }
    out
}

fn mermaid_id(id: &NodeId) -> String {
    id.as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn escape_label(label: &str) -> String {
    label.replace('"', "#quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::SchemaAnalyzer;
    use crate::node::{NodeDraft, ScalarType, TypeConstraints};
    use schema_config::AnalyzerConfig;
    use serde_json::json;

    #[test]
    fn test_complexity() {
        let mut g = SchemaGraph::new();
        let s = g.add_node(
            NodeDraft::scalar(ScalarType::String, 1, vec![]).with_constraints(
                TypeConstraints {
                    min_length: Some(1),
                    max_length: Some(3),
                    ..Default::default()
                },
            ),
        );
        let arr = g.add_node(NodeDraft::array(s.clone(), 1));
        let u = g.add_node(NodeDraft::union(vec![s.clone(), arr.clone()], 2));

        let get = |id: &NodeId| g.get_node(id).unwrap();
        assert_eq!(calculate_node_complexity(get(&s)), 3);
        assert_eq!(calculate_node_complexity(get(&arr)), 2);
        assert_eq!(calculate_node_complexity(get(&u)), 3);
    }

    #[test]
    fn test_edges_labels() {
        let mut a = SchemaAnalyzer::new(AnalyzerConfig::strict());
        a.analyze(&json!([{"tags": ["x"], "id": 1}, {"tags": []}]));
        let visual = visualize(a.graph());

        let labels: Vec<&str> =
            visual.edges.iter().map(|e| e.label.as_str()).collect();
        assert!(labels.contains(&"items"));
        assert!(labels.contains(&"tags"));
        assert!(labels.contains(&"id?"));
        assert_eq!(visual.nodes.len(), a.graph().len());
    }

    #[test]
    fn test_mermaid_output() {
        let mut g = SchemaGraph::with_namespace("ns");
        let s = g.add_node(NodeDraft::scalar(ScalarType::String, 2, vec![]));
        g.add_node(NodeDraft::array(s, 1));

        let mermaid = to_mermaid(&g);
        let lines: Vec<&str> = mermaid.lines().collect();
        assert_eq!(
            lines,
            vec![
                "graph TD",
                "  ns_string_1[\"string (2)\"]",
                "  ns_array_2[\"array (1)\"]",
                "  ns_array_2 -- \"items\" --> ns_string_1",
            ]
        );
    }

    #[test]
    fn test_label_with_format_and_escaping() {
        let mut g = SchemaGraph::new();
        let s = g.add_node(
            NodeDraft::scalar(ScalarType::String, 4, vec![]).with_constraints(
                TypeConstraints {
                    format: Some("email".into()),
                    ..Default::default()
                },
            ),
        );
        let mut props = indexmap::IndexMap::new();
        props.insert("say \"hi\"".to_string(), s);
        g.add_node(NodeDraft::object(props, 4));

        let mermaid = to_mermaid(&g);
        assert!(mermaid.contains("  string_1[\"string: email (4)\"]"));
        assert!(mermaid.contains("-- \"say #quot;hi#quot;\" -->"));
    }
}
