//! Human readable rendering of graphs and diffs.

use std::fmt::Write;

use schema_inference::{
    Compatibility, SchemaDiff, SchemaGraph, SchemaNode, calculate_node_complexity,
};

fn describe(node: &SchemaNode) -> String {
    let mut label = node.kind.schema_type().to_string();
    if let Some(format) = node.constraints.as_ref().and_then(|c| c.format.as_deref()) {
        let _ = write!(label, " ({format})");
    }
    if node.optional {
        label.push('?');
    }
    label
}

/// One line per added, removed or modified node, then the verdict.
pub fn render_diff(diff: &SchemaDiff, before: &SchemaGraph, after: &SchemaGraph) -> String {
    let mut out = String::new();
    if diff.is_empty() {
        let _ = writeln!(out, "no changes");
    }
    for id in &diff.added {
        let what = after.get_node(id).map(describe).unwrap_or_default();
        let _ = writeln!(out, "+ {id} {what}");
    }
    for id in &diff.removed {
        let what = before.get_node(id).map(describe).unwrap_or_default();
        let _ = writeln!(out, "- {id} {what}");
    }
    for (id, modification) in &diff.modified {
        let marker = if modification.is_breaking() { "!" } else { "~" };
        let _ = writeln!(out, "{marker} {id}");
        for change in &modification.changes {
            let _ = writeln!(out, "    {change}");
        }
    }
    let _ = writeln!(out, "compatibility: {}", diff.compatibility);
    out
}

/// Node listing with a complexity score, most complex first.
pub fn render_summary(graph: &SchemaGraph) -> String {
    let mut nodes: Vec<&SchemaNode> = graph.get_all_nodes().collect();
    nodes.sort_by_key(|node| std::cmp::Reverse(calculate_node_complexity(node)));

    let mut out = String::new();
    let _ = writeln!(out, "{} nodes, roots: {}", graph.len(), join_ids(graph));
    for node in nodes {
        let _ = writeln!(
            out,
            "{:<24} {:<20} samples={} complexity={}",
            node.id.to_string(),
            describe(node),
            node.samples,
            calculate_node_complexity(node),
        );
    }
    out
}

fn join_ids(graph: &SchemaGraph) -> String {
    graph
        .roots()
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Process exit status for a diff verdict.
pub fn exit_status(compatibility: Compatibility) -> u8 {
    match compatibility {
        Compatibility::Compatible | Compatibility::Partial => 0,
        Compatibility::Breaking => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_inference::{AnalyzerConfig, SchemaAnalyzer, SchemaComparator};
    use serde_json::json;

    fn infer(samples: serde_json::Value) -> SchemaGraph {
        let mut analyzer = SchemaAnalyzer::new(AnalyzerConfig::default());
        analyzer.analyze(&samples);
        analyzer.into_graph()
    }

    #[test]
    fn test_identical_graphs_report_no_changes() {
        let graph = infer(json!([{"id": 1}, {"id": 2}]));
        let diff = SchemaComparator::new().compare(&graph, &graph);
        let text = render_diff(&diff, &graph, &graph);
        assert!(text.starts_with("no changes"));
        assert!(text.ends_with("compatibility: compatible\n"));
        assert_eq!(exit_status(diff.compatibility), 0);
    }

    #[test]
    fn test_type_change_is_reported_as_breaking() {
        let before = infer(json!([{"id": 1}]));
        let after = infer(json!([{"id": "one"}]));
        let diff = SchemaComparator::new().compare(&before, &after);
        let text = render_diff(&diff, &before, &after);
        assert!(text.contains("compatibility: breaking"), "{text}");
        assert_eq!(exit_status(diff.compatibility), 2);
    }

    #[test]
    fn test_summary_lists_every_node() {
        let graph = infer(json!([{"email": "a@b.co", "tags": ["x"]}]));
        let text = render_summary(&graph);
        assert!(text.starts_with(&format!("{} nodes", graph.len())));
        assert!(text.contains("string (email)"));
        assert_eq!(text.lines().count(), graph.len() + 1);
    }
}
