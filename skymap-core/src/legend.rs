// Legend: one entry per node kind and edge category present in the graph

use crate::model::{EdgeCategory, NodeType};
use crate::store::GraphStore;
use crate::style::{LineStyle, Shape, StyleResolver};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum LegendKind {
    Node(NodeType),
    Category(EdgeCategory),
    Derived,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub kind: LegendKind,
    pub label: String,
    pub color: String,
    pub shape: Option<Shape>,
    pub line_style: Option<LineStyle>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Legend {
    pub entries: Vec<LegendEntry>,
}

impl Legend {
    /// Kinds in their canonical order, unknown kinds last by name.
    pub fn build(store: &GraphStore, resolver: &StyleResolver) -> Self {
        let mut node_counts: BTreeMap<NodeType, usize> = BTreeMap::new();
        for node in store.nodes() {
            *node_counts.entry(node.node_type.clone()).or_insert(0) += 1;
        }

        let mut entries = Vec::new();
        for (node_type, count) in node_counts {
            let style = resolver.node_type_style(&node_type);
            entries.push(LegendEntry {
                label: node_type.display_name(),
                kind: LegendKind::Node(node_type),
                color: style.fill_color,
                shape: Some(style.shape),
                line_style: None,
                count,
            });
        }

        let stats = store.stats();
        for (category, count) in stats.by_category {
            entries.push(LegendEntry {
                kind: LegendKind::Category(category),
                label: format!("{} edge", category),
                color: resolver.legend_color_for(category),
                shape: None,
                line_style: Some(LineStyle::Solid),
                count,
            });
        }
        if stats.derived_edges > 0 {
            let style = resolver.derived_edge_style();
            entries.push(LegendEntry {
                kind: LegendKind::Derived,
                label: "derived edge".to_string(),
                color: style.line_color,
                shape: None,
                line_style: Some(style.line_style),
                count: stats.derived_edges,
            });
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| {
                let glyph = match (e.shape, e.line_style) {
                    (Some(shape), _) => shape.as_str(),
                    (None, Some(LineStyle::Dashed)) => "- - -",
                    (None, _) => "─────",
                };
                format!("{:<16} {:<8} {} ({})", glyph, e.color, e.label, e.count)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Node};
    use crate::style::{Declaration, RulePhase, Selector};

    #[test]
    fn test_legend_lists_present_kinds() {
        let mut store = GraphStore::new();
        store.replace_all(
            vec![
                Node::new("vpc-1", NodeType::Vpc, "main"),
                Node::new("sg-1", NodeType::SecurityGroup, "sg"),
                Node::new("sg-2", NodeType::SecurityGroup, "sg"),
                Node::new("tgw-1", NodeType::parse("tgw"), "tgw"),
            ],
            vec![
                Edge::new("e1", "sg-1", "sg-2", EdgeCategory::Network).with_derived(true),
            ],
        );
        let legend = Legend::build(&store, &StyleResolver::default());

        let labels: Vec<&str> = legend.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["VPC", "Security Group", "Tgw", "network edge", "derived edge"]
        );
        let sg = &legend.entries[1];
        assert_eq!(sg.count, 2);
        assert_eq!(sg.color, "#a855f7");
        assert_eq!(sg.shape, Some(Shape::Hexagon));
        assert_eq!(legend.lines().len(), 5);
    }

    #[test]
    fn test_legend_follows_custom_rules() {
        let mut store = GraphStore::new();
        store.replace_all(
            vec![
                Node::new("a", NodeType::Instance, "a"),
                Node::new("b", NodeType::Instance, "b"),
            ],
            vec![
                Edge::new("e1", "a", "b", EdgeCategory::Data),
                Edge::new("e2", "b", "a", EdgeCategory::Network).with_derived(true),
            ],
        );
        let mut resolver = StyleResolver::default();
        resolver.push_rule(
            Selector::Category(EdgeCategory::Data),
            RulePhase::Category,
            vec![Declaration::LineColor("#ff00ff".into())],
        );
        resolver.push_rule(
            Selector::Derived,
            RulePhase::Category,
            vec![Declaration::LineColor("#123456".into())],
        );

        let legend = Legend::build(&store, &resolver);
        let color_of = |kind: LegendKind| {
            legend
                .entries
                .iter()
                .find(|e| e.kind == kind)
                .map(|e| e.color.clone())
        };
        assert_eq!(color_of(LegendKind::Category(EdgeCategory::Data)).as_deref(), Some("#ff00ff"));
        assert_eq!(
            color_of(LegendKind::Category(EdgeCategory::Network)).as_deref(),
            Some(crate::style::NETWORK_COLOR)
        );
        assert_eq!(color_of(LegendKind::Derived).as_deref(), Some("#123456"));
    }

    #[test]
    fn test_empty_store_empty_legend() {
        let legend = Legend::build(&GraphStore::new(), &StyleResolver::default());
        assert!(legend.is_empty());
    }
}
