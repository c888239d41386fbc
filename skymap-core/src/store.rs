// Graph store: the single source of truth for nodes and edges

use crate::error::ValidationIssue;
use crate::model::{Edge, EdgeCategory, ElementRef, Node};
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

/// Nodes and edges reachable in one hop from an element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighborhood {
    pub nodes: BTreeSet<String>,
    pub edges: BTreeSet<String>,
}

impl Neighborhood {
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains(id) || self.edges.contains(id)
    }

    pub fn extend(&mut self, other: Neighborhood) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub nodes: usize,
    pub edges: usize,
    pub derived_edges: usize,
    pub parents: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_category: BTreeMap<EdgeCategory, usize>,
}

/// Holds the whole topology. Mutated only through [`GraphStore::replace_all`]
/// and [`GraphStore::clear`]; every other component reads.
#[derive(Debug, Default)]
pub struct GraphStore {
    graph: StableDiGraph<Node, Edge>,
    node_index: HashMap<String, NodeIndex>,
    edge_index: HashMap<String, EdgeIndex>,
    children: HashMap<String, Vec<String>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically swap the whole element set.
    ///
    /// Duplicate ids replace the earlier record. Edges whose endpoints are
    /// missing, or whose id already names a node, are dropped; parents that
    /// are missing or would close a cycle are cleared. Each of those yields
    /// one issue.
    pub fn replace_all(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        let mut node_order: Vec<String> = Vec::with_capacity(nodes.len());
        let mut by_id: HashMap<String, Node> = HashMap::with_capacity(nodes.len());
        for node in nodes {
            if by_id.contains_key(&node.id) {
                debug!("Duplicate node id {}, keeping the later record", node.id);
                issues.push(ValidationIssue::DuplicateId {
                    kind: "node",
                    id: node.id.clone(),
                });
            } else {
                node_order.push(node.id.clone());
            }
            by_id.insert(node.id.clone(), node);
        }

        for id in &node_order {
            let missing = by_id[id]
                .parent
                .as_ref()
                .filter(|p| !by_id.contains_key(p.as_str()))
                .cloned();
            if let Some(parent) = missing
                && let Some(node) = by_id.get_mut(id)
            {
                node.parent = None;
                issues.push(ValidationIssue::MissingParent {
                    id: id.clone(),
                    parent,
                });
            }
        }

        for id in &node_order {
            if let Some(parent) = closes_cycle(id, &by_id)
                && let Some(node) = by_id.get_mut(id)
            {
                node.parent = None;
                issues.push(ValidationIssue::ParentCycle {
                    id: id.clone(),
                    parent,
                });
            }
        }

        let mut graph = StableDiGraph::with_capacity(node_order.len(), edges.len());
        let mut node_index = HashMap::with_capacity(node_order.len());
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for id in &node_order {
            if let Some(node) = by_id.remove(id) {
                if let Some(ref parent) = node.parent {
                    children.entry(parent.clone()).or_default().push(id.clone());
                }
                let idx = graph.add_node(node);
                node_index.insert(id.clone(), idx);
            }
        }

        let mut edge_order: Vec<String> = Vec::with_capacity(edges.len());
        let mut edges_by_id: HashMap<String, Edge> = HashMap::with_capacity(edges.len());
        for edge in edges {
            if node_index.contains_key(&edge.id) {
                issues.push(ValidationIssue::EdgeIdClash { id: edge.id });
                continue;
            }
            if edges_by_id.contains_key(&edge.id) {
                debug!("Duplicate edge id {}, keeping the later record", edge.id);
                issues.push(ValidationIssue::DuplicateId {
                    kind: "edge",
                    id: edge.id.clone(),
                });
            } else {
                edge_order.push(edge.id.clone());
            }
            edges_by_id.insert(edge.id.clone(), edge);
        }

        let mut edge_index = HashMap::with_capacity(edge_order.len());
        for id in &edge_order {
            let Some(edge) = edges_by_id.remove(id) else {
                continue;
            };
            let source = node_index.get(&edge.source).copied();
            let target = node_index.get(&edge.target).copied();
            match (source, target) {
                (Some(s), Some(t)) => {
                    let idx = graph.add_edge(s, t, edge);
                    edge_index.insert(id.clone(), idx);
                }
                (None, _) => issues.push(ValidationIssue::DanglingEdge {
                    id: id.clone(),
                    endpoint: "source",
                    node: edge.source,
                }),
                (Some(_), None) => issues.push(ValidationIssue::DanglingEdge {
                    id: id.clone(),
                    endpoint: "target",
                    node: edge.target,
                }),
            }
        }

        self.graph = graph;
        self.node_index = node_index;
        self.edge_index = edge_index;
        self.children = children;

        info!(
            "Graph store loaded {} node(s), {} edge(s), {} issue(s)",
            self.node_count(),
            self.edge_count(),
            issues.len()
        );
        issues
    }

    pub fn clear(&mut self) {
        self.graph.clear();
        self.node_index.clear();
        self.edge_index.clear();
        self.children.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0 && self.graph.edge_count() == 0
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id) || self.edge_index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index
            .get(id)
            .and_then(|idx| self.graph.node_weight(*idx))
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edge_index
            .get(id)
            .and_then(|idx| self.graph.edge_weight(*idx))
    }

    pub fn element(&self, id: &str) -> Option<ElementRef<'_>> {
        self.node(id)
            .map(ElementRef::Node)
            .or_else(|| self.edge(id).map(ElementRef::Edge))
    }

    /// Nodes in load order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx))
    }

    /// Edges in load order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph
            .edge_indices()
            .filter_map(|idx| self.graph.edge_weight(idx))
    }

    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.nodes()
            .map(ElementRef::Node)
            .chain(self.edges().map(ElementRef::Edge))
    }

    /// Lazily filtered view; call [`Query::iter`] as often as needed.
    pub fn query<P>(&self, predicate: P) -> Query<'_, P>
    where
        P: Fn(&ElementRef<'_>) -> bool,
    {
        Query {
            store: self,
            predicate,
        }
    }

    pub fn children(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// A node is a parent while at least one node names it.
    pub fn is_parent(&self, id: &str) -> bool {
        !self.children(id).is_empty()
    }

    /// Parent chain, nearest first.
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.node(id).and_then(|n| n.parent.clone());
        while let Some(parent) = current {
            current = self.node(&parent).and_then(|n| n.parent.clone());
            chain.push(parent);
        }
        chain
    }

    pub fn depth(&self, id: &str) -> usize {
        self.ancestors(id).len()
    }

    /// Edges touching a node plus the nodes at their other ends, the node
    /// itself included. For an edge id: the edge and its endpoints.
    pub fn neighborhood(&self, id: &str) -> Option<Neighborhood> {
        self.neighborhood_where(id, |_| true)
    }

    /// Like [`GraphStore::neighborhood`] but only walks edges accepted by `edge_filter`.
    pub fn neighborhood_where<F>(&self, id: &str, edge_filter: F) -> Option<Neighborhood>
    where
        F: Fn(&Edge) -> bool,
    {
        let mut hood = Neighborhood::default();

        if let Some(edge) = self.edge(id) {
            hood.edges.insert(edge.id.clone());
            hood.nodes.insert(edge.source.clone());
            hood.nodes.insert(edge.target.clone());
            return Some(hood);
        }

        let idx = *self.node_index.get(id)?;
        hood.nodes.insert(id.to_string());
        for direction in [Direction::Outgoing, Direction::Incoming] {
            for edge_ref in self.graph.edges_directed(idx, direction) {
                let edge = edge_ref.weight();
                if !edge_filter(edge) {
                    continue;
                }
                hood.edges.insert(edge.id.clone());
                let other = match direction {
                    Direction::Outgoing => edge_ref.target(),
                    Direction::Incoming => edge_ref.source(),
                };
                if let Some(node) = self.graph.node_weight(other) {
                    hood.nodes.insert(node.id.clone());
                }
            }
        }
        Some(hood)
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            parents: self.children.len(),
            ..Default::default()
        };
        for node in self.nodes() {
            *stats
                .by_type
                .entry(node.node_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        for edge in self.edges() {
            *stats.by_category.entry(edge.category()).or_insert(0) += 1;
            if edge.derived {
                stats.derived_edges += 1;
            }
        }
        stats
    }
}

/// Returns the parent of `id` when following parent links leads back to `id`.
fn closes_cycle(id: &str, nodes: &HashMap<String, Node>) -> Option<String> {
    let first = nodes.get(id)?.parent.clone()?;
    let mut seen = HashSet::new();
    let mut current = Some(first.clone());
    while let Some(parent) = current {
        if parent == id {
            return Some(first);
        }
        if !seen.insert(parent.clone()) {
            // Loop not through `id`; its own members report it.
            return None;
        }
        current = nodes.get(&parent).and_then(|n| n.parent.clone());
    }
    None
}

/// Restartable filtered view over a [`GraphStore`].
pub struct Query<'a, P> {
    store: &'a GraphStore,
    predicate: P,
}

impl<'a, P> Query<'a, P>
where
    P: Fn(&ElementRef<'_>) -> bool,
{
    pub fn iter(&self) -> impl Iterator<Item = ElementRef<'a>> + '_ {
        self.store.elements().filter(|e| (self.predicate)(e))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn ids(&self) -> Vec<String> {
        self.iter().map(|e| e.id().to_string()).collect()
    }
}
