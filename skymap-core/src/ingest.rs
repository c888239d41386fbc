// Ingestion: turns backend element records into graph elements and guards against stale loads

use crate::error::ValidationIssue;
use crate::model::{Edge, EdgeCategory, Node, NodeType};
use serde_json::{Map, Value};
use skymap_client::{ElementGroup, ElementRecord};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Handle for one in-flight load. Only the most recently issued ticket may
/// apply its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IngestTicket(u64);

impl IngestTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub nodes: usize,
    pub edges: usize,
    pub warnings: usize,
    pub findings: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Applied(IngestSummary),
    Failed(String),
    /// A newer load was started; this result was discarded.
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionAdapter {
    issued: u64,
    pending: Option<u64>,
}

impl IngestionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> IngestTicket {
        self.issued += 1;
        self.pending = Some(self.issued);
        debug!("Issued ingestion ticket {}", self.issued);
        IngestTicket(self.issued)
    }

    pub fn is_current(&self, ticket: IngestTicket) -> bool {
        ticket.0 == self.issued
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Close the ticket. Returns false when it was superseded.
    pub fn finish(&mut self, ticket: IngestTicket) -> bool {
        if !self.is_current(ticket) {
            debug!(
                "Discarding result of ticket {} (latest is {})",
                ticket.0, self.issued
            );
            return false;
        }
        self.pending = None;
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedElements {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub issues: Vec<ValidationIssue>,
}

/// Split records into nodes and edges. Records that cannot become elements
/// are reported instead of failing the whole load.
pub fn parse_elements(records: &[ElementRecord]) -> ParsedElements {
    let mut parsed = ParsedElements::default();
    let mut ordinals: HashMap<(String, String), usize> = HashMap::new();
    let mut taken: HashSet<String> = records
        .iter()
        .filter_map(|r| non_empty(r.str_field("id")))
        .map(str::to_string)
        .collect();

    for record in records {
        match record.group() {
            ElementGroup::Nodes => match node_from_record(record) {
                Ok(node) => parsed.nodes.push(node),
                Err(issue) => parsed.issues.push(issue),
            },
            ElementGroup::Edges => match edge_from_record(record, &mut ordinals, &mut taken) {
                Ok(edge) => parsed.edges.push(edge),
                Err(issue) => parsed.issues.push(issue),
            },
        }
    }
    parsed
}

const NODE_FIELDS: [&str; 4] = ["id", "type", "label", "parent"];
const EDGE_FIELDS: [&str; 7] = ["id", "source", "target", "category", "type", "derived", "label"];

pub fn node_from_record(record: &ElementRecord) -> Result<Node, ValidationIssue> {
    let id = non_empty(record.str_field("id")).ok_or(ValidationIssue::MissingNodeId)?;
    let node_type = record
        .str_field("type")
        .map(NodeType::parse)
        .unwrap_or_else(|| NodeType::Other("unknown".to_string()));
    let label = non_empty(record.str_field("label")).unwrap_or(id);

    let mut node = Node::new(id, node_type, label);
    node.parent = non_empty(record.str_field("parent")).map(str::to_string);
    node.attributes = extra_fields(&record.data, &NODE_FIELDS);
    Ok(node)
}

/// Missing edge ids become `edge:<source>:<target>:<n>`, with `n` skipping
/// any id already in `taken`.
pub fn edge_from_record(
    record: &ElementRecord,
    ordinals: &mut HashMap<(String, String), usize>,
    taken: &mut HashSet<String>,
) -> Result<Edge, ValidationIssue> {
    let declared_id = non_empty(record.str_field("id")).map(str::to_string);
    let label_id = || declared_id.clone().unwrap_or_else(|| "<unnamed>".to_string());

    let source = non_empty(record.str_field("source")).ok_or_else(|| ValidationIssue::MissingEndpoint {
        id: label_id(),
        field: "source",
    })?;
    let target = non_empty(record.str_field("target")).ok_or_else(|| ValidationIssue::MissingEndpoint {
        id: label_id(),
        field: "target",
    })?;

    let raw_category = record.str_field("category").unwrap_or("");
    let category = EdgeCategory::from_str(raw_category).ok_or_else(|| ValidationIssue::UnknownCategory {
        id: label_id(),
        category: raw_category.to_string(),
    })?;

    let id = declared_id.clone().unwrap_or_else(|| {
        let n = ordinals.entry((source.to_string(), target.to_string())).or_insert(0);
        loop {
            *n += 1;
            let candidate = format!("edge:{}:{}:{}", source, target, n);
            if taken.insert(candidate.clone()) {
                break candidate;
            }
        }
    });

    let derived = match record.data.get("derived") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
        _ => false,
    };

    let mut edge = Edge::new(id, source, target, category)
        .with_type(record.str_field("type").unwrap_or(""))
        .with_label(record.str_field("label").unwrap_or(""))
        .with_derived(derived);
    edge.attributes = extra_fields(&record.data, &EDGE_FIELDS);
    Ok(edge)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn extra_fields(data: &Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    data.iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
