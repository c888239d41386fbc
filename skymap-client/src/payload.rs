use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminator used by graph payloads to tell nodes and edges apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementGroup {
    Nodes,
    Edges,
}

/// One raw graph element as sent by the backend: `{ "group"?: ..., "data": {...} }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<ElementGroup>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl ElementRecord {
    pub fn node(data: Map<String, Value>) -> Self {
        Self {
            group: Some(ElementGroup::Nodes),
            data,
        }
    }

    pub fn edge(data: Map<String, Value>) -> Self {
        Self {
            group: Some(ElementGroup::Edges),
            data,
        }
    }

    /// Explicit `group` wins; otherwise anything with a `source` is an edge.
    pub fn group(&self) -> ElementGroup {
        match self.group {
            Some(group) => group,
            None if self.data.contains_key("source") => ElementGroup::Edges,
            None => ElementGroup::Nodes,
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub severity: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,
}

/// Successful body of `POST /enumerate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumerationResponse {
    #[serde(default)]
    pub elements: Vec<ElementRecord>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub findings: Vec<FindingRecord>,
}

impl EnumerationResponse {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn node_records(&self) -> impl Iterator<Item = &ElementRecord> {
        self.elements
            .iter()
            .filter(|e| e.group() == ElementGroup::Nodes)
    }

    pub fn edge_records(&self) -> impl Iterator<Item = &ElementRecord> {
        self.elements
            .iter()
            .filter(|e| e.group() == ElementGroup::Edges)
    }
}

/// Failure body: `{ "error": "..." }`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_inferred_from_source() {
        let resp: EnumerationResponse = serde_json::from_value(json!({
            "elements": [
                {"data": {"id": "vpc-1", "type": "vpc", "label": "VPC"}},
                {"data": {"id": "e1", "source": "a", "target": "b", "category": "network"}}
            ]
        }))
        .unwrap();

        assert_eq!(resp.elements[0].group(), ElementGroup::Nodes);
        assert_eq!(resp.elements[1].group(), ElementGroup::Edges);
        assert_eq!(resp.node_records().count(), 1);
        assert_eq!(resp.edge_records().count(), 1);
    }

    #[test]
    fn test_explicit_group_wins() {
        let record: ElementRecord =
            serde_json::from_value(json!({"group": "nodes", "data": {"id": "x", "source": "odd"}}))
                .unwrap();
        assert_eq!(record.group(), ElementGroup::Nodes);
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let resp = EnumerationResponse::from_json("{}").unwrap();
        assert!(resp.elements.is_empty());
        assert!(resp.warnings.is_empty());
        assert!(resp.findings.is_empty());
    }
}
