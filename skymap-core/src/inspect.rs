// Selection tracking and the detail view for the focused element

use crate::error::SelectionError;
use crate::model::ElementKind;
use crate::store::GraphStore;
use serde_json::{Map, Value};
use std::fmt::Write as _;

pub const PLACEHOLDER: &str = "Select a node or edge to inspect its details.";

/// Ordered selection; the last entry is the one shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionInspector {
    selected: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementDetails {
    pub kind: ElementKind,
    pub id: String,
    /// Everything known about the element, typed fields included.
    pub fields: Map<String, Value>,
    /// One line per statement of any IAM-style policy document found in the fields.
    pub policy_summary: Vec<String>,
    pub selection_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InspectorView {
    Placeholder,
    Element(ElementDetails),
}

impl SelectionInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-selecting an element moves it to the front of attention.
    pub fn select(&mut self, store: &GraphStore, id: &str) -> Result<(), SelectionError> {
        if !store.contains(id) {
            return Err(SelectionError::UnknownElement(id.to_string()));
        }
        self.selected.retain(|s| s != id);
        self.selected.push(id.to_string());
        Ok(())
    }

    pub fn deselect(&mut self, id: &str) -> bool {
        let before = self.selected.len();
        self.selected.retain(|s| s != id);
        before != self.selected.len()
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn selection(&self) -> &[String] {
        &self.selected
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|s| s == id)
    }

    pub fn focus(&self) -> Option<&str> {
        self.selected.last().map(String::as_str)
    }

    /// Drop ids that no longer exist in the store.
    pub fn prune(&mut self, store: &GraphStore) {
        self.selected.retain(|id| store.contains(id));
    }

    pub fn view(&self, store: &GraphStore) -> InspectorView {
        let Some(element) = self.focus().and_then(|id| store.element(id)) else {
            return InspectorView::Placeholder;
        };
        let fields = element.to_data();
        let policy_summary = collect_policies(&fields)
            .into_iter()
            .flat_map(summarize_policy)
            .collect();
        InspectorView::Element(ElementDetails {
            kind: element.kind(),
            id: element.id().to_string(),
            fields,
            policy_summary,
            selection_size: self.selected.len(),
        })
    }
}

impl InspectorView {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, InspectorView::Placeholder)
    }

    /// Indented `key: value` lines for terminal display.
    pub fn lines(&self) -> Vec<String> {
        match self {
            InspectorView::Placeholder => vec![PLACEHOLDER.to_string()],
            InspectorView::Element(details) => {
                let mut lines = vec![format!("{} {}", details.kind.as_str(), details.id)];
                if details.selection_size > 1 {
                    lines.push(format!("({} elements selected)", details.selection_size));
                }
                for (key, value) in &details.fields {
                    push_value_lines(&mut lines, key, value, 1);
                }
                if !details.policy_summary.is_empty() {
                    lines.push("policy:".to_string());
                    for statement in &details.policy_summary {
                        lines.push(format!("  - {}", statement));
                    }
                }
                lines
            }
        }
    }

    /// Pretty-printed JSON of the fields, or the placeholder text.
    pub fn to_pretty_json(&self) -> String {
        match self {
            InspectorView::Placeholder => PLACEHOLDER.to_string(),
            InspectorView::Element(details) => {
                serde_json::to_string_pretty(&Value::Object(details.fields.clone()))
                    .unwrap_or_else(|_| format!("{:?}", details.fields))
            }
        }
    }
}

fn push_value_lines(lines: &mut Vec<String>, key: &str, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth - 1);
    match value {
        Value::Object(map) if !map.is_empty() => {
            lines.push(format!("{}{}:", indent, key));
            for (k, v) in map {
                push_value_lines(lines, k, v, depth + 1);
            }
        }
        Value::Array(items) if items.iter().all(|v| !v.is_object() && !v.is_array()) => {
            let joined: Vec<String> = items.iter().map(scalar_text).collect();
            lines.push(format!("{}{}: [{}]", indent, key, joined.join(", ")));
        }
        Value::Array(items) => {
            lines.push(format!("{}{}:", indent, key));
            for (i, item) in items.iter().enumerate() {
                push_value_lines(lines, &format!("[{}]", i), item, depth + 1);
            }
        }
        other => lines.push(format!("{}{}: {}", indent, key, scalar_text(other))),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Policy documents live under any key containing "policy", at the top level
/// or inside `details`.
fn collect_policies(fields: &Map<String, Value>) -> Vec<&Value> {
    let mut found = Vec::new();
    let nested = fields.get("details").and_then(Value::as_object);
    for map in std::iter::once(fields).chain(nested) {
        for (key, value) in map {
            if key.to_lowercase().contains("policy") && !value.is_null() {
                found.push(value);
            }
        }
    }
    found
}

/// Render each statement as `"{Effect} {Action} on {Resource} for {Principal}"`.
pub fn summarize_policy(doc: &Value) -> Vec<String> {
    let parsed;
    let doc = match doc {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(v) => {
                parsed = v;
                &parsed
            }
            Err(_) => return vec!["<unparseable policy>".to_string()],
        },
        other => other,
    };

    let statements: Vec<&Value> = match doc.get("Statement") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => Vec::new(),
    };

    let mut out = Vec::with_capacity(statements.len());
    for statement in statements {
        let field = |key: &str| statement.get(key).map(policy_text);
        let principal = field("Principal")
            .or_else(|| field("NotPrincipal"))
            .unwrap_or_else(|| "(principal)".to_string());
        let mut line = String::new();
        let _ = write!(
            line,
            "{} {} on {} for {}",
            field("Effect").unwrap_or_else(|| "None".to_string()),
            field("Action").unwrap_or_else(|| "None".to_string()),
            field("Resource").unwrap_or_else(|| "None".to_string()),
            principal
        );
        if statement.get("Condition").is_some_and(has_content) {
            line.push_str(" with conditions");
        }
        out.push(line);
    }

    if out.is_empty() {
        out.push("(empty policy)".to_string());
    }
    out
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn policy_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(policy_text).collect();
            format!("[{}]", parts.join(", "))
        }
        other => other.to_string(),
    }
}
