// Security findings reported alongside the topology

use serde::{Deserialize, Serialize};
use skymap_client::FindingRecord;
use std::collections::BTreeMap;
use std::fmt;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

/// Ordered most urgent first, so sorting puts critical findings on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" | "moderate" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "info" | "informational" => Some(Severity::Info),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: Option<String>,
    pub severity: Severity,
    pub title: String,
    pub detail: Option<String>,
    /// Node or edge the finding is about.
    pub element_id: Option<String>,
}

impl From<&FindingRecord> for Finding {
    /// Unrecognised severities are kept as informational.
    fn from(record: &FindingRecord) -> Self {
        Self {
            id: record.id.clone(),
            severity: Severity::from_str(&record.severity).unwrap_or(Severity::Info),
            title: record.title.clone(),
            detail: record.detail.clone(),
            element_id: record.edge_id.clone().or_else(|| record.node_id.clone()),
        }
    }
}

/// Findings of the latest load, grouped by severity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindingsPanel {
    groups: BTreeMap<Severity, Vec<Finding>>,
}

impl FindingsPanel {
    pub fn from_records(records: &[FindingRecord]) -> Self {
        let mut panel = Self::default();
        panel.replace(records.iter().map(Finding::from));
        panel
    }

    pub fn replace(&mut self, findings: impl IntoIterator<Item = Finding>) {
        self.groups.clear();
        for finding in findings {
            self.groups.entry(finding.severity).or_default().push(finding);
        }
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn total(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.groups.get(&severity).map(Vec::len).unwrap_or(0)
    }

    /// Most severe group first.
    pub fn groups(&self) -> impl Iterator<Item = (Severity, &[Finding])> {
        self.groups.iter().map(|(s, f)| (*s, f.as_slice()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.groups.values().flatten()
    }

    pub fn for_element<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Finding> {
        self.iter()
            .filter(move |f| f.element_id.as_deref() == Some(id))
    }

    /// Plain-text report with a summary block and one entry per finding.
    pub fn render_text(&self) -> String {
        let mut report = String::new();

        report.push_str(RULE);
        report.push_str("FINDINGS SUMMARY\n");
        report.push_str(RULE);
        report.push('\n');
        report.push_str(&format!("Total Findings: {}\n\n", self.total()));
        for severity in Severity::ALL {
            let count = self.count(severity);
            if count > 0 {
                report.push_str(&format!("  {:<11}{}\n", format!("[{}]", severity), count));
            }
        }

        if self.is_empty() {
            return report;
        }

        report.push('\n');
        report.push_str(RULE);
        report.push_str("DETAILED FINDINGS\n");
        report.push_str(RULE);
        report.push('\n');
        for (idx, finding) in self.iter().enumerate() {
            report.push_str(&format!("[{}] {}\n", idx + 1, finding.title));
            report.push_str(&format!("Severity:     {}\n", finding.severity));
            if let Some(ref element) = finding.element_id {
                report.push_str(&format!("Element:      {}\n", element));
            }
            if let Some(ref detail) = finding.detail {
                report.push_str("\nDetail:\n");
                report.push_str(&wrap_text(detail, 80, "  "));
            }
            report.push('\n');
        }
        report
    }
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if !current_line.is_empty() && current_line.len() + word.len() + 1 > width - indent.len() {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }
        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(severity: &str, title: &str) -> FindingRecord {
        FindingRecord {
            severity: severity.to_string(),
            title: title.to_string(),
            detail: None,
            id: None,
            node_id: None,
            edge_id: None,
        }
    }

    #[test]
    fn test_severity_ordering_and_parse() {
        assert!(Severity::Critical < Severity::Info);
        assert_eq!(Severity::from_str("HIGH"), Some(Severity::High));
        assert_eq!(Severity::from_str("informational"), Some(Severity::Info));
        assert_eq!(Severity::from_str("bogus"), None);
        assert_eq!(Severity::Medium.to_string(), "MEDIUM");
    }

    #[test]
    fn test_panel_groups_most_severe_first() {
        let panel = FindingsPanel::from_records(&[
            record("Low", "Unused security group"),
            record("Critical", "Public database"),
            record("High", "SSH open to world"),
            record("weird", "Something else"),
        ]);
        let order: Vec<Severity> = panel.groups().map(|(s, _)| s).collect();
        assert_eq!(
            order,
            vec![Severity::Critical, Severity::High, Severity::Low, Severity::Info]
        );
        assert_eq!(panel.total(), 4);
        assert_eq!(panel.iter().next().unwrap().title, "Public database");
    }

    #[test]
    fn test_element_reference_prefers_edge() {
        let mut rec = record("High", "Open ingress");
        rec.node_id = Some("sg-1".into());
        rec.edge_id = Some("e-7".into());
        let finding = Finding::from(&rec);
        assert_eq!(finding.element_id.as_deref(), Some("e-7"));

        let panel = FindingsPanel::from_records(&[rec]);
        assert_eq!(panel.for_element("e-7").count(), 1);
    }

    #[test]
    fn test_render_text() {
        let mut rec = record("High", "SSH open to world");
        rec.detail = Some("sg-1 allows tcp/22 from 0.0.0.0/0".into());
        let text = FindingsPanel::from_records(&[rec]).render_text();
        assert!(text.contains("Total Findings: 1"));
        assert!(text.contains("[HIGH]"));
        assert!(text.contains("  sg-1 allows tcp/22 from 0.0.0.0/0"));

        let empty = FindingsPanel::default().render_text();
        assert!(empty.contains("Total Findings: 0"));
        assert!(!empty.contains("DETAILED"));
    }
}
