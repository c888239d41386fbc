// Side panes: element list, inspector and findings

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use skymap_core::inspect::InspectorView;
use skymap_core::{Severity, ViewModel};

/// One line of the element pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRow {
    pub id: String,
    pub text: String,
    pub dimmed: bool,
    pub selected: bool,
}

/// Nodes indented under their parents, then visible edges. Hidden edges are left out.
pub fn element_rows(vm: &ViewModel) -> Vec<ElementRow> {
    let store = vm.store();
    let visibility = vm.visibility();
    let selection = vm.selection();

    let mut rows = Vec::with_capacity(store.node_count() + store.edge_count());
    let mut stack: Vec<&str> = store
        .nodes()
        .filter(|n| n.parent.is_none())
        .map(|n| n.id.as_str())
        .collect();
    stack.reverse();
    while let Some(id) = stack.pop() {
        let Some(node) = store.node(id) else {
            continue;
        };
        let depth = store.depth(id);
        rows.push(ElementRow {
            id: node.id.clone(),
            text: format!(
                "{}[{}] {} ({})",
                "  ".repeat(depth),
                node.node_type,
                node.label,
                node.id
            ),
            dimmed: visibility.is_dimmed(id),
            selected: selection.iter().any(|s| s == id),
        });
        stack.extend(store.children(id).iter().rev().map(String::as_str));
    }

    for edge in store.edges().filter(|e| !visibility.is_hidden(&e.id)) {
        let marker = if edge.derived { "⇢" } else { "→" };
        let label = if edge.label.is_empty() {
            String::new()
        } else {
            format!(" {}", edge.label)
        };
        rows.push(ElementRow {
            id: edge.id.clone(),
            text: format!(
                "{} {} {} [{}]{}",
                edge.source,
                marker,
                edge.target,
                edge.category(),
                label
            ),
            dimmed: visibility.is_dimmed(&edge.id),
            selected: selection.iter().any(|s| s == &edge.id),
        });
    }
    rows
}

pub fn render_elements(f: &mut Frame, area: Rect, vm: &ViewModel) {
    let rows = element_rows(vm);
    let title = format!(
        " Elements ({} nodes, {} edges) [{}] ",
        vm.store().node_count(),
        vm.store().edge_count(),
        vm.view_mode()
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let height = inner.height as usize;
    // Keep the focused element in view.
    let focus = vm.selection().last();
    let focus_index = focus.and_then(|id| rows.iter().position(|r| &r.id == id));
    let scroll_offset = match focus_index {
        Some(idx) if idx >= height => idx + 1 - height,
        _ => 0,
    };

    let items: Vec<ListItem> = rows
        .iter()
        .skip(scroll_offset)
        .take(height)
        .map(|row| {
            let mut style = if row.dimmed {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::White)
            };
            if row.selected {
                style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
            }
            ListItem::new(row.text.clone()).style(style)
        })
        .collect();

    f.render_widget(List::new(items), inner);
}

pub fn render_inspector(f: &mut Frame, area: Rect, vm: &ViewModel) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Inspector ")
        .border_style(Style::default().fg(Color::Magenta));

    let view = vm.inspector_view();
    let style = match view {
        InspectorView::Placeholder => Style::default().fg(Color::DarkGray),
        InspectorView::Element(_) => Style::default().fg(Color::White),
    };
    let lines: Vec<Line> = view.lines().into_iter().map(Line::from).collect();
    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(style)
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

pub fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Critical => Color::Red,
        Severity::High => Color::LightRed,
        Severity::Medium => Color::Yellow,
        Severity::Low => Color::Blue,
        Severity::Info => Color::Gray,
    }
}

pub fn render_findings(f: &mut Frame, area: Rect, vm: &ViewModel) {
    let panel = vm.findings();
    let title = format!(
        " Findings ({}) | Warnings ({}) ",
        panel.total(),
        vm.warnings().len()
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Yellow));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut items: Vec<ListItem> = Vec::new();
    for (severity, findings) in panel.groups() {
        let color = severity_color(severity);
        for finding in findings {
            let target = finding
                .element_id
                .as_deref()
                .map(|id| format!(" ({})", id))
                .unwrap_or_default();
            items.push(ListItem::new(Line::from(vec![
                Span::styled(
                    format!("[{:<8}] ", severity.to_string()),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!("{}{}", finding.title, target)),
            ])));
        }
    }
    if items.is_empty() {
        items.push(ListItem::new("No findings").style(Style::default().fg(Color::DarkGray)));
    }
    items.truncate(inner.height as usize);

    f.render_widget(List::new(items), inner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use skymap_client::EnumerationResponse;
    use skymap_core::EdgeCategory;

    fn loaded() -> ViewModel {
        let response = EnumerationResponse::from_json(
            r#"{"elements": [
                {"data": {"id": "vpc-1", "type": "vpc", "label": "main"}},
                {"data": {"id": "i-1", "type": "instance", "label": "web-1", "parent": "vpc-1"}},
                {"data": {"id": "b-1", "type": "s3_bucket", "label": "logs"}},
                {"data": {"id": "e1", "source": "i-1", "target": "b-1", "category": "data", "label": "put"}},
                {"data": {"id": "e2", "source": "i-1", "target": "vpc-1", "category": "network"}}
            ]}"#,
        )
        .unwrap();
        let mut vm = ViewModel::default();
        vm.load_response(response);
        vm
    }

    #[test]
    fn test_rows_nest_children_under_parents() {
        let rows = element_rows(&loaded());
        let texts: Vec<&str> = rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts[0], "[vpc] main (vpc-1)");
        assert_eq!(texts[1], "  [instance] web-1 (i-1)");
        assert_eq!(texts[2], "[s3_bucket] logs (b-1)");
        assert_eq!(texts[3], "i-1 → b-1 [data] put");
    }

    #[test]
    fn test_hidden_edges_omitted_and_dimmed_flagged() {
        let mut vm = loaded();
        vm.set_category(EdgeCategory::Data, false);
        vm.set_search("main");
        vm.select("vpc-1").unwrap();
        let rows = element_rows(&vm);
        assert!(rows.iter().all(|r| r.id != "e1"));
        let bucket = rows.iter().find(|r| r.id == "b-1").unwrap();
        assert!(bucket.dimmed);
        let vpc = rows.iter().find(|r| r.id == "vpc-1").unwrap();
        assert!(vpc.selected && !vpc.dimmed);
    }

    #[test]
    fn test_severity_colors() {
        assert_eq!(severity_color(Severity::Critical), Color::Red);
        assert_eq!(severity_color(Severity::Info), Color::Gray);
    }
}
