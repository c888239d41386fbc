// Export: SVG and PNG snapshots of the rendered graph, plus structured JSON

use crate::error::ExportError;
use crate::filter::VisibilityMap;
use crate::inspect::SelectionInspector;
use crate::layout::{Layout, Point, Rect};
use crate::model::ElementRef;
use crate::store::GraphStore;
use crate::style::{ElementState, LabelPosition, LineStyle, ResolvedStyle, Shape, StyleResolver};
use resvg::tiny_skia::{Pixmap, Transform};
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const EMPTY_CANVAS: f32 = 64.0;
const ARROW_LENGTH: f32 = 8.0;
const ARROW_HALF_WIDTH: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Svg,
    Json,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "svg" => Some(ExportFormat::Svg),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Result<Self, ExportError> {
        Self::from_str(s).ok_or_else(|| ExportError::UnknownFormat(s.to_string()))
    }

    /// Guess from a file name's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub scale: f32,
    pub background: String,
    pub padding: f32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            background: "#ffffff".to_string(),
            padding: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportArtifact {
    Png(Vec<u8>),
    Svg(String),
    Json(String),
}

impl ExportArtifact {
    pub fn format(&self) -> ExportFormat {
        match self {
            ExportArtifact::Png(_) => ExportFormat::Png,
            ExportArtifact::Svg(_) => ExportFormat::Svg,
            ExportArtifact::Json(_) => ExportFormat::Json,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ExportArtifact::Png(bytes) => bytes,
            ExportArtifact::Svg(text) | ExportArtifact::Json(text) => text.as_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<(), ExportError> {
        fs::write(path, self.as_bytes()).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved {} export to {}", self.format().extension(), path.display());
        Ok(())
    }
}

/// Everything needed to draw the current view. Borrowed, never mutated.
pub struct Scene<'a> {
    pub store: &'a GraphStore,
    pub layout: &'a Layout,
    pub visibility: &'a VisibilityMap,
    pub resolver: &'a StyleResolver,
    pub selection: &'a SelectionInspector,
}

impl Scene<'_> {
    pub fn state_of(&self, id: &str) -> ElementState {
        let flags = self.visibility.flags(id);
        ElementState {
            selected: self.selection.is_selected(id),
            dimmed: flags.dimmed,
            hidden: flags.hidden,
            is_parent: self.store.is_parent(id),
        }
    }

    pub fn style_of(&self, element: ElementRef<'_>) -> ResolvedStyle {
        self.resolver.resolve(element, self.state_of(element.id()))
    }
}

pub fn export(scene: &Scene<'_>, format: ExportFormat, options: &ExportOptions) -> Result<ExportArtifact, ExportError> {
    let artifact = match format {
        ExportFormat::Svg => ExportArtifact::Svg(render_svg(scene, options)?),
        ExportFormat::Png => ExportArtifact::Png(render_png(scene, options)?),
        ExportFormat::Json => ExportArtifact::Json(export_structured(scene.store, scene.layout)?),
    };
    debug!("Exported {} bytes of {}", artifact.len(), format.extension());
    Ok(artifact)
}

/// Draw order: containers outermost first, then edges, then leaf nodes.
/// Hidden elements are skipped; dimmed ones keep their faded opacity.
pub fn render_svg(scene: &Scene<'_>, options: &ExportOptions) -> Result<String, ExportError> {
    let padding = options.padding.max(0.0);
    let bounds = scene.layout.bounds();
    let (width, height, dx, dy) = if scene.layout.is_empty() {
        let side = (padding * 2.0).max(EMPTY_CANVAS);
        (side, side, 0.0, 0.0)
    } else {
        (
            bounds.width + padding * 2.0,
            bounds.height + padding * 2.0,
            padding - bounds.left(),
            padding - bounds.top(),
        )
    };

    let mut svg = String::new();
    write!(
        svg,
        r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}" font-family="Inter, system-ui, sans-serif">
  <rect width="100%" height="100%" fill="{}" />
"##,
        width,
        height,
        width,
        height,
        escape_xml(&options.background)
    )?;

    let mut nodes: Vec<(usize, bool, ElementRef<'_>, Rect)> = scene
        .store
        .nodes()
        .filter_map(|n| {
            let rect = scene.layout.rect(&n.id)?.translate(dx, dy);
            Some((scene.store.depth(&n.id), scene.store.is_parent(&n.id), ElementRef::Node(n), rect))
        })
        .collect();
    nodes.sort_by_key(|(depth, _, _, _)| *depth);

    for (_, _, element, rect) in nodes.iter().filter(|(_, parent, _, _)| *parent) {
        let style = scene.style_of(*element);
        if style.visible {
            write_node(&mut svg, &rect, &style)?;
        }
    }

    for edge in scene.store.edges() {
        let element = ElementRef::Edge(edge);
        let style = scene.style_of(element);
        if !style.visible {
            continue;
        }
        let (Some(from), Some(to)) = (
            scene.layout.rect(&edge.source).map(|r| r.translate(dx, dy)),
            scene.layout.rect(&edge.target).map(|r| r.translate(dx, dy)),
        ) else {
            continue;
        };
        write_edge(&mut svg, &from, &to, &style)?;
    }

    for (_, _, element, rect) in nodes.iter().filter(|(_, parent, _, _)| !*parent) {
        let style = scene.style_of(*element);
        if style.visible {
            write_node(&mut svg, &rect, &style)?;
        }
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

pub fn render_png(scene: &Scene<'_>, options: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    let scale = options.scale;
    if !(scale.is_finite() && scale > 0.0) {
        return Err(ExportError::Raster(
            "scale must be greater than zero when rendering PNG output".to_string(),
        ));
    }

    let svg = render_svg(scene, options)?;

    let mut usvg_options = resvg::usvg::Options::default();
    usvg_options.fontdb_mut().load_system_fonts();
    let tree = resvg::usvg::Tree::from_str(&svg, &usvg_options)
        .map_err(|err| ExportError::Raster(format!("failed to parse generated SVG: {err}")))?;

    let size = tree.size().to_int_size();
    let scaled_width = (size.width() as f32 * scale).ceil();
    let scaled_height = (size.height() as f32 * scale).ceil();
    if scaled_width < 1.0 || scaled_height < 1.0 {
        return Err(ExportError::Raster(
            "scaled dimensions collapsed below 1px; try a larger scale factor".to_string(),
        ));
    }
    if scaled_width > u32::MAX as f32 || scaled_height > u32::MAX as f32 {
        return Err(ExportError::Raster(
            "scaled dimensions exceed supported limits; try a smaller scale factor".to_string(),
        ));
    }

    let (w, h) = (scaled_width as u32, scaled_height as u32);
    let mut pixmap = Pixmap::new(w, h)
        .ok_or_else(|| ExportError::Raster(format!("failed to allocate {w}x{h} surface")))?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|err| ExportError::Raster(format!("failed to encode PNG output: {err}")))
}

/// `{"elements": [...]}` with every element in the store, regardless of
/// filters. Nodes carry their laid-out position when there is one.
pub fn export_structured(store: &GraphStore, layout: &Layout) -> Result<String, ExportError> {
    let mut elements: Vec<Value> = Vec::with_capacity(store.node_count() + store.edge_count());
    for node in store.nodes() {
        let mut element = json!({"group": "nodes", "data": node.to_data()});
        if let Some(Point { x, y }) = layout.position(&node.id) {
            element["position"] = json!({"x": x, "y": y});
        }
        elements.push(element);
    }
    for edge in store.edges() {
        elements.push(json!({"group": "edges", "data": edge.to_data()}));
    }
    Ok(serde_json::to_string_pretty(&json!({ "elements": elements }))?)
}

fn write_node(svg: &mut String, rect: &Rect, style: &ResolvedStyle) -> std::fmt::Result {
    let (x, y, w, h) = (rect.x, rect.y, rect.width, rect.height);
    let paint = format!(
        "fill=\"{}\" fill-opacity=\"{:.2}\" stroke=\"{}\" stroke-width=\"{:.1}\"",
        escape_xml(&style.fill_color),
        style.fill_opacity,
        escape_xml(&style.border_color),
        style.border_width
    );
    writeln!(svg, "  <g opacity=\"{:.2}\">", style.opacity)?;
    match style.shape {
        Shape::Ellipse => writeln!(
            svg,
            "    <ellipse cx=\"{:.1}\" cy=\"{:.1}\" rx=\"{:.1}\" ry=\"{:.1}\" {} />",
            x,
            y,
            w / 2.0,
            h / 2.0,
            paint
        )?,
        Shape::RoundRectangle | Shape::Rectangle => {
            let radius = if style.shape == Shape::RoundRectangle { 8.0 } else { 0.0 };
            writeln!(
                svg,
                "    <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" rx=\"{:.0}\" ry=\"{:.0}\" {} />",
                rect.left(),
                rect.top(),
                w,
                h,
                radius,
                radius,
                paint
            )?
        }
        Shape::Hexagon | Shape::Triangle | Shape::Diamond => {
            let points = polygon_points(style.shape, rect);
            let joined: Vec<String> = points
                .iter()
                .map(|p| format!("{:.1},{:.1}", p.x, p.y))
                .collect();
            writeln!(svg, "    <polygon points=\"{}\" {} />", joined.join(" "), paint)?
        }
    }

    if !style.label.is_empty() {
        let label_y = match style.label_position {
            LabelPosition::Center => y + style.font_size / 3.0,
            LabelPosition::Top => rect.top() + style.font_size + 4.0,
        };
        writeln!(
            svg,
            "    <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"{:.0}\" fill=\"#111827\">{}</text>",
            x,
            label_y,
            style.font_size,
            escape_xml(&style.label)
        )?;
    }
    writeln!(svg, "  </g>")
}

fn polygon_points(shape: Shape, rect: &Rect) -> Vec<Point> {
    let (l, r, t, b) = (rect.left(), rect.right(), rect.top(), rect.bottom());
    let (x, y) = (rect.x, rect.y);
    let quarter = rect.width / 4.0;
    match shape {
        Shape::Hexagon => vec![
            Point { x: l, y },
            Point { x: l + quarter, y: t },
            Point { x: r - quarter, y: t },
            Point { x: r, y },
            Point { x: r - quarter, y: b },
            Point { x: l + quarter, y: b },
        ],
        Shape::Triangle => vec![Point { x, y: t }, Point { x: r, y: b }, Point { x: l, y: b }],
        _ => vec![Point { x, y: t }, Point { x: r, y }, Point { x, y: b }, Point { x: l, y }],
    }
}

fn write_edge(svg: &mut String, from: &Rect, to: &Rect, style: &ResolvedStyle) -> std::fmt::Result {
    let start = boundary_point(from, to.center());
    let end = boundary_point(to, from.center());
    let (dx, dy) = (end.x - start.x, end.y - start.y);
    let length = (dx * dx + dy * dy).sqrt();

    let dash = match style.line_style {
        LineStyle::Solid => String::new(),
        LineStyle::Dashed => " stroke-dasharray=\"6 4\"".to_string(),
        LineStyle::Dotted => " stroke-dasharray=\"2 3\"".to_string(),
    };
    let color = escape_xml(&style.line_color);

    writeln!(svg, "  <g opacity=\"{:.2}\">", style.opacity)?;
    writeln!(
        svg,
        "    <line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"{:.1}\"{} />",
        start.x, start.y, end.x, end.y, color, style.line_width, dash
    )?;

    if style.target_arrow && length > ARROW_LENGTH {
        let (ux, uy) = (dx / length, dy / length);
        let base = Point {
            x: end.x - ux * ARROW_LENGTH,
            y: end.y - uy * ARROW_LENGTH,
        };
        writeln!(
            svg,
            "    <polygon points=\"{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}\" fill=\"{}\" />",
            end.x,
            end.y,
            base.x - uy * ARROW_HALF_WIDTH,
            base.y + ux * ARROW_HALF_WIDTH,
            base.x + uy * ARROW_HALF_WIDTH,
            base.y - ux * ARROW_HALF_WIDTH,
            color
        )?;
    }

    if !style.label.is_empty() {
        writeln!(
            svg,
            "    <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-size=\"{:.0}\" fill=\"#374151\">{}</text>",
            (start.x + end.x) / 2.0,
            (start.y + end.y) / 2.0 - 3.0,
            style.font_size,
            escape_xml(&style.label)
        )?;
    }
    writeln!(svg, "  </g>")
}

/// Where the ray from `rect`'s centre towards `toward` leaves the box.
/// Points inside the box (nested elements) keep the centre.
fn boundary_point(rect: &Rect, toward: Point) -> Point {
    let (dx, dy) = (toward.x - rect.x, toward.y - rect.y);
    let tx = if dx.abs() > f32::EPSILON { (rect.width / 2.0) / dx.abs() } else { f32::INFINITY };
    let ty = if dy.abs() > f32::EPSILON { (rect.height / 2.0) / dy.abs() } else { f32::INFINITY };
    let t = tx.min(ty);
    if !t.is_finite() || t >= 1.0 {
        return rect.center();
    }
    Point {
        x: rect.x + dx * t,
        y: rect.y + dy * t,
    }
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterEngine;
    use crate::layout::LayoutSelector;
    use crate::model::{Edge, EdgeCategory, Node, NodeType};

    fn loaded() -> (GraphStore, Layout, VisibilityMap) {
        let mut store = GraphStore::new();
        store.replace_all(
            vec![
                Node::new("vpc-1", NodeType::Vpc, "main <prod>"),
                Node::new("i-1", NodeType::Instance, "web-1").with_parent("vpc-1"),
                Node::new("sg-1", NodeType::SecurityGroup, "web-sg"),
            ],
            vec![
                Edge::new("e1", "i-1", "sg-1", EdgeCategory::Resource).with_label("attach"),
                Edge::new("e2", "sg-1", "i-1", EdgeCategory::Network).with_label("tcp/443"),
            ],
        );
        let visibility = FilterEngine::default().compute(&store);
        let layout = LayoutSelector::default().run(&store, &visibility);
        (store, layout, visibility)
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(ExportFormat::from_str("PNG"), Some(ExportFormat::Png));
        assert_eq!(ExportFormat::from_str(".json"), Some(ExportFormat::Json));
        assert!(matches!(ExportFormat::parse("gif"), Err(ExportError::UnknownFormat(_))));
        assert_eq!(
            ExportFormat::from_path(Path::new("out/graph.svg")),
            Some(ExportFormat::Svg)
        );
    }

    #[test]
    fn test_svg_contains_visible_elements_escaped() {
        let (store, layout, visibility) = loaded();
        let resolver = StyleResolver::default();
        let selection = SelectionInspector::new();
        let scene = Scene {
            store: &store,
            layout: &layout,
            visibility: &visibility,
            resolver: &resolver,
            selection: &selection,
        };
        let svg = render_svg(&scene, &ExportOptions::default()).unwrap();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains("main &lt;prod&gt;"));
        assert!(svg.contains("tcp/443"));
        assert!(svg.contains("<polygon"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_svg_skips_hidden_edges() {
        let (store, layout, _) = loaded();
        let mut filter = FilterEngine::default();
        filter.set_category(EdgeCategory::Network, false);
        let visibility = filter.compute(&store);
        let resolver = StyleResolver::default();
        let selection = SelectionInspector::new();
        let scene = Scene {
            store: &store,
            layout: &layout,
            visibility: &visibility,
            resolver: &resolver,
            selection: &selection,
        };
        let svg = render_svg(&scene, &ExportOptions::default()).unwrap();
        assert!(!svg.contains("tcp/443"));
        assert!(svg.contains("attach"));
    }

    #[test]
    fn test_empty_graph_exports() {
        let store = GraphStore::new();
        let layout = Layout::default();
        let visibility = VisibilityMap::default();
        let resolver = StyleResolver::default();
        let selection = SelectionInspector::new();
        let scene = Scene {
            store: &store,
            layout: &layout,
            visibility: &visibility,
            resolver: &resolver,
            selection: &selection,
        };

        let svg = render_svg(&scene, &ExportOptions::default()).unwrap();
        assert!(svg.contains("width=\"80\""));

        let json = export_structured(&store, &layout).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, json!({"elements": []}));

        let png = render_png(&scene, &ExportOptions::default()).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn test_structured_export_lists_all_elements() {
        let (store, layout, _) = loaded();
        let json = export_structured(&store, &layout).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        let elements = value["elements"].as_array().unwrap();
        assert_eq!(elements.len(), 5);
        assert_eq!(elements[0]["group"], "nodes");
        assert!(elements[0]["position"]["x"].is_number());
        assert_eq!(elements[1]["data"]["parent"], "vpc-1");
        assert_eq!(elements[3]["data"]["category"], "resource");
    }

    #[test]
    fn test_png_rejects_bad_scale() {
        let (store, layout, visibility) = loaded();
        let resolver = StyleResolver::default();
        let selection = SelectionInspector::new();
        let scene = Scene {
            store: &store,
            layout: &layout,
            visibility: &visibility,
            resolver: &resolver,
            selection: &selection,
        };
        let options = ExportOptions {
            scale: 0.0,
            ..Default::default()
        };
        assert!(matches!(render_png(&scene, &options), Err(ExportError::Raster(_))));
    }
}
