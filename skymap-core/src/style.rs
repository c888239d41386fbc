// Declarative styling: ordered rules resolved per element and state

use crate::model::{Edge, EdgeCategory, ElementRef, Node, NodeType};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Ellipse,
    RoundRectangle,
    Rectangle,
    Hexagon,
    Triangle,
    Diamond,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Ellipse => "ellipse",
            Shape::RoundRectangle => "round-rectangle",
            Shape::Rectangle => "rectangle",
            Shape::Hexagon => "hexagon",
            Shape::Triangle => "triangle",
            Shape::Diamond => "diamond",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
}

impl LineStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineStyle::Solid => "solid",
            LineStyle::Dashed => "dashed",
            LineStyle::Dotted => "dotted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelPosition {
    Center,
    Top,
}

/// Rules apply in phase order; inside a phase, in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RulePhase {
    Base,
    Type,
    Category,
    Structure,
    State,
    Selection,
}

/// Which elements a rule applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    AnyNode,
    AnyEdge,
    NodeType(NodeType),
    Category(EdgeCategory),
    EdgeType(String),
    Derived,
    Parent,
    Selected,
    Dimmed,
    Hidden,
    All(Vec<Selector>),
}

impl Selector {
    pub fn matches(&self, subject: &StyleSubject<'_>) -> bool {
        match self {
            Selector::AnyNode => subject.element.is_node(),
            Selector::AnyEdge => !subject.element.is_node(),
            Selector::NodeType(t) => subject
                .element
                .as_node()
                .is_some_and(|n| &n.node_type == t),
            Selector::Category(c) => subject
                .element
                .as_edge()
                .is_some_and(|e| e.category() == *c),
            Selector::EdgeType(t) => subject.element.as_edge().is_some_and(|e| &e.edge_type == t),
            Selector::Derived => subject.element.as_edge().is_some_and(|e| e.derived),
            Selector::Parent => subject.element.is_node() && subject.state.is_parent,
            Selector::Selected => subject.state.selected,
            Selector::Dimmed => subject.state.dimmed,
            Selector::Hidden => subject.state.hidden,
            Selector::All(parts) => parts.iter().all(|s| s.matches(subject)),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::AnyNode => write!(f, "node"),
            Selector::AnyEdge => write!(f, "edge"),
            Selector::NodeType(t) => write!(f, "node[type = \"{}\"]", t),
            Selector::Category(c) => write!(f, "edge[category = \"{}\"]", c),
            Selector::EdgeType(t) => write!(f, "edge[type = \"{}\"]", t),
            Selector::Derived => write!(f, "edge[?derived]"),
            Selector::Parent => write!(f, ":parent"),
            Selector::Selected => write!(f, ":selected"),
            Selector::Dimmed => write!(f, ".dimmed"),
            Selector::Hidden => write!(f, ".hidden"),
            Selector::All(parts) => {
                for part in parts {
                    write!(f, "{}", part)?;
                }
                Ok(())
            }
        }
    }
}

/// One visual property assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Shape(Shape),
    FillColor(String),
    FillOpacity(f32),
    BorderColor(String),
    BorderWidth(f32),
    LineColor(String),
    LineStyle(LineStyle),
    LineWidth(f32),
    TargetArrow(bool),
    Opacity(f32),
    FontSize(f32),
    LabelPosition(LabelPosition),
    Display(bool),
}

impl Declaration {
    fn apply(&self, style: &mut ResolvedStyle) {
        match self {
            Declaration::Shape(s) => style.shape = *s,
            Declaration::FillColor(c) => style.fill_color = c.clone(),
            Declaration::FillOpacity(o) => style.fill_opacity = *o,
            Declaration::BorderColor(c) => style.border_color = c.clone(),
            Declaration::BorderWidth(w) => style.border_width = *w,
            Declaration::LineColor(c) => style.line_color = c.clone(),
            Declaration::LineStyle(s) => style.line_style = *s,
            Declaration::LineWidth(w) => style.line_width = *w,
            Declaration::TargetArrow(a) => style.target_arrow = *a,
            Declaration::Opacity(o) => style.opacity = *o,
            Declaration::FontSize(s) => style.font_size = *s,
            Declaration::LabelPosition(p) => style.label_position = *p,
            Declaration::Display(d) => style.visible = *d,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selector: Selector,
    pub declarations: Vec<Declaration>,
    pub phase: RulePhase,
    order: usize,
}

impl StyleRule {
    pub fn priority(&self) -> (RulePhase, usize) {
        (self.phase, self.order)
    }
}

/// Runtime state that feeds styling; not part of the stored element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElementState {
    pub selected: bool,
    pub dimmed: bool,
    pub hidden: bool,
    pub is_parent: bool,
}

pub struct StyleSubject<'a> {
    pub element: ElementRef<'a>,
    pub state: ElementState,
}

/// Concrete visual attributes for one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyle {
    pub label: String,
    pub shape: Shape,
    pub fill_color: String,
    pub fill_opacity: f32,
    pub border_color: String,
    pub border_width: f32,
    pub line_color: String,
    pub line_style: LineStyle,
    pub line_width: f32,
    pub target_arrow: bool,
    pub opacity: f32,
    pub font_size: f32,
    pub label_position: LabelPosition,
    pub visible: bool,
}

impl Default for ResolvedStyle {
    fn default() -> Self {
        Self {
            label: String::new(),
            shape: Shape::Ellipse,
            fill_color: "#9ca3af".to_string(),
            fill_opacity: 1.0,
            border_color: "#334155".to_string(),
            border_width: 1.0,
            line_color: "#94a3b8".to_string(),
            line_style: LineStyle::Solid,
            line_width: 2.0,
            target_arrow: true,
            opacity: 1.0,
            font_size: 10.0,
            label_position: LabelPosition::Center,
            visible: true,
        }
    }
}

pub const DIMMED_OPACITY: f32 = 0.15;
pub const SELECTED_BORDER: &str = "#111827";
pub const CONTAINER_COLOR: &str = "#16a34a";
pub const RESOURCE_COLOR: &str = "#2563eb";
pub const NETWORK_COLOR: &str = "#ea580c";
pub const DATA_COLOR: &str = "#059669";

/// Shape and colour for the resource kinds that have a dedicated look.
pub fn type_palette(node_type: &NodeType) -> Option<(Shape, &'static str)> {
    use NodeType::*;
    let entry = match node_type {
        Vpc => (Shape::RoundRectangle, CONTAINER_COLOR),
        Subnet => (Shape::RoundRectangle, "#22c55e"),
        Instance => (Shape::RoundRectangle, "#10b981"),
        SecurityGroup => (Shape::Hexagon, "#a855f7"),
        RouteTable => (Shape::RoundRectangle, "#15803d"),
        Igw => (Shape::Triangle, "#ef4444"),
        NatGateway => (Shape::Triangle, "#f59e0b"),
        Eni => (Shape::Ellipse, "#64748b"),
        LoadBalancer => (Shape::RoundRectangle, "#0ea5e9"),
        TargetGroup => (Shape::RoundRectangle, "#6366f1"),
        Lambda => (Shape::Diamond, "#fb7185"),
        ApiGw | ApiGwV2 => (Shape::RoundRectangle, "#f97316"),
        RdsInstance => (Shape::RoundRectangle, "#1d4ed8"),
        DynamodbTable => (Shape::RoundRectangle, "#6366f1"),
        SqsQueue => (Shape::RoundRectangle, "#06b6d4"),
        SnsTopic => (Shape::RoundRectangle, "#14b8a6"),
        KinesisStream => (Shape::RoundRectangle, "#0ea5e9"),
        EcsCluster | EcsService => (Shape::RoundRectangle, "#ef43ba"),
        EcrRepo => (Shape::RoundRectangle, "#ff8fab"),
        Cloudfront | Route53Zone => (Shape::RoundRectangle, "#94a3b8"),
        Opensearch => (Shape::RoundRectangle, "#0ea5e9"),
        Elasticache => (Shape::RoundRectangle, "#ef4444"),
        MskCluster => (Shape::RoundRectangle, "#f59e0b"),
        S3Bucket => (Shape::RoundRectangle, "#84cc16"),
        Cidr | PrefixList | External => (Shape::Ellipse, "#e5e7eb"),
        Account => (Shape::RoundRectangle, "#0f766e"),
        Region => (Shape::RoundRectangle, "#4d7c0f"),
        Other(_) => return None,
    };
    Some(entry)
}

pub fn category_color(category: EdgeCategory) -> &'static str {
    match category {
        EdgeCategory::Resource => RESOURCE_COLOR,
        EdgeCategory::Network => NETWORK_COLOR,
        EdgeCategory::Data => DATA_COLOR,
    }
}

/// Ordered rule table mapping (element, state) to a [`ResolvedStyle`].
#[derive(Debug, Clone)]
pub struct StyleResolver {
    rules: Vec<StyleRule>,
}

impl Default for StyleResolver {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

impl StyleResolver {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_default_rules() -> Self {
        let mut resolver = Self::empty();

        resolver.push_rule(
            Selector::AnyNode,
            RulePhase::Base,
            vec![
                Declaration::Shape(Shape::Ellipse),
                Declaration::FillColor("#9ca3af".into()),
                Declaration::BorderColor("#334155".into()),
                Declaration::BorderWidth(1.0),
                Declaration::FontSize(10.0),
            ],
        );
        resolver.push_rule(
            Selector::AnyEdge,
            RulePhase::Base,
            vec![
                Declaration::LineColor("#94a3b8".into()),
                Declaration::LineWidth(2.0),
                Declaration::TargetArrow(true),
                Declaration::FontSize(9.0),
            ],
        );

        for node_type in NodeType::KNOWN.iter() {
            if let Some((shape, color)) = type_palette(node_type) {
                resolver.push_rule(
                    Selector::NodeType(node_type.clone()),
                    RulePhase::Type,
                    vec![
                        Declaration::Shape(shape),
                        Declaration::FillColor(color.into()),
                    ],
                );
            }
        }
        resolver.push_rule(
            Selector::NodeType(NodeType::Vpc),
            RulePhase::Type,
            vec![
                Declaration::FillOpacity(0.08),
                Declaration::BorderColor(CONTAINER_COLOR.into()),
                Declaration::BorderWidth(2.0),
            ],
        );

        for category in EdgeCategory::ALL {
            resolver.push_rule(
                Selector::Category(category),
                RulePhase::Category,
                vec![Declaration::LineColor(category_color(category).into())],
            );
        }
        resolver.push_rule(
            Selector::Derived,
            RulePhase::Category,
            vec![Declaration::LineStyle(LineStyle::Dashed)],
        );

        resolver.push_rule(
            Selector::Parent,
            RulePhase::Structure,
            vec![
                Declaration::Shape(Shape::RoundRectangle),
                Declaration::FillColor(CONTAINER_COLOR.into()),
                Declaration::FillOpacity(0.08),
                Declaration::BorderColor(CONTAINER_COLOR.into()),
                Declaration::BorderWidth(2.0),
                Declaration::LabelPosition(LabelPosition::Top),
            ],
        );

        resolver.push_rule(
            Selector::Dimmed,
            RulePhase::State,
            vec![Declaration::Opacity(DIMMED_OPACITY)],
        );
        resolver.push_rule(
            Selector::Hidden,
            RulePhase::State,
            vec![Declaration::Display(false)],
        );

        resolver.push_rule(
            Selector::All(vec![Selector::AnyNode, Selector::Selected]),
            RulePhase::Selection,
            vec![
                Declaration::BorderColor(SELECTED_BORDER.into()),
                Declaration::BorderWidth(3.0),
            ],
        );
        resolver.push_rule(
            Selector::All(vec![Selector::AnyEdge, Selector::Selected]),
            RulePhase::Selection,
            vec![
                Declaration::LineColor(SELECTED_BORDER.into()),
                Declaration::LineWidth(3.0),
            ],
        );

        resolver
    }

    /// Append a rule; it outranks earlier rules of the same phase.
    pub fn push_rule(&mut self, selector: Selector, phase: RulePhase, declarations: Vec<Declaration>) {
        let order = self.rules.len();
        self.rules.push(StyleRule {
            selector,
            declarations,
            phase,
            order,
        });
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    /// Per property, the highest-priority matching rule wins.
    pub fn resolve(&self, element: ElementRef<'_>, state: ElementState) -> ResolvedStyle {
        self.resolve_where(element, state, |_| true)
    }

    fn resolve_where<F>(&self, element: ElementRef<'_>, state: ElementState, keep: F) -> ResolvedStyle
    where
        F: Fn(&StyleRule) -> bool,
    {
        let subject = StyleSubject { element, state };
        let mut matching: Vec<&StyleRule> = self
            .rules
            .iter()
            .filter(|r| keep(r) && r.selector.matches(&subject))
            .collect();
        matching.sort_by_key(|r| r.priority());

        let mut style = ResolvedStyle {
            label: element.label().to_string(),
            ..Default::default()
        };
        for rule in matching {
            for declaration in &rule.declarations {
                declaration.apply(&mut style);
            }
        }
        style
    }

    /// Look of a plain, unselected leaf node of the given kind.
    pub fn node_type_style(&self, node_type: &NodeType) -> ResolvedStyle {
        let probe = Node::new("", node_type.clone(), node_type.display_name());
        self.resolve(ElementRef::Node(&probe), ElementState::default())
    }

    /// Line colour of a plain, non-derived edge of `category`.
    pub fn legend_color_for(&self, category: EdgeCategory) -> String {
        let probe = Edge::new("", "", "", category);
        self.resolve(ElementRef::Edge(&probe), ElementState::default())
            .line_color
    }

    /// Look shared by derived edges of any category. Category rules are skipped.
    pub fn derived_edge_style(&self) -> ResolvedStyle {
        let probe = Edge::new("", "", "", EdgeCategory::Resource).with_derived(true);
        self.resolve_where(ElementRef::Edge(&probe), ElementState::default(), |r| {
            !matches!(r.selector, Selector::Category(_))
        })
    }
}
