// Layout: view modes, their parameter sets and the built-in compound layout engine

use crate::filter::VisibilityMap;
use crate::store::GraphStore;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::f32::consts::TAU;
use std::fmt;
use tracing::debug;

const LEAF_HEIGHT: f32 = 40.0;
const LEAF_MIN_WIDTH: f32 = 60.0;
const LEAF_MAX_WIDTH: f32 = 220.0;
const CHAR_WIDTH: f32 = 7.0;
const CONTAINER_PADDING: f32 = 24.0;
const CONTAINER_LABEL_BAND: f32 = 18.0;
const SPACING: f32 = 20.0;
const SPRING: f32 = 0.08;
const GRAVITY_SCALE: f32 = 0.05;
const MAX_PAIR_WORK: usize = 4_000_000;
const MIN_ITERATIONS: usize = 30;
const OVERLAP_PASSES: usize = 100;

/// How the topology is arranged on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewMode {
    /// Resources nested inside their VPC/subnet containers.
    #[default]
    ContainerGrouped,
    /// Directed left-to-right flow between services.
    LinearFlow,
    /// Account and region containers at the top level.
    Hierarchical,
}

impl ViewMode {
    pub const ALL: [ViewMode; 3] = [
        ViewMode::ContainerGrouped,
        ViewMode::LinearFlow,
        ViewMode::Hierarchical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::ContainerGrouped => "container-grouped",
            ViewMode::LinearFlow => "linear-flow",
            ViewMode::Hierarchical => "hierarchical",
        }
    }

    /// Short key used by the original view selector (`vpc`, `service`, `account`).
    pub fn key(&self) -> &'static str {
        match self {
            ViewMode::ContainerGrouped => "vpc",
            ViewMode::LinearFlow => "service",
            ViewMode::Hierarchical => "account",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "vpc" | "container" | "grouped" | "container-grouped" | "container_grouped" => {
                Some(ViewMode::ContainerGrouped)
            }
            "service" | "flow" | "linear" | "linear-flow" | "linear_flow" => {
                Some(ViewMode::LinearFlow)
            }
            "account" | "hierarchy" | "hierarchical" => Some(ViewMode::Hierarchical),
            _ => None,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            ViewMode::ContainerGrouped => ViewMode::LinearFlow,
            ViewMode::LinearFlow => ViewMode::Hierarchical,
            ViewMode::Hierarchical => ViewMode::ContainerGrouped,
        }
    }

    pub fn params(&self) -> LayoutParams {
        match self {
            ViewMode::ContainerGrouped => LayoutParams::Force(ForceParams::default()),
            ViewMode::LinearFlow => LayoutParams::Layered(LayeredParams::default()),
            ViewMode::Hierarchical => LayoutParams::Force(ForceParams {
                ideal_edge_length: 220.0,
                ..ForceParams::default()
            }),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceParams {
    pub repulsion: f32,
    pub ideal_edge_length: f32,
    pub gravity: f32,
    pub iterations: usize,
    /// Tile disconnected nodes in a grid instead of simulating them.
    pub tile: bool,
}

impl Default for ForceParams {
    fn default() -> Self {
        Self {
            repulsion: 60_000.0,
            ideal_edge_length: 200.0,
            gravity: 0.25,
            iterations: 1000,
            tile: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankDir {
    TopBottom,
    LeftRight,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayeredParams {
    pub rank_dir: RankDir,
    pub node_sep: f32,
    pub rank_sep: f32,
    pub edge_sep: f32,
}

impl Default for LayeredParams {
    fn default() -> Self {
        Self {
            rank_dir: RankDir::LeftRight,
            node_sep: 50.0,
            rank_sep: 100.0,
            edge_sep: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayoutParams {
    Force(ForceParams),
    Layered(LayeredParams),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Axis-aligned box given by its centre and size.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn from_corners(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            x: (left + right) / 2.0,
            y: (top + bottom) / 2.0,
            width: right - left,
            height: bottom - top,
        }
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }

    pub fn left(&self) -> f32 {
        self.x - self.width / 2.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn top(&self) -> f32 {
        self.y - self.height / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.left() >= self.left() - f32::EPSILON
            && other.right() <= self.right() + f32::EPSILON
            && other.top() >= self.top() - f32::EPSILON
            && other.bottom() <= self.bottom() + f32::EPSILON
    }

    /// True when the interiors intersect; touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_corners(
            self.left().min(other.left()),
            self.top().min(other.top()),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }
}

/// Computed positions: one box per laid-out node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    rects: BTreeMap<String, Rect>,
    bounds: Rect,
}

impl Layout {
    pub fn from_rects(rects: BTreeMap<String, Rect>) -> Self {
        let bounds = rects
            .values()
            .copied()
            .reduce(|acc, r| acc.union(&r))
            .unwrap_or_default();
        Self { rects, bounds }
    }

    pub fn rect(&self, id: &str) -> Option<&Rect> {
        self.rects.get(id)
    }

    pub fn position(&self, id: &str) -> Option<Point> {
        self.rects.get(id).map(Rect::center)
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Rect)> {
        self.rects.iter()
    }
}

/// Zoom and pan that map layout space onto a canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f32,
    pub pan: Point,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Point::default(),
        }
    }
}

impl Viewport {
    /// Fit `bounds` into a `width` x `height` canvas with `padding` on each side.
    pub fn fit(bounds: &Rect, width: f32, height: f32, padding: f32) -> Self {
        if bounds.width <= 0.0 && bounds.height <= 0.0 {
            return Self {
                zoom: 1.0,
                pan: Point {
                    x: width / 2.0 - bounds.x,
                    y: height / 2.0 - bounds.y,
                },
            };
        }
        let avail_w = (width - 2.0 * padding).max(1.0);
        let avail_h = (height - 2.0 * padding).max(1.0);
        let zoom_w = if bounds.width > 0.0 {
            avail_w / bounds.width
        } else {
            f32::MAX
        };
        let zoom_h = if bounds.height > 0.0 {
            avail_h / bounds.height
        } else {
            f32::MAX
        };
        let zoom = zoom_w.min(zoom_h).clamp(0.05, 4.0);
        Self {
            zoom,
            pan: Point {
                x: width / 2.0 - bounds.x * zoom,
                y: height / 2.0 - bounds.y * zoom,
            },
        }
    }

    pub fn to_screen(&self, p: Point) -> Point {
        Point {
            x: p.x * self.zoom + self.pan.x,
            y: p.y * self.zoom + self.pan.y,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub id: String,
    pub parent: Option<String>,
    pub label: String,
}

/// The visible slice of the store a layout pass works on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutInput {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<(String, String)>,
}

impl LayoutInput {
    /// Hidden elements are left out so they cannot pull on positions.
    pub fn from_store(store: &GraphStore, visibility: &VisibilityMap) -> Self {
        let nodes: Vec<LayoutNode> = store
            .nodes()
            .filter(|n| !visibility.is_hidden(&n.id))
            .map(|n| LayoutNode {
                id: n.id.clone(),
                parent: n.parent.clone(),
                label: n.label.clone(),
            })
            .collect();
        let edges = store
            .edges()
            .filter(|e| !visibility.is_hidden(&e.id))
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect();
        Self { nodes, edges }
    }
}

/// Anything that turns a [`LayoutInput`] into positions.
pub trait LayoutEngine: Send + Sync {
    fn compute(&self, input: &LayoutInput, params: &LayoutParams) -> Layout;
}

/// Deterministic compound layout: each container's children are arranged
/// first, then the container is sized around them and arranged among its
/// siblings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLayout;

impl LayoutEngine for BuiltinLayout {
    fn compute(&self, input: &LayoutInput, params: &LayoutParams) -> Layout {
        let tree = Tree::new(input);
        let placed = layout_group(&tree, None, params);
        let rects: BTreeMap<String, Rect> = placed.rects.into_iter().collect();
        debug!("Laid out {} node(s)", rects.len());
        Layout::from_rects(rects)
    }
}

/// Picks parameters for the active view mode and runs the engine.
pub struct LayoutSelector {
    mode: ViewMode,
    engine: Box<dyn LayoutEngine>,
}

impl Default for LayoutSelector {
    fn default() -> Self {
        Self::new(ViewMode::default())
    }
}

impl LayoutSelector {
    pub fn new(mode: ViewMode) -> Self {
        Self {
            mode,
            engine: Box::new(BuiltinLayout),
        }
    }

    pub fn with_engine(mode: ViewMode, engine: Box<dyn LayoutEngine>) -> Self {
        Self { mode, engine }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Returns whether the mode changed.
    pub fn set_mode(&mut self, mode: ViewMode) -> bool {
        let changed = self.mode != mode;
        self.mode = mode;
        changed
    }

    pub fn params(&self) -> LayoutParams {
        self.mode.params()
    }

    pub fn run(&self, store: &GraphStore, visibility: &VisibilityMap) -> Layout {
        let input = LayoutInput::from_store(store, visibility);
        self.engine.compute(&input, &self.params())
    }
}

struct Tree<'a> {
    children: HashMap<Option<&'a str>, Vec<&'a str>>,
    labels: HashMap<&'a str, &'a str>,
    /// Root-first ancestor chain of each node, ending with the node itself.
    chains: HashMap<&'a str, Vec<&'a str>>,
    edges: Vec<(&'a str, &'a str)>,
}

impl<'a> Tree<'a> {
    fn new(input: &'a LayoutInput) -> Self {
        let known: HashSet<&str> = input.nodes.iter().map(|n| n.id.as_str()).collect();
        let parents: HashMap<&str, Option<&str>> = input
            .nodes
            .iter()
            .map(|n| {
                let parent = n
                    .parent
                    .as_deref()
                    .filter(|p| known.contains(p) && *p != n.id);
                (n.id.as_str(), parent)
            })
            .collect();

        let mut children: HashMap<Option<&str>, Vec<&str>> = HashMap::new();
        let mut chains = HashMap::with_capacity(input.nodes.len());
        for node in &input.nodes {
            let id = node.id.as_str();
            let mut chain = vec![id];
            let mut seen = HashSet::from([id]);
            let mut current = parents.get(id).copied().flatten();
            while let Some(p) = current {
                if !seen.insert(p) {
                    break;
                }
                chain.push(p);
                current = parents.get(p).copied().flatten();
            }
            chain.reverse();
            // A chain that did not end at a root means a cycle: treat as top level.
            let parent = if chain.len() > 1 && parents.get(chain[0]).copied().flatten().is_none() {
                parents.get(id).copied().flatten()
            } else {
                chain = vec![id];
                None
            };
            children.entry(parent).or_default().push(id);
            chains.insert(id, chain);
        }

        let edges = input
            .edges
            .iter()
            .filter(|(s, t)| known.contains(s.as_str()) && known.contains(t.as_str()))
            .map(|(s, t)| (s.as_str(), t.as_str()))
            .collect();

        Self {
            children,
            labels: input
                .nodes
                .iter()
                .map(|n| (n.id.as_str(), n.label.as_str()))
                .collect(),
            chains,
            edges,
        }
    }

    fn members(&self, parent: Option<&'a str>) -> &[&'a str] {
        self.children
            .get(&parent)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The member of `parent` at `level` that contains `id`, if any.
    fn representative(&self, id: &str, parent: Option<&str>, level: usize) -> Option<&'a str> {
        let chain = self.chains.get(id)?;
        if let Some(p) = parent
            && chain.get(level.checked_sub(1)?) != Some(&p)
        {
            return None;
        }
        chain.get(level).copied()
    }

    fn level_of(&self, parent: Option<&str>) -> usize {
        parent
            .and_then(|p| self.chains.get(p))
            .map(Vec::len)
            .unwrap_or(0)
    }
}

struct Placed {
    /// Boxes relative to the group's top-left corner.
    rects: Vec<(String, Rect)>,
    width: f32,
    height: f32,
}

fn leaf_size(label: &str) -> (f32, f32) {
    let width = (label.chars().count() as f32 * CHAR_WIDTH + 20.0).clamp(LEAF_MIN_WIDTH, LEAF_MAX_WIDTH);
    (width, LEAF_HEIGHT)
}

fn layout_group<'a>(tree: &Tree<'a>, parent: Option<&'a str>, params: &LayoutParams) -> Placed {
    let members = tree.members(parent);
    if members.is_empty() {
        return Placed {
            rects: Vec::new(),
            width: 0.0,
            height: 0.0,
        };
    }

    let mut sizes = Vec::with_capacity(members.len());
    let mut inner = Vec::with_capacity(members.len());
    for &id in members {
        if tree.members(Some(id)).is_empty() {
            sizes.push(leaf_size(tree.labels.get(id).copied().unwrap_or(id)));
            inner.push(None);
        } else {
            let child = layout_group(tree, Some(id), params);
            let (min_w, min_h) = leaf_size(tree.labels.get(id).copied().unwrap_or(id));
            sizes.push((
                (child.width + 2.0 * CONTAINER_PADDING).max(min_w),
                (child.height + 2.0 * CONTAINER_PADDING + CONTAINER_LABEL_BAND).max(min_h),
            ));
            inner.push(Some(child));
        }
    }

    let slot: HashMap<&str, usize> = members.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let level = tree.level_of(parent);
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for (source, target) in &tree.edges {
        let (Some(a), Some(b)) = (
            tree.representative(source, parent, level),
            tree.representative(target, parent, level),
        ) else {
            continue;
        };
        if let (Some(&i), Some(&j)) = (slot.get(a), slot.get(b))
            && i != j
            && !edges.contains(&(i, j))
        {
            edges.push((i, j));
        }
    }

    let centres = match params {
        LayoutParams::Force(force) => force_positions(&sizes, &edges, force),
        LayoutParams::Layered(layered) => layered_positions(&sizes, &edges, layered),
    };

    let min_left = centres
        .iter()
        .zip(&sizes)
        .map(|(c, s)| c.x - s.0 / 2.0)
        .fold(f32::INFINITY, f32::min);
    let min_top = centres
        .iter()
        .zip(&sizes)
        .map(|(c, s)| c.y - s.1 / 2.0)
        .fold(f32::INFINITY, f32::min);

    let mut rects = Vec::new();
    let mut width: f32 = 0.0;
    let mut height: f32 = 0.0;
    for (i, id) in members.iter().enumerate() {
        let rect = Rect {
            x: centres[i].x - min_left,
            y: centres[i].y - min_top,
            width: sizes[i].0,
            height: sizes[i].1,
        };
        width = width.max(rect.right());
        height = height.max(rect.bottom());
        rects.push((id.to_string(), rect));

        if let Some(child) = inner[i].take() {
            let dx = rect.left() + (rect.width - child.width) / 2.0;
            let dy = rect.top() + CONTAINER_PADDING + CONTAINER_LABEL_BAND;
            rects.extend(
                child
                    .rects
                    .into_iter()
                    .map(|(cid, r)| (cid, r.translate(dx, dy))),
            );
        }
    }

    Placed {
        rects,
        width,
        height,
    }
}

fn degrees(n: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut degree = vec![0; n];
    for (a, b) in edges {
        degree[*a] += 1;
        degree[*b] += 1;
    }
    degree
}

/// Spring embedder in the style of cose: pairwise repulsion, springs along
/// edges, gravity to the origin and a cooling step cap. No randomness.
fn force_positions(sizes: &[(f32, f32)], edges: &[(usize, usize)], params: &ForceParams) -> Vec<Point> {
    let n = sizes.len();
    let degree = degrees(n, edges);
    let simulated: Vec<usize> = (0..n)
        .filter(|i| !params.tile || degree[*i] > 0)
        .collect();
    let tiled: Vec<usize> = (0..n)
        .filter(|i| params.tile && degree[*i] == 0)
        .collect();

    let mut pos = vec![Point::default(); n];
    let k = simulated.len();
    if k > 0 {
        let radius = (params.ideal_edge_length * k as f32 / TAU).max(params.ideal_edge_length / 2.0);
        for (slot, &i) in simulated.iter().enumerate() {
            if k == 1 {
                break;
            }
            let angle = TAU * slot as f32 / k as f32;
            pos[i] = Point {
                x: radius * angle.cos(),
                y: radius * angle.sin(),
            };
        }

        let iterations = params
            .iterations
            .min((MAX_PAIR_WORK / (k * k).max(1)).max(MIN_ITERATIONS));
        let radii: Vec<f32> = sizes.iter().map(|(w, h)| w.max(*h) / 2.0).collect();

        for step in 0..iterations {
            let temperature =
                params.ideal_edge_length * (1.0 - step as f32 / iterations as f32) + 1.0;
            let mut disp = vec![Point::default(); n];

            for (a_slot, &a) in simulated.iter().enumerate() {
                for &b in &simulated[a_slot + 1..] {
                    let (mut dx, mut dy) = (pos[a].x - pos[b].x, pos[a].y - pos[b].y);
                    let mut dist = (dx * dx + dy * dy).sqrt();
                    if dist < 0.01 {
                        let angle = (a * 7 + b * 13) as f32;
                        dx = angle.cos();
                        dy = angle.sin();
                        dist = 1.0;
                    }
                    let gap = (dist - radii[a] - radii[b]).max(1.0);
                    let force = params.repulsion / (gap * gap);
                    let (ux, uy) = (dx / dist, dy / dist);
                    disp[a].x += ux * force;
                    disp[a].y += uy * force;
                    disp[b].x -= ux * force;
                    disp[b].y -= uy * force;
                }
            }

            for &(a, b) in edges {
                let (dx, dy) = (pos[a].x - pos[b].x, pos[a].y - pos[b].y);
                let dist = (dx * dx + dy * dy).sqrt().max(0.01);
                let rest = params.ideal_edge_length + radii[a] + radii[b];
                let force = (dist - rest) * SPRING;
                let (ux, uy) = (dx / dist, dy / dist);
                disp[a].x -= ux * force;
                disp[a].y -= uy * force;
                disp[b].x += ux * force;
                disp[b].y += uy * force;
            }

            for &i in &simulated {
                disp[i].x -= pos[i].x * params.gravity * GRAVITY_SCALE;
                disp[i].y -= pos[i].y * params.gravity * GRAVITY_SCALE;

                let len = (disp[i].x * disp[i].x + disp[i].y * disp[i].y).sqrt();
                if len > temperature {
                    disp[i].x *= temperature / len;
                    disp[i].y *= temperature / len;
                }
                pos[i].x += disp[i].x;
                pos[i].y += disp[i].y;
            }
        }

        if !remove_overlaps(&mut pos, sizes, &simulated) {
            debug!("Overlap removal did not settle, tiling {} node(s)", k);
            tile(&mut pos, sizes, &simulated, 0.0);
        }
    }

    if !tiled.is_empty() {
        let below = simulated
            .iter()
            .map(|&i| pos[i].y + sizes[i].1 / 2.0 + SPACING * 2.0)
            .fold(f32::NEG_INFINITY, f32::max);
        let start_y = if below.is_finite() { below } else { 0.0 };
        tile(&mut pos, sizes, &tiled, start_y);
    }
    pos
}

/// Push overlapping boxes apart along the axis of least overlap. Returns
/// false if overlaps remain after the pass budget.
fn remove_overlaps(pos: &mut [Point], sizes: &[(f32, f32)], members: &[usize]) -> bool {
    for _ in 0..OVERLAP_PASSES {
        let mut moved = false;
        for (a_slot, &a) in members.iter().enumerate() {
            for &b in &members[a_slot + 1..] {
                let dx = pos[a].x - pos[b].x;
                let dy = pos[a].y - pos[b].y;
                let ox = (sizes[a].0 + sizes[b].0) / 2.0 + SPACING - dx.abs();
                let oy = (sizes[a].1 + sizes[b].1) / 2.0 + SPACING - dy.abs();
                if ox <= 0.0 || oy <= 0.0 {
                    continue;
                }
                moved = true;
                if ox < oy {
                    let sign = if dx > 0.0 { 1.0 } else { -1.0 };
                    pos[a].x += sign * ox / 2.0;
                    pos[b].x -= sign * ox / 2.0;
                } else {
                    let sign = if dy > 0.0 { 1.0 } else { -1.0 };
                    pos[a].y += sign * oy / 2.0;
                    pos[b].y -= sign * oy / 2.0;
                }
            }
        }
        if !moved {
            return true;
        }
    }
    false
}

/// Row-major grid, rows wrapped at roughly a square footprint.
fn tile(pos: &mut [Point], sizes: &[(f32, f32)], members: &[usize], start_y: f32) {
    let area: f32 = members
        .iter()
        .map(|&i| (sizes[i].0 + SPACING) * (sizes[i].1 + SPACING))
        .sum();
    let widest = members
        .iter()
        .map(|&i| sizes[i].0)
        .fold(0.0_f32, f32::max);
    let row_limit = area.sqrt().max(widest);

    let mut x = 0.0;
    let mut y = start_y;
    let mut row_height: f32 = 0.0;
    for &i in members {
        let (w, h) = sizes[i];
        if x > 0.0 && x + w > row_limit {
            x = 0.0;
            y += row_height + SPACING;
            row_height = 0.0;
        }
        pos[i] = Point {
            x: x + w / 2.0,
            y: y + h / 2.0,
        };
        x += w + SPACING;
        row_height = row_height.max(h);
    }
}

/// Longest-path ranking followed by one barycentre ordering sweep.
fn layered_positions(
    sizes: &[(f32, f32)],
    edges: &[(usize, usize)],
    params: &LayeredParams,
) -> Vec<Point> {
    let n = sizes.len();
    let mut rank = vec![0_usize; n];
    let mut indegree = vec![0_usize; n];
    for &(_, b) in edges {
        indegree[b] += 1;
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|i| indegree[*i] == 0).collect();
    let mut visited = vec![false; n];
    while let Some(a) = queue.pop_front() {
        visited[a] = true;
        for &(_, b) in edges.iter().filter(|(s, _)| *s == a) {
            rank[b] = rank[b].max(rank[a] + 1);
            indegree[b] -= 1;
            if indegree[b] == 0 {
                queue.push_back(b);
            }
        }
    }
    // Nodes on cycles keep whatever rank their ranked predecessors give them.
    for i in 0..n {
        if visited[i] {
            continue;
        }
        rank[i] = edges
            .iter()
            .filter(|(s, t)| *t == i && visited[*s])
            .map(|(s, _)| rank[*s] + 1)
            .max()
            .unwrap_or(0);
    }

    let mut layers: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..n {
        layers.entry(rank[i]).or_default().push(i);
    }
    let mut layers: Vec<Vec<usize>> = layers.into_values().collect();

    let mut order = vec![0.0_f32; n];
    for layer in &layers {
        for (slot, &i) in layer.iter().enumerate() {
            order[i] = slot as f32;
        }
    }
    for l in 1..layers.len() {
        let mut keyed: Vec<(f32, usize)> = layers[l]
            .iter()
            .map(|&i| {
                let preds: Vec<f32> = edges
                    .iter()
                    .filter(|(s, t)| *t == i && rank[*s] + 1 == rank[i])
                    .map(|(s, _)| order[*s])
                    .collect();
                let key = if preds.is_empty() {
                    order[i]
                } else {
                    preds.iter().sum::<f32>() / preds.len() as f32
                };
                (key, i)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        layers[l] = keyed.into_iter().map(|(_, i)| i).collect();
        for (slot, &i) in layers[l].iter().enumerate() {
            order[i] = slot as f32;
        }
    }

    let degree = degrees(n, edges);
    let along = |i: usize| match params.rank_dir {
        RankDir::LeftRight => sizes[i].0,
        RankDir::TopBottom => sizes[i].1,
    };
    let across = |i: usize| match params.rank_dir {
        RankDir::LeftRight => sizes[i].1,
        RankDir::TopBottom => sizes[i].0,
    };

    let mut pos = vec![Point::default(); n];
    let mut rank_offset = 0.0;
    for layer in &layers {
        let extent = layer.iter().map(|&i| along(i)).fold(0.0_f32, f32::max);
        let mut cursor = 0.0;
        let mut placed = Vec::with_capacity(layer.len());
        for (slot, &i) in layer.iter().enumerate() {
            if slot > 0 {
                let prev = layer[slot - 1];
                cursor += params.node_sep;
                if degree[prev] > 1 || degree[i] > 1 {
                    cursor += params.edge_sep;
                }
            }
            placed.push((i, cursor + across(i) / 2.0));
            cursor += across(i);
        }
        let shift = -cursor / 2.0;
        for (i, offset) in placed {
            let main = rank_offset + extent / 2.0;
            let cross = offset + shift;
            pos[i] = match params.rank_dir {
                RankDir::LeftRight => Point { x: main, y: cross },
                RankDir::TopBottom => Point { x: cross, y: main },
            };
        }
        rank_offset += extent + params.rank_sep;
    }
    pos
}
