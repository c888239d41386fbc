// View-model: owns every engine component and exposes the user-facing operations

use crate::error::{ExportError, SelectionError};
use crate::export::{self, ExportArtifact, ExportFormat, ExportOptions, Scene};
use crate::filter::{CategoryToggles, FilterEngine, VisibilityMap};
use crate::findings::FindingsPanel;
use crate::ingest::{IngestOutcome, IngestSummary, IngestTicket, IngestionAdapter, parse_elements};
use crate::inspect::{InspectorView, SelectionInspector};
use crate::layout::{Layout, LayoutSelector, ViewMode, Viewport};
use crate::legend::Legend;
use crate::model::EdgeCategory;
use crate::settings::Settings;
use crate::store::GraphStore;
use crate::style::{ResolvedStyle, StyleResolver};
use skymap_client::EnumerationResponse;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

const DEFAULT_CANVAS: (f32, f32) = (1280.0, 800.0);
const FIT_PADDING: f32 = 30.0;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Ready,
    Enumerating,
    Done { nodes: usize, edges: usize },
    Failed(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ready => write!(f, "Ready"),
            Status::Enumerating => write!(f, "Enumerating…"),
            Status::Done { nodes, edges } => write!(f, "Done: {} nodes, {} edges", nodes, edges),
            Status::Failed(message) => write!(f, "{}", message),
        }
    }
}

/// One session's worth of topology state.
pub struct ViewModel {
    store: GraphStore,
    resolver: StyleResolver,
    layouts: LayoutSelector,
    layout: Layout,
    filter: FilterEngine,
    visibility: VisibilityMap,
    selection: SelectionInspector,
    ingestion: IngestionAdapter,
    warnings: Vec<String>,
    findings: FindingsPanel,
    legend: Legend,
    viewport: Viewport,
    canvas: (f32, f32),
    export_options: ExportOptions,
    status: Status,
}

impl Default for ViewModel {
    fn default() -> Self {
        Self::new(ViewMode::default(), CategoryToggles::default(), ExportOptions::default())
    }
}

impl ViewModel {
    pub fn new(mode: ViewMode, toggles: CategoryToggles, export_options: ExportOptions) -> Self {
        Self {
            store: GraphStore::new(),
            resolver: StyleResolver::default(),
            layouts: LayoutSelector::new(mode),
            layout: Layout::default(),
            filter: FilterEngine::new(toggles),
            visibility: VisibilityMap::default(),
            selection: SelectionInspector::new(),
            ingestion: IngestionAdapter::new(),
            warnings: Vec::new(),
            findings: FindingsPanel::default(),
            legend: Legend::default(),
            viewport: Viewport::default(),
            canvas: DEFAULT_CANVAS,
            export_options,
            status: Status::Ready,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.view_mode(),
            settings.category_toggles(),
            settings.export_options(),
        )
    }

    pub fn with_resolver(mut self, resolver: StyleResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn visibility(&self) -> &VisibilityMap {
        &self.visibility
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn findings(&self) -> &FindingsPanel {
        &self.findings
    }

    pub fn legend(&self) -> &Legend {
        &self.legend
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn view_mode(&self) -> ViewMode {
        self.layouts.mode()
    }

    pub fn toggles(&self) -> &CategoryToggles {
        self.filter.toggles()
    }

    pub fn query(&self) -> &str {
        self.filter.query()
    }

    pub fn selection(&self) -> &[String] {
        self.selection.selection()
    }

    pub fn export_options(&self) -> &ExportOptions {
        &self.export_options
    }

    pub fn set_export_options(&mut self, options: ExportOptions) {
        self.export_options = options;
    }

    pub fn set_category(&mut self, category: EdgeCategory, enabled: bool) {
        self.filter.set_category(category, enabled);
        self.refresh_visibility();
    }

    pub fn toggle_category(&mut self, category: EdgeCategory) -> bool {
        let enabled = self.filter.toggle_category(category);
        self.refresh_visibility();
        enabled
    }

    pub fn set_search(&mut self, query: &str) {
        self.filter.set_query(query);
        self.refresh_visibility();
    }

    /// Switch mode and lay the graph out again with that mode's parameters.
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if self.layouts.set_mode(mode) {
            info!("View mode set to {}", mode);
        }
        self.relayout();
    }

    /// Lay out the currently visible elements and fit them to the canvas.
    pub fn relayout(&mut self) {
        self.layout = self.layouts.run(&self.store, &self.visibility);
        self.fit_view();
    }

    pub fn set_canvas(&mut self, width: f32, height: f32) {
        self.canvas = (width, height);
        self.fit_view();
    }

    pub fn fit_view(&mut self) {
        self.viewport = Viewport::fit(&self.layout.bounds(), self.canvas.0, self.canvas.1, FIT_PADDING);
    }

    pub fn select(&mut self, id: &str) -> Result<(), SelectionError> {
        self.selection.select(&self.store, id)
    }

    pub fn deselect(&mut self, id: &str) -> bool {
        self.selection.deselect(id)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn inspector_view(&self) -> InspectorView {
        self.selection.view(&self.store)
    }

    pub fn resolved_style(&self, id: &str) -> Option<ResolvedStyle> {
        let element = self.store.element(id)?;
        Some(self.scene().style_of(element))
    }

    pub fn scene(&self) -> Scene<'_> {
        Scene {
            store: &self.store,
            layout: &self.layout,
            visibility: &self.visibility,
            resolver: &self.resolver,
            selection: &self.selection,
        }
    }

    /// Render the current view. Failures land in the status line; nothing else changes.
    pub fn export(&mut self, format: ExportFormat) -> Result<ExportArtifact, ExportError> {
        let result = export::export(&self.scene(), format, &self.export_options);
        if let Err(ref e) = result {
            self.record_export_failure(e);
        }
        result
    }

    /// Render and write to `path`, returning the byte count. A failed write
    /// is reported the same way as a failed render.
    pub fn export_to(&mut self, format: ExportFormat, path: &Path) -> Result<usize, ExportError> {
        let artifact = self.export(format)?;
        if let Err(e) = artifact.save(path) {
            self.record_export_failure(&e);
            return Err(e);
        }
        Ok(artifact.len())
    }

    fn record_export_failure(&mut self, e: &ExportError) {
        warn!("Export failed: {}", e);
        self.status = Status::Failed(format!("Export failed: {}", e));
    }

    pub fn is_ingesting(&self) -> bool {
        self.ingestion.is_pending()
    }

    pub fn begin_ingestion(&mut self) -> IngestTicket {
        self.status = Status::Enumerating;
        self.ingestion.begin()
    }

    /// Apply the outcome of the load identified by `ticket`, unless a newer
    /// load has been started since.
    pub fn complete_ingestion<E: fmt::Display>(
        &mut self,
        ticket: IngestTicket,
        result: Result<EnumerationResponse, E>,
    ) -> IngestOutcome {
        if !self.ingestion.finish(ticket) {
            return IngestOutcome::Stale;
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let message = e.to_string();
                warn!("Ingestion failed: {}", message);
                self.status = Status::Failed(message.clone());
                return IngestOutcome::Failed(message);
            }
        };

        let parsed = parse_elements(&response.elements);
        let store_issues = self.store.replace_all(parsed.nodes, parsed.edges);

        let mut warnings = response.warnings;
        for issue in parsed.issues.iter().chain(&store_issues) {
            warn!("{}", issue);
            warnings.push(issue.to_string());
        }
        self.warnings = warnings;
        self.findings = FindingsPanel::from_records(&response.findings);
        self.selection.clear();

        self.refresh_visibility();
        self.relayout();
        self.legend = Legend::build(&self.store, &self.resolver);

        let summary = IngestSummary {
            nodes: self.store.node_count(),
            edges: self.store.edge_count(),
            warnings: self.warnings.len(),
            findings: self.findings.total(),
        };
        self.status = Status::Done {
            nodes: summary.nodes,
            edges: summary.edges,
        };
        info!(
            "Ingested {} node(s), {} edge(s), {} warning(s), {} finding(s)",
            summary.nodes, summary.edges, summary.warnings, summary.findings
        );
        IngestOutcome::Applied(summary)
    }

    /// Begin and complete in one step, for already-available responses.
    pub fn load_response(&mut self, response: EnumerationResponse) -> IngestOutcome {
        let ticket = self.begin_ingestion();
        self.complete_ingestion::<std::convert::Infallible>(ticket, Ok(response))
    }

    fn refresh_visibility(&mut self) {
        self.visibility = self.filter.compute(&self.store);
    }
}
