// Interactive topology explorer: REPL on the left, element panes on the right

pub mod panes;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use skymap_client::{EnumerationClient, EnumerationRequest, EnumerationResponse};
use skymap_core::{
    EdgeCategory, ExportFormat, IngestOutcome, IngestTicket, Settings, Status, ViewMode, ViewModel,
};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;
use tokio::runtime::Handle;

const HISTORY_LIMIT: usize = 100;
const OUTPUT_LIMIT: usize = 1000;
const PROMPT: &str = "skymap> ";

#[derive(Debug, Clone, Copy, PartialEq)]
enum ExitMode {
    None,
    Normal,    // exit, quit - ask about saving
    ForceQuit, // :q! - don't save, don't ask
    WriteQuit, // :wq!, ZZ - save and quit, don't ask
}

/// Result of a background enumeration, tagged with the ticket it was started under.
pub struct IngestMessage {
    pub ticket: IngestTicket,
    pub result: Result<EnumerationResponse, String>,
}

/// What the explorer starts with.
pub struct TuiOptions {
    pub settings: Settings,
    /// Credentials and regions used by `enumerate` unless overridden at the prompt.
    pub request: EnumerationRequest,
    /// Already fetched topology to show immediately.
    pub preload: Option<EnumerationResponse>,
}

impl Default for TuiOptions {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            request: EnumerationRequest::new(),
            preload: None,
        }
    }
}

pub struct App {
    vm: ViewModel,
    input: String,
    history: Vec<String>,
    output: Vec<String>,
    cursor_position: usize,
    should_quit: bool,
    scroll_offset: usize,
    history_index: Option<usize>,
    temp_input: String,
    exit_mode: ExitMode,
    awaiting_save_confirmation: bool,
    client: Option<Arc<EnumerationClient>>,
    runtime: Option<Handle>,
    request: EnumerationRequest,
    tx: Sender<IngestMessage>,
    rx: Receiver<IngestMessage>,
    history_path: PathBuf,
}

impl App {
    pub fn new(vm: ViewModel) -> Self {
        let banner = r#"
    ╔══════════════════════════════════════════════════════╗
    ║   ███████╗██╗  ██╗██╗   ██╗███╗   ███╗ █████╗ ██████╗║
    ║   ██╔════╝██║ ██╔╝╚██╗ ██╔╝████╗ ████║██╔══██╗██╔══██║
    ║   ███████╗█████╔╝  ╚████╔╝ ██╔████╔██║███████║██████╔║
    ║   ╚════██║██╔═██╗   ╚██╔╝  ██║╚██╔╝██║██╔══██║██╔═══╝║
    ║   ███████║██║  ██╗   ██║   ██║ ╚═╝ ██║██║  ██║██║    ║
    ║   ╚══════╝╚═╝  ╚═╝   ╚═╝   ╚═╝     ╚═╝╚═╝  ╚═╝╚═╝    ║
    ║                                                      ║
    ║             Cloud Topology Explorer                  ║
    ╚══════════════════════════════════════════════════════╝
        "#;

        let mut output: Vec<String> = banner.lines().map(str::to_string).collect();
        output.push(String::new());
        output.push("  Type 'help' for available commands, 'exit' or 'quit' to exit.".to_string());
        output.push(String::new());

        let (tx, rx) = mpsc::channel();
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());

        Self {
            vm,
            input: String::new(),
            history: Vec::new(),
            output,
            cursor_position: 0,
            should_quit: false,
            scroll_offset: 0,
            history_index: None,
            temp_input: String::new(),
            exit_mode: ExitMode::None,
            awaiting_save_confirmation: false,
            client: None,
            runtime: None,
            request: EnumerationRequest::new(),
            tx,
            rx,
            history_path: PathBuf::from(home).join(".skymap_history"),
        }
    }

    /// Enable `enumerate`. Requests are spawned on `runtime`.
    pub fn with_backend(
        mut self,
        client: EnumerationClient,
        runtime: Handle,
        request: EnumerationRequest,
    ) -> Self {
        self.client = Some(Arc::new(client));
        self.runtime = Some(runtime);
        self.request = request;
        self
    }

    pub fn with_history_path(mut self, path: PathBuf) -> Self {
        self.history_path = path;
        self
    }

    pub fn view_model(&self) -> &ViewModel {
        &self.vm
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn add_output(&mut self, message: impl Into<String>) {
        self.output.push(message.into());
        if self.output.len() > OUTPUT_LIMIT {
            self.output.drain(0..self.output.len() - OUTPUT_LIMIT);
        }
        // Back to the bottom on new output
        self.scroll_offset = 0;
    }

    pub fn navigate_history_backward(&mut self) {
        if self.history.is_empty() {
            return;
        }

        if self.history_index.is_none() {
            self.temp_input = self.input.clone();
        }

        let idx = match self.history_index {
            None => self.history.len() - 1,
            Some(idx) => idx.saturating_sub(1),
        };
        self.history_index = Some(idx);
        self.input = self.history[idx].clone();
        self.cursor_position = self.input.len();
    }

    pub fn navigate_history_forward(&mut self) {
        let Some(idx) = self.history_index else {
            return;
        };

        if idx + 1 >= self.history.len() {
            // Past the newest entry: restore what was being typed
            self.input = std::mem::take(&mut self.temp_input);
            self.cursor_position = self.input.len();
            self.history_index = None;
            return;
        }

        self.history_index = Some(idx + 1);
        self.input = self.history[idx + 1].clone();
        self.cursor_position = self.input.len();
    }

    pub fn load_history(&mut self) {
        if let Ok(content) = fs::read_to_string(&self.history_path) {
            let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
            if lines.len() > HISTORY_LIMIT {
                lines.drain(0..lines.len() - HISTORY_LIMIT);
            }
            self.history = lines;
        }
    }

    pub fn save_history(&self) -> Result<()> {
        fs::write(&self.history_path, self.history.join("\n"))?;
        Ok(())
    }

    fn save_history_with_report(&mut self) {
        match self.save_history() {
            Ok(()) => {
                let message = format!("History saved to {}", self.history_path.display());
                self.add_output(message);
            }
            Err(e) => self.add_output(format!("Error saving history: {}", e)),
        }
    }

    fn request_exit(&mut self, mode: ExitMode) {
        self.exit_mode = mode;

        match mode {
            ExitMode::Normal => {
                if self.history.is_empty() {
                    self.should_quit = true;
                } else {
                    self.awaiting_save_confirmation = true;
                    self.add_output("");
                    let prompt = format!("Save command history to {}? [y/N]:", self.history_path.display());
                    self.add_output(prompt);
                }
            }
            ExitMode::ForceQuit => {
                self.should_quit = true;
            }
            ExitMode::WriteQuit => {
                if !self.history.is_empty() {
                    self.save_history_with_report();
                }
                self.should_quit = true;
            }
            ExitMode::None => {}
        }
    }

    fn handle_save_confirmation(&mut self, response: &str) {
        self.awaiting_save_confirmation = false;

        let response = response.trim().to_lowercase();
        if response == "y" || response == "yes" {
            self.save_history_with_report();
        } else {
            self.add_output("History not saved.");
        }
        self.should_quit = true;
    }

    /// Apply every enumeration result that has arrived since the last call.
    pub fn process_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            let outcome = self.vm.complete_ingestion(msg.ticket, msg.result);
            self.report_outcome(outcome);
        }
    }

    fn report_outcome(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Applied(summary) => {
                self.add_output(format!(
                    "Loaded {} node(s), {} edge(s); {} warning(s), {} finding(s)",
                    summary.nodes, summary.edges, summary.warnings, summary.findings
                ));
            }
            IngestOutcome::Failed(message) => {
                self.add_output(format!("Error: {}", message));
            }
            IngestOutcome::Stale => {
                self.add_output("Discarded a superseded enumeration result");
            }
        }
    }

    pub fn handle_input(&mut self, input: String) {
        if input.is_empty() {
            return;
        }

        if self.awaiting_save_confirmation {
            self.handle_save_confirmation(&input);
            return;
        }

        self.history.push(input.clone());
        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }

        self.history_index = None;
        self.temp_input.clear();

        self.add_output(format!("> {}", input));

        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            return;
        }

        match parts[0] {
            "exit" | "quit" => {
                self.request_exit(ExitMode::Normal);
            }
            ":q!" => {
                self.request_exit(ExitMode::ForceQuit);
            }
            ":wq!" | "ZZ" => {
                self.request_exit(ExitMode::WriteQuit);
            }
            "help" => self.show_help(),
            "clear" => {
                self.output.clear();
            }
            "load" => match parts.get(1) {
                Some(path) => self.load_file(path),
                None => self.add_output("Error: load requires a file path"),
            },
            "enumerate" => {
                let regions = parts.get(1).copied();
                let profile = parts.get(2).copied();
                self.start_enumeration(regions, profile);
            }
            "search" => {
                let query = parts[1..].join(" ");
                self.vm.set_search(&query);
                if query.is_empty() {
                    self.add_output("Search cleared");
                } else {
                    let matches = self.vm.visibility().matches().len();
                    self.add_output(format!("{} match(es) for '{}'", matches, query));
                }
            }
            "toggle" | "show" | "hide" => {
                let Some(raw) = parts.get(1) else {
                    self.add_output(format!(
                        "Error: {} requires a category (resource, network, data)",
                        parts[0]
                    ));
                    return;
                };
                let Some(category) = EdgeCategory::from_str(raw) else {
                    self.add_output(format!("Error: unknown category: {}", raw));
                    return;
                };
                let enabled = match parts[0] {
                    "show" => {
                        self.vm.set_category(category, true);
                        true
                    }
                    "hide" => {
                        self.vm.set_category(category, false);
                        false
                    }
                    _ => self.vm.toggle_category(category),
                };
                self.add_output(format!(
                    "{} edges {}",
                    category,
                    if enabled { "shown" } else { "hidden" }
                ));
            }
            "view" => {
                let mode = match parts.get(1) {
                    Some(raw) => match ViewMode::from_str(raw) {
                        Some(mode) => mode,
                        None => {
                            self.add_output(format!("Error: unknown view mode: {}", raw));
                            self.add_output("Try: container-grouped|linear-flow|hierarchical");
                            return;
                        }
                    },
                    None => self.vm.view_mode().next(),
                };
                self.vm.set_view_mode(mode);
                self.add_output(format!("View mode: {}", mode));
            }
            "layout" => {
                self.vm.relayout();
                self.add_output(format!("Laid out {} element(s)", self.vm.layout().len()));
            }
            "select" => match parts.get(1) {
                Some(id) => {
                    if let Err(e) = self.vm.select(id) {
                        self.add_output(format!("Error: {}", e));
                    }
                }
                None => self.add_output("Error: select requires an element id"),
            },
            "deselect" => match parts.get(1) {
                Some(id) => {
                    if !self.vm.deselect(id) {
                        self.add_output(format!("{} was not selected", id));
                    }
                }
                None => self.vm.clear_selection(),
            },
            "inspect" => {
                let lines = self.vm.inspector_view().lines();
                for line in lines {
                    self.add_output(line);
                }
            }
            "export" => {
                let Some(raw) = parts.get(1) else {
                    self.add_output("Error: export requires a format (png, svg, json)");
                    return;
                };
                self.export(raw, parts.get(2).copied());
            }
            "legend" => {
                let lines = self.vm.legend().lines();
                if lines.is_empty() {
                    self.add_output("Legend is empty; load a topology first");
                }
                for line in lines {
                    self.add_output(format!("  {}", line));
                }
            }
            "warnings" => {
                let warnings = self.vm.warnings().to_vec();
                if warnings.is_empty() {
                    self.add_output("No warnings");
                }
                for warning in warnings {
                    self.add_output(format!("  ! {}", warning));
                }
            }
            "findings" => {
                let text = self.vm.findings().render_text();
                for line in text.lines() {
                    self.add_output(line.to_string());
                }
            }
            _ => {
                self.add_output(format!("Unknown command: {}", parts[0]));
                self.add_output("Type 'help' for available commands");
            }
        }
    }

    fn show_help(&mut self) {
        self.add_output("Available commands:");
        self.add_output("  load <file>                    - Load an enumeration response from JSON");
        self.add_output("  enumerate [regions] [profile]  - Enumerate through the backend");
        self.add_output("  search [text]                  - Highlight matches and neighbours (empty clears)");
        self.add_output("  toggle|show|hide <category>    - Edge visibility (resource, network, data)");
        self.add_output("  view [mode]                    - Switch view mode (cycles when omitted)");
        self.add_output("  layout                         - Lay the graph out again");
        self.add_output("  select <id>                    - Add an element to the selection");
        self.add_output("  deselect [id]                  - Remove one element, or clear the selection");
        self.add_output("  inspect                        - Print the inspector contents");
        self.add_output("  export <png|svg|json> [path]   - Export the current view");
        self.add_output("  legend                         - Show the legend");
        self.add_output("  warnings                       - Show load warnings");
        self.add_output("  findings                       - Show the findings report");
        self.add_output("  clear                          - Clear the output");
        self.add_output("  help                           - Show this help message");
        self.add_output("  exit, quit                     - Exit the explorer");
    }

    fn load_file(&mut self, raw_path: &str) {
        let path = PathBuf::from(shellexpand::tilde(raw_path).as_ref());
        let ticket = self.vm.begin_ingestion();
        let result = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
            .and_then(|text| {
                EnumerationResponse::from_json(&text)
                    .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
            });
        let outcome = self.vm.complete_ingestion(ticket, result);
        self.report_outcome(outcome);
    }

    fn start_enumeration(&mut self, regions: Option<&str>, profile: Option<&str>) {
        let (Some(client), Some(runtime)) = (self.client.clone(), self.runtime.clone()) else {
            self.add_output("Error: no enumeration backend configured");
            return;
        };

        let mut request = self.request.clone();
        if let Some(regions) = regions {
            request = request.with_regions(regions);
        }
        if profile.is_some() {
            request = request.with_profile(profile);
        }

        let ticket = self.vm.begin_ingestion();
        self.add_output(format!(
            "Enumerating {} via {}…",
            request.regions.join(", "),
            client.endpoint()
        ));

        let tx = self.tx.clone();
        runtime.spawn(async move {
            let result = client
                .enumerate(&request)
                .await
                .map_err(|e| e.status_text());
            // The receiver is gone once the explorer has exited.
            let _ = tx.send(IngestMessage { ticket, result });
        });
    }

    fn export(&mut self, raw_format: &str, path: Option<&str>) {
        let format = match ExportFormat::parse(raw_format) {
            Ok(format) => format,
            Err(e) => {
                self.add_output(format!("Error: {}", e));
                return;
            }
        };
        let path = match path {
            Some(p) => PathBuf::from(shellexpand::tilde(p).as_ref()),
            None => PathBuf::from(format!("skymap-export.{}", format.extension())),
        };

        match self.vm.export_to(format, &path) {
            Ok(bytes) => self.add_output(format!("Exported {} bytes to {}", bytes, path.display())),
            Err(e) => self.add_output(format!("Error: {}", e)),
        }
    }
}

/// Run the explorer until the operator quits.
///
/// Must be called from inside a Tokio runtime for `enumerate` to work; the
/// binary wraps it in `block_in_place`.
pub fn run(options: TuiOptions) -> Result<()> {
    let mut vm = ViewModel::from_settings(&options.settings);
    let mut app_notes = Vec::new();
    if let Some(response) = options.preload {
        match vm.load_response(response) {
            IngestOutcome::Applied(summary) => app_notes.push(format!(
                "Loaded {} node(s), {} edge(s)",
                summary.nodes, summary.edges
            )),
            other => app_notes.push(format!("Preload not applied: {:?}", other)),
        }
    }

    let mut app = App::new(vm);
    let backend = &options.settings.backend;
    match (
        EnumerationClient::with_timeout(&backend.endpoint, backend.timeout_secs),
        Handle::try_current(),
    ) {
        (Ok(client), Ok(runtime)) => {
            app = app.with_backend(client, runtime, options.request);
        }
        (Err(e), _) => app_notes.push(format!("Enumeration disabled: {}", e)),
        (_, Err(_)) => app_notes.push("Enumeration disabled: no async runtime".to_string()),
    }
    for note in app_notes {
        app.add_output(note);
    }
    app.load_history();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        app.process_messages();

        let size = terminal.size()?;
        app.vm.set_canvas(f32::from(size.width), f32::from(size.height));

        terminal.draw(|f| ui(f, app))?;

        // Poll so background results land even while the operator is idle
        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            handle_key(app, key.code);
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char(c) => {
            app.input.insert(app.cursor_position, c);
            app.cursor_position += c.len_utf8();
            app.history_index = None;
            app.temp_input.clear();
        }
        KeyCode::Backspace => {
            if let Some((idx, _)) = app.input[..app.cursor_position].char_indices().next_back() {
                app.input.remove(idx);
                app.cursor_position = idx;
                app.history_index = None;
                app.temp_input.clear();
            }
        }
        KeyCode::Enter => {
            let input = std::mem::take(&mut app.input);
            app.cursor_position = 0;
            app.handle_input(input);
        }
        KeyCode::Up => app.navigate_history_backward(),
        KeyCode::Down => app.navigate_history_forward(),
        KeyCode::Left => {
            if let Some((idx, _)) = app.input[..app.cursor_position].char_indices().next_back() {
                app.cursor_position = idx;
            }
        }
        KeyCode::Right => {
            if let Some(c) = app.input[app.cursor_position..].chars().next() {
                app.cursor_position += c.len_utf8();
            }
        }
        KeyCode::Home => app.cursor_position = 0,
        KeyCode::End => app.cursor_position = app.input.len(),
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Tab => {
            let mode = app.vm.view_mode().next();
            app.vm.set_view_mode(mode);
        }
        KeyCode::PageUp => {
            app.scroll_offset = (app.scroll_offset + 10).min(app.output.len().saturating_sub(1));
        }
        KeyCode::PageDown => {
            app.scroll_offset = app.scroll_offset.saturating_sub(10);
        }
        _ => {}
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Output and panes
            Constraint::Length(1), // Horizontal rule
            Constraint::Length(1), // Input area
            Constraint::Length(1), // Horizontal rule
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Percentage(30),
            Constraint::Percentage(20),
        ])
        .split(main[1]);

    render_output(f, main[0], app);
    panes::render_elements(f, side[0], &app.vm);
    panes::render_inspector(f, side[1], &app.vm);
    panes::render_findings(f, side[2], &app.vm);

    let rule = || Paragraph::new("─".repeat(chunks[1].width as usize)).style(Style::default().fg(Color::DarkGray));
    f.render_widget(rule(), chunks[1]);

    let input_text = format!("{}{}", PROMPT, app.input);
    f.render_widget(
        Paragraph::new(input_text).style(Style::default().fg(Color::Yellow)),
        chunks[2],
    );
    let cursor_col = app.input[..app.cursor_position].chars().count();
    f.set_cursor_position((
        chunks[2].x + (PROMPT.len() + cursor_col) as u16,
        chunks[2].y,
    ));

    f.render_widget(rule(), chunks[3]);
    render_status(f, chunks[4], app);
}

fn render_output(f: &mut Frame, area: ratatui::layout::Rect, app: &App) {
    let height = area.height as usize;
    let total = app.output.len();
    // scroll_offset counts lines up from the bottom
    let end = total.saturating_sub(app.scroll_offset.min(total.saturating_sub(height)));
    let start = end.saturating_sub(height);

    let visible: Vec<Line> = app.output[start..end]
        .iter()
        .map(|line| Line::from(line.as_str()))
        .collect();

    f.render_widget(
        Paragraph::new(visible).style(Style::default().fg(Color::White)),
        area,
    );
}

fn render_status(f: &mut Frame, area: ratatui::layout::Rect, app: &App) {
    let status_color = match app.vm.status() {
        Status::Ready => Color::Gray,
        Status::Enumerating => Color::Yellow,
        Status::Done { .. } => Color::Green,
        Status::Failed(_) => Color::Red,
    };
    let toggles = app.vm.toggles();
    let categories: Vec<&str> = EdgeCategory::ALL
        .iter()
        .filter(|c| toggles.is_enabled(**c))
        .map(|c| c.as_str())
        .collect();

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut spans = vec![
        Span::styled(app.vm.status().to_string(), Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(app.vm.view_mode().as_str(), bold),
        Span::raw(" | edges: "),
        Span::styled(
            if categories.is_empty() { "none".to_string() } else { categories.join(",") },
            bold,
        ),
    ];
    if !app.vm.query().is_empty() {
        spans.push(Span::raw(" | search: "));
        spans.push(Span::styled(app.vm.query().to_string(), bold));
    }
    spans.extend([
        Span::raw(" | "),
        Span::styled("ESC", bold),
        Span::raw(" quit | "),
        Span::styled("Tab", bold),
        Span::raw(" view | "),
        Span::styled("↑↓", bold),
        Span::raw(" history | "),
        Span::styled("PgUp/PgDn", bold),
        Span::raw(" scroll"),
    ]);

    f.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TOPOLOGY: &str = r#"{
        "elements": [
            {"data": {"id": "vpc-1", "type": "vpc", "label": "main"}},
            {"data": {"id": "i-1", "type": "instance", "label": "web-1", "parent": "vpc-1"}},
            {"data": {"id": "b-1", "type": "s3_bucket", "label": "logs"}},
            {"data": {"id": "e1", "source": "i-1", "target": "b-1", "category": "data"}},
            {"data": {"id": "e2", "source": "i-1", "target": "ghost", "category": "network"}}
        ],
        "findings": [{"severity": "high", "title": "Public bucket", "node_id": "b-1"}]
    }"#;

    fn app_in(temp_dir: &TempDir) -> App {
        App::new(ViewModel::default()).with_history_path(temp_dir.path().join("history"))
    }

    fn loaded_app(temp_dir: &TempDir) -> App {
        let path = temp_dir.path().join("topology.json");
        fs::write(&path, TOPOLOGY).unwrap();
        let mut app = app_in(temp_dir);
        app.handle_input(format!("load {}", path.display()));
        app
    }

    fn last_output(app: &App) -> &str {
        app.output().last().map(String::as_str).unwrap_or("")
    }

    // ============================================================================
    // Command Handling Tests
    // ============================================================================

    #[test]
    fn test_help_lists_commands() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir);
        app.handle_input("help".to_string());
        assert!(app.output().iter().any(|l| l.contains("enumerate [regions] [profile]")));
        assert!(app.output().iter().any(|l| l.contains("export <png|svg|json>")));
    }

    #[test]
    fn test_load_reports_summary_and_warnings() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = loaded_app(&temp_dir);
        assert_eq!(
            last_output(&app),
            "Loaded 3 node(s), 1 edge(s); 1 warning(s), 1 finding(s)"
        );
        app.handle_input("warnings".to_string());
        assert!(last_output(&app).contains("ghost"));
    }

    #[test]
    fn test_load_missing_file_keeps_graph() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = loaded_app(&temp_dir);
        app.handle_input("load /nonexistent/skymap.json".to_string());
        assert!(last_output(&app).starts_with("Error: Failed to read"));
        assert_eq!(app.view_model().store().node_count(), 3);
    }

    #[test]
    fn test_search_and_toggle_commands() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = loaded_app(&temp_dir);

        app.handle_input("search web".to_string());
        assert_eq!(last_output(&app), "1 match(es) for 'web'");
        assert_eq!(app.view_model().query(), "web");

        app.handle_input("hide data".to_string());
        assert_eq!(last_output(&app), "data edges hidden");
        assert!(app.view_model().visibility().is_hidden("e1"));

        app.handle_input("toggle data".to_string());
        assert_eq!(last_output(&app), "data edges shown");

        app.handle_input("toggle telepathy".to_string());
        assert_eq!(last_output(&app), "Error: unknown category: telepathy");

        app.handle_input("search".to_string());
        assert_eq!(last_output(&app), "Search cleared");
    }

    #[test]
    fn test_view_command_sets_and_cycles() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = loaded_app(&temp_dir);

        app.handle_input("view service".to_string());
        assert_eq!(app.view_model().view_mode(), ViewMode::LinearFlow);

        app.handle_input("view".to_string());
        assert_eq!(app.view_model().view_mode(), ViewMode::LinearFlow.next());

        app.handle_input("view radial".to_string());
        assert!(app.output().iter().any(|l| l == "Error: unknown view mode: radial"));
    }

    #[test]
    fn test_select_and_deselect() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = loaded_app(&temp_dir);

        app.handle_input("select zzz".to_string());
        assert!(last_output(&app).starts_with("Error:"));

        app.handle_input("select i-1".to_string());
        app.handle_input("select e1".to_string());
        assert_eq!(app.view_model().selection(), ["i-1", "e1"]);

        app.handle_input("deselect e1".to_string());
        assert_eq!(app.view_model().selection(), ["i-1"]);

        app.handle_input("deselect".to_string());
        assert!(app.view_model().selection().is_empty());
    }

    #[test]
    fn test_export_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = loaded_app(&temp_dir);
        let out = temp_dir.path().join("view.svg");

        app.handle_input(format!("export svg {}", out.display()));
        assert!(last_output(&app).starts_with("Exported"));
        let svg = fs::read_to_string(&out).unwrap();
        assert!(svg.contains("<svg"));

        app.handle_input("export gif".to_string());
        assert!(last_output(&app).starts_with("Error:"));
    }

    #[test]
    fn test_export_write_failure_reaches_status() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = loaded_app(&temp_dir);
        let out = temp_dir.path().join("no-such-dir").join("view.png");

        app.handle_input(format!("export png {}", out.display()));
        assert!(last_output(&app).starts_with("Error:"));
        assert!(
            app.view_model()
                .status()
                .to_string()
                .starts_with("Export failed:")
        );
    }

    #[test]
    fn test_enumerate_without_backend() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir);
        app.handle_input("enumerate all".to_string());
        assert_eq!(last_output(&app), "Error: no enumeration backend configured");
        assert!(!app.view_model().is_ingesting());
    }

    #[test]
    fn test_unknown_command() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir);
        app.handle_input("frobnicate".to_string());
        assert!(app.output().iter().any(|l| l == "Unknown command: frobnicate"));
    }

    // ============================================================================
    // Background Ingestion Tests
    // ============================================================================

    #[test]
    fn test_process_messages_discards_superseded_results() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir);

        let first = app.vm.begin_ingestion();
        let second = app.vm.begin_ingestion();
        let response = EnumerationResponse::from_json(TOPOLOGY).unwrap();

        app.tx
            .send(IngestMessage {
                ticket: first,
                result: Ok(response.clone()),
            })
            .unwrap();
        app.tx
            .send(IngestMessage {
                ticket: second,
                result: Err("throttled".to_string()),
            })
            .unwrap();
        app.process_messages();

        assert!(app.output().iter().any(|l| l == "Discarded a superseded enumeration result"));
        assert_eq!(last_output(&app), "Error: throttled");
        assert!(app.view_model().store().is_empty());
        assert_eq!(app.view_model().status(), &Status::Failed("throttled".to_string()));
    }

    // ============================================================================
    // History and Exit Tests
    // ============================================================================

    #[test]
    fn test_history_navigation() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir);
        app.handle_input("legend".to_string());
        app.handle_input("warnings".to_string());

        app.input = "sea".to_string();
        app.navigate_history_backward();
        assert_eq!(app.input, "warnings");
        app.navigate_history_backward();
        app.navigate_history_backward();
        assert_eq!(app.input, "legend");
        app.navigate_history_forward();
        app.navigate_history_forward();
        assert_eq!(app.input, "sea");
    }

    #[test]
    fn test_history_is_capped() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir);
        for i in 0..(HISTORY_LIMIT + 5) {
            app.handle_input(format!("search n{}", i));
        }
        assert_eq!(app.history.len(), HISTORY_LIMIT);
        assert_eq!(app.history[0], "search n5");
    }

    #[test]
    fn test_write_quit_saves_history() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir);
        app.handle_input("legend".to_string());
        app.handle_input(":wq!".to_string());
        assert!(app.should_quit());

        let saved = fs::read_to_string(temp_dir.path().join("history")).unwrap();
        assert_eq!(saved, "legend\n:wq!");

        let mut reloaded = app_in(&temp_dir);
        reloaded.load_history();
        assert_eq!(reloaded.history, vec!["legend", ":wq!"]);
    }

    #[test]
    fn test_normal_exit_asks_before_saving() {
        let temp_dir = TempDir::new().unwrap();
        let mut app = app_in(&temp_dir);
        app.handle_input("exit".to_string());
        assert!(!app.should_quit());
        app.handle_input("n".to_string());
        assert!(app.should_quit());
        assert_eq!(last_output(&app), "History not saved.");
        assert!(!temp_dir.path().join("history").exists());
    }
}
