// Skymap core: topology graph engine

pub mod error;
pub mod export;
pub mod filter;
pub mod findings;
pub mod ingest;
pub mod inspect;
pub mod layout;
pub mod legend;
pub mod model;
pub mod settings;
pub mod store;
pub mod style;
pub mod view;

use colored::Colorize;

pub use error::{ExportError, SelectionError, SettingsError, ValidationIssue};
pub use export::{ExportArtifact, ExportFormat, ExportOptions};
pub use filter::{CategoryToggles, FilterEngine, VisibilityMap};
pub use findings::{Finding, FindingsPanel, Severity};
pub use ingest::{IngestOutcome, IngestTicket, IngestionAdapter};
pub use inspect::{InspectorView, SelectionInspector};
pub use layout::{Layout, LayoutSelector, ViewMode, Viewport};
pub use legend::Legend;
pub use model::{Edge, EdgeCategory, ElementRef, Node, NodeType};
pub use settings::Settings;
pub use store::GraphStore;
pub use style::{ResolvedStyle, StyleResolver};
pub use view::{Status, ViewModel};

pub fn print_banner() {
    let banner = r#"
     _
 ___| | ___   _ _ __ ___   __ _ _ __
/ __| |/ / | | | '_ ` _ \ / _` | '_ \
\__ \   <| |_| | | | | | | (_| | |_) |
|___/_|\_\\__, |_| |_| |_|\__,_| .__/
          |___/                |_|
"#;
    println!("{}", banner.bright_green());
    println!(
        "  {} {}\n",
        "cloud topology explorer".dimmed(),
        concat!("v", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
