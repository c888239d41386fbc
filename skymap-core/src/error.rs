// Error types for the topology engine

use std::path::PathBuf;
use thiserror::Error;

/// A record that could not be loaded as-is. Loading still succeeds; issues
/// surface as warnings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("node record without an id was dropped")]
    MissingNodeId,

    #[error("edge {id} dropped: missing {field}")]
    MissingEndpoint { id: String, field: &'static str },

    #[error("edge {id} dropped: unknown category '{category}'")]
    UnknownCategory { id: String, category: String },

    #[error("edge {id} dropped: {endpoint} '{node}' does not exist")]
    DanglingEdge {
        id: String,
        endpoint: &'static str,
        node: String,
    },

    #[error("edge {id} dropped: id already names a node")]
    EdgeIdClash { id: String },

    #[error("{kind} {id}: duplicate id, earlier record replaced")]
    DuplicateId { kind: &'static str, id: String },

    #[error("node {id}: parent '{parent}' does not exist, parent cleared")]
    MissingParent { id: String, parent: String },

    #[error("node {id}: parent '{parent}' would form a cycle, parent cleared")]
    ParentCycle { id: String, parent: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no element with id '{0}'")]
    UnknownElement(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("unknown export format '{0}' (expected png, svg or json)")]
    UnknownFormat(String),

    #[error("failed to build SVG: {0}")]
    Svg(#[from] std::fmt::Error),

    #[error("failed to rasterize image: {0}")]
    Raster(String),

    #[error("failed to serialize graph: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting {key}: {message}")]
    Invalid { key: String, message: String },
}
