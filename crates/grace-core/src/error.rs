use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in grace-core.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A raw dataset file could not be parsed.
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    /// Dataset name not recognised.
    #[error("Unknown dataset: {0} (expected cora, citeseer or pubmed)")]
    UnknownDataset(String),
    /// A probability outside [0, 1].
    #[error("Invalid rate for {name}: {value} (must be in [0, 1])")]
    InvalidRate { name: &'static str, value: f32 },
    /// Operation needs node labels but the graph has none.
    #[error("Graph has no node labels")]
    MissingLabels,
    /// Buffer length does not match the declared shape.
    #[error("Shape mismatch: {0}")]
    Shape(String),
    /// Split cannot be drawn from the available nodes.
    #[error("Invalid split: {0}")]
    InvalidSplit(String),
}

/// Result type alias for grace-core.
pub type Result<T> = std::result::Result<T, Error>;
