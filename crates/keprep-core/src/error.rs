//! Error types for keprep-core.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while preparing a knowledge-embedding corpus.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A triplet line did not hold exactly three integers.
    #[error("Failed to parse triplet at {}:{line}: {content:?}", path.display())]
    ParseTriplet {
        path: PathBuf,
        line: usize,
        content: String,
    },

    /// Context lookup was asked for both or neither anchor.
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// A required input file does not exist.
    #[error("Missing input file: {}", .0.display())]
    MissingInput(PathBuf),

    /// The dump directory is created fresh and must not exist yet.
    #[error("Dump directory already exists: {}", .0.display())]
    DumpExists(PathBuf),

    /// An entity id has no line in the description file.
    #[error("Entity {entity} out of range (description file has {num_entities} lines)")]
    EntityOutOfRange { entity: usize, num_entities: usize },

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Embedding tensors of incompatible shape.
    #[error("Shape mismatch: {0}")]
    Shape(String),
}

/// Result type for keprep operations.
pub type Result<T> = std::result::Result<T, Error>;
