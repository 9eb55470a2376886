//! Error types for the page-assembly engine.

use std::io;
use thiserror::Error;

use crate::catalog::{DocId, PageUid};

/// Result type alias for pagewright operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the engine can report.
///
/// Load failures are isolated to one document, plan mutations leave the plan
/// untouched when they fail, and a serializer failure produces no bytes.
#[derive(Error, Debug)]
pub enum Error {
    /// The source buffer is not a readable PDF.
    #[error("failed to parse '{name}': {reason}")]
    Parse { name: String, reason: String },

    /// The page uid was never issued by this session, or is not part of the plan.
    #[error("unknown page {0}")]
    NotFound(PageUid),

    /// The document id is unknown or the document was unloaded.
    #[error("document {0} is not loaded")]
    DocumentNotFound(DocId),

    /// Page index past the end of a document.
    #[error("page index {index} is out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    /// Rotation request that is not a multiple of 90 degrees.
    #[error("rotation must be a multiple of 90 degrees, got {0}")]
    InvalidAngle(i64),

    /// Reorder or merge input is not a valid permutation of kept pages.
    #[error("invalid page order: {0}")]
    OrderMismatch(String),

    /// The plan cannot be written out.
    #[error("cannot assemble document: {0}")]
    Serialization(String),

    /// Encrypted or otherwise unrepairable source document.
    #[error("unsupported PDF feature: {0}")]
    UnsupportedFeature(String),

    /// Reading a source file from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn parse(name: &str, reason: impl std::fmt::Display) -> Self {
        Error::Parse {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}
