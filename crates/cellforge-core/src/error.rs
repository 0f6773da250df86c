//! Error taxonomy for the core data model: addressing, values, and sheet
//! structure. Formula-evaluation errors live in `cellforge-formula` instead.

use thiserror::Error;

/// Errors raised by the address, value, and sheet/workbook layers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid column {0:?}: must be in 0..=16383")]
    InvalidColumn(i64),

    #[error("invalid row {0:?}: must be in 0..=1048575")]
    InvalidRow(i64),

    #[error("invalid cell reference '{text}': {reason}")]
    InvalidCellRef { text: String, reason: String },

    #[error("invalid range '{text}': {reason}")]
    InvalidRange { text: String, reason: String },

    #[error("invalid sheet name '{text}': {reason}")]
    InvalidSheetName { text: String, reason: String },

    #[error("sheet not found: '{0}'")]
    SheetNotFound(String),

    #[error("duplicate sheet name: '{0}'")]
    DuplicateSheet(String),

    #[error("parse error at {location}: {reason}")]
    ParseError { location: String, reason: String },

    #[error("type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: String,
        actual: String,
        context: String,
    },

    #[error("merge range overlaps an existing merge")]
    MergeOverlap,

    #[error("unknown defined name: '{0}'")]
    UnknownName(String),

    #[error("invalid cell error code: '{0}'")]
    InvalidError(String),

    #[error("style id {0} is not present in the style registry")]
    InvalidStyleId(u32),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// A short, user-facing suggestion attached to certain error kinds, as
    /// required at the CLI/agent surface.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::InvalidCellRef { .. } => Some("Use A1-style references"),
            Error::InvalidRange { .. } => Some("Use A1:B10-style ranges"),
            Error::InvalidSheetName { .. } => {
                Some("Sheet names must avoid [ ] : * ? / \\ and be 1-31 characters")
            }
            _ => None,
        }
    }
}
