//! Contracts for container I/O collaborators.
//!
//! Reading and writing an actual spreadsheet container (OOXML, legacy
//! binary, CSV, ...) is out of scope for this workspace — these traits
//! exist so `cellforge-cli` and future out-of-workspace collaborator
//! crates (e.g. an OOXML implementation) have a concrete boundary to
//! depend on and implement against, respectively.

use std::path::Path;

use crate::error::Result;
use crate::workbook::Workbook;

/// Configuration a [`WorkbookWriter`] consults when serializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterConfig {
    /// Escape text values that would otherwise be read back as a formula
    /// or number (leading `= + - @`) by prefixing them with `'`.
    pub escape_formulas: bool,
}

/// Loads a full [`Workbook`] from a container at `path`.
pub trait WorkbookReader {
    fn read(&self, path: &Path) -> Result<Workbook>;
}

/// Persists a [`Workbook`] to a container at `path`.
pub trait WorkbookWriter {
    fn write(&self, workbook: &Workbook, path: &Path, config: WriterConfig) -> Result<()>;
}

/// Sheet names, visibility, and (optionally) dimensions without loading
/// cell data — used by callers (e.g. a CLI's `sheets` listing) that want
/// an answer without paying for a full parse.
pub trait MetadataReader {
    fn sheet_names(&self, path: &Path) -> Result<Vec<String>>;
}
