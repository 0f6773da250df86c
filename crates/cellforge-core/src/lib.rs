//! Core data model for `cellforge`: cell addressing, values, styles, and
//! the sheet/workbook structures that hold them.
//!
//! Formula parsing, the function registry, the dependency graph, and the
//! evaluator live in `cellforge-formula`, which depends on this crate.

pub mod addr;
pub mod error;
pub mod io;
pub mod sheet;
pub mod style;
pub mod value;
pub mod workbook;

pub use addr::{ARef, CellRange, Column, QualifiedRef, Row, SheetName};
pub use error::{Error, Result};
pub use sheet::{Cell, ColumnProperties, Comment, RowProperties, Sheet, TableSpec};
pub use style::{CellStyle, StyleId, StyleRegistry};
pub use value::{CellError, CellValue, TextRun};
pub use workbook::{DefinedName, NameScope, Workbook, WorkbookSettings};
