//! # cellforge-formula
//!
//! Formula parser, function registry, dependency graph, and evaluator for
//! the cellforge spreadsheet engine.
//!
//! This crate provides:
//! - Formula parsing (text → [`TExpr`])
//! - Formula evaluation ([`TExpr`] → [`value::Value`])
//! - The built-in function registry (`SUM`, `VLOOKUP`, `NPV`, ...)
//! - Dependency tracking and recalculation ordering for a sheet or a whole
//!   workbook
//!
//! ## Example
//!
//! ```
//! use cellforge_core::{ARef, CellValue, Sheet, SheetName};
//! use cellforge_formula::{evaluate_formula, Clock};
//!
//! let sheet = Sheet::new(SheetName::new("Sheet1").unwrap())
//!     .put(ARef::parse("A1").unwrap(), CellValue::number(2))
//!     .put(ARef::parse("B1").unwrap(), CellValue::number(3));
//! let result = evaluate_formula(&sheet, "=A1+B1", Clock::system()).unwrap();
//! assert_eq!(result, CellValue::number(5));
//! ```

pub mod ast;
pub mod context;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod value;

pub use ast::{BinaryOp, RefSite, TExpr, UnaryOp};
pub use context::{Clock, EvaluationContext};
pub use dependency::{CrossSheetGraph, DependencyGraph};
pub use error::{FormulaError, FormulaResult, ParseError};
pub use evaluator::{evaluate_all_formulas, evaluate_cell, evaluate_formula, evaluate_with_dependency_check};
pub use functions::{lookup, registry, Arity, FunctionSpec};
pub use parser::parse_formula;
pub use value::Value;
