//! Formula-layer error types: parsing and evaluation failures.
//!
//! Arithmetic/lookup errors that correspond to a spreadsheet error code
//! (`#DIV/0!`, `#N/A`, ...) are *not* represented here — they propagate as
//! `cellforge_core::CellValue::Error` values and are only ever surfaced as
//! a `FormulaError` by a caller that explicitly demands a concrete value.

use thiserror::Error;

use cellforge_core::ARef;

pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// A formula failed to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("parse error at {location}: {reason}")]
pub struct ParseError {
    pub location: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(location: impl Into<String>, reason: impl Into<String>) -> Self {
        ParseError {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while parsing or evaluating a formula.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("formula error in '{expression}': {reason}")]
    Formula { expression: String, reason: String },

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    #[error("unknown name: {0}")]
    UnknownName(String),

    #[error("circular reference: {}", cycle_text(.0))]
    CircularRef(Vec<ARef>),

    #[error("{reason}")]
    EvalFailed { reason: String, context: Option<String> },
}

fn cycle_text(cycle: &[ARef]) -> String {
    cycle
        .iter()
        .map(|r| r.to_a1())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl FormulaError {
    pub fn eval_failed(reason: impl Into<String>) -> Self {
        FormulaError::EvalFailed {
            reason: reason.into(),
            context: None,
        }
    }
}
